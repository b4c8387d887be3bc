// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ctrlscan_core::campaign::{RemediationCampaign, TaskCounters};
use ctrlscan_core::event::AgentHealth;
use ctrlscan_core::finding::NormalizedFinding;
use ctrlscan_core::fixqueue::FixQueueEntry;
use ctrlscan_core::scan_job::ScanJob;
use ctrlscan_core::schedule::Schedule;
use serde::{Deserialize, Serialize};

/// Point-in-time view of one sweep worker, carried over the wire since
/// `ctrlscan-engine::WorkerStatus` isn't `Serialize` (the wire crate has no
/// dependency on the engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusWire {
    pub name: String,
    pub repo: Option<String>,
    pub status: String,
    pub since_ms: u64,
}

/// Response sent from `ctrlscand` back to `ctrlscan-cli`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success with no payload.
    Ok,

    Pong,

    Error { message: String },

    Status {
        uptime_secs: u64,
        health: AgentHealth,
        sweep_in_flight: bool,
        workers: Vec<WorkerStatusWire>,
    },

    ScanJobs { jobs: Vec<ScanJob> },

    ScanJob { job: Box<ScanJob> },

    Findings { findings: Vec<NormalizedFinding> },

    FixQueue { entries: Vec<FixQueueEntry> },

    FixQueueEntry { entry: Box<FixQueueEntry> },

    Schedules { schedules: Vec<Schedule> },

    Schedule { schedule: Box<Schedule> },

    Campaigns { campaigns: Vec<RemediationCampaign> },

    Campaign { campaign: Box<RemediationCampaign> },

    TaskCounters { counters: TaskCounters },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_round_trips_through_json() {
        let resp = Response::Error { message: "not found".to_string() };
        let json = serde_json::to_string(&resp).expect("serialize");
        let back: Response = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(back, Response::Error { message } if message == "not found"));
    }

    #[test]
    fn ok_has_no_extra_fields() {
        let json = serde_json::to_string(&Response::Ok).expect("serialize");
        assert_eq!(json, r#"{"type":"Ok"}"#);
    }
}
