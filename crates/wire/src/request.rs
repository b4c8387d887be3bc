// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ctrlscan_core::campaign::CampaignFilters;
use ctrlscan_core::scan_job::ScanMode;
use ctrlscan_core::schedule::ScopeJson;
use serde::{Deserialize, Serialize};

/// Request sent from `ctrlscan-cli` to `ctrlscand` over the wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check.
    Ping,

    /// Advisory/heartbeat state: uptime, sweep health, worker statuses.
    Status,

    /// Coalescing sweep trigger (spec.md §4.E). `selected_repos` are
    /// `"owner/name"` strings; empty means "discover from the provider".
    Trigger {
        #[serde(default)]
        selected_repos: Vec<String>,
        #[serde(default)]
        worker_count: Option<usize>,
        #[serde(default)]
        mode: Option<ScanMode>,
        #[serde(default)]
        force: bool,
    },

    /// Cancel the in-flight sweep, if any.
    StopSweep,

    /// Advisory pause: workers finish their current repo, then block.
    Pause,

    /// Resume a paused orchestrator.
    Resume,

    /// Most recent scan jobs, newest first.
    ListScanJobs {
        #[serde(default = "default_scan_job_limit")]
        limit: usize,
    },

    GetScanJob { id: String },

    DeleteScanJob { id: String },

    ListFindings { scan_job_id: String },

    ListFixQueue,

    ApproveFix { id: String },

    RejectFix { id: String },

    ListSchedules,

    GetSchedule { id: String },

    CreateSchedule { expr: String, scope: ScopeJson, enabled: bool },

    UpdateSchedule { id: String, expr: String, scope: ScopeJson, enabled: bool },

    DeleteSchedule { id: String },

    /// Fire a schedule immediately, bypassing its cron expression.
    TriggerSchedule { id: String },

    ListCampaigns,

    GetCampaign { id: String },

    CreateCampaign {
        name: String,
        mode: ScanMode,
        #[serde(default)]
        auto_pr: bool,
        #[serde(default)]
        filters: CampaignFilters,
        #[serde(default)]
        force: bool,
    },

    /// Scan the candidate pool and insert `RemediationTask` rows.
    MaterializeCampaign { id: String },

    /// Spawn workers to claim and execute pending tasks.
    StartCampaign { id: String },

    /// Cancel the campaign and every in-flight task under it.
    StopCampaign { id: String },

    /// Cancel one in-flight remediation task without touching the campaign.
    StopTask { scan_job_id: String },
}

fn default_scan_job_limit() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let req = Request::Trigger { selected_repos: vec!["acme/api".to_string()], worker_count: Some(4), mode: Some(ScanMode::Auto), force: true };
        let json = serde_json::to_string(&req).expect("serialize");
        let back: Request = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(back, Request::Trigger { worker_count: Some(4), force: true, .. }));
    }

    #[test]
    fn list_scan_jobs_defaults_its_limit_when_omitted() {
        let req: Request = serde_json::from_str(r#"{"type":"ListScanJobs"}"#).expect("deserialize");
        assert!(matches!(req, Request::ListScanJobs { limit: 100 }));
    }

    #[test]
    fn tag_is_the_variant_name() {
        let json = serde_json::to_string(&Request::Ping).expect("serialize");
        assert_eq!(json, r#"{"type":"Ping"}"#);
    }
}
