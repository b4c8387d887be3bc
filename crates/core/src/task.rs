// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-campaign remediation tasks (spec.md §3/§4.G's `RemediationTask`).

use crate::campaign::CampaignId;
use crate::repo::Provider;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Stopped,
}

crate::display_as! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
        Stopped => "stopped",
    }
}

/// Progress of the AI pipeline for one task, recorded as the pipeline
/// advances and fanned out as events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiProgress {
    pub phase: String,
    pub current: u32,
    pub total: u32,
    pub percent: f32,
    pub note: String,
    pub updated_at_ms: u64,
}

impl AiProgress {
    pub fn advance(&mut self, phase: impl Into<String>, current: u32, total: u32, note: impl Into<String>, now_ms: u64) {
        self.phase = phase.into();
        self.current = current;
        self.total = total;
        self.percent = if total == 0 { 0.0 } else { (current as f32 / total as f32) * 100.0 };
        self.note = note.into();
        self.updated_at_ms = now_ms;
    }
}

/// AI pipeline counters accumulated as a task runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiCounters {
    pub findings_loaded: u32,
    pub deduped: u32,
    pub triage_batches: u32,
    pub triage_status: String,
    pub triage_summary: String,
    pub fix_attempted: u32,
    pub fix_queued: u32,
    pub fix_skipped_low_conf: u32,
    pub fix_failed: u32,
}

/// Child of a campaign, keyed by (campaign_id, scan_job_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationTask {
    pub campaign_id: CampaignId,
    pub scan_job_id: String,
    pub provider: Provider,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub clone_url: String,
    pub status: TaskStatus,
    pub worker_name: Option<String>,
    pub progress: AiProgress,
    pub counters: AiCounters,
    /// **(expansion)** last error message; display-only, see DESIGN.md.
    #[serde(default)]
    pub last_error: Option<String>,
}

impl RemediationTask {
    pub fn is_in_flight(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::Running)
    }

    /// §4.G "Stop" cascade: pending/running tasks move to `stopped`.
    pub fn stop(&mut self) {
        if self.is_in_flight() {
            self.status = TaskStatus::Stopped;
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_only_affects_in_flight_tasks() {
        let mut t = RemediationTask {
            campaign_id: CampaignId::new(),
            scan_job_id: "scj-1".into(),
            provider: Provider::GitHub,
            owner: "acme".into(),
            repo: "api".into(),
            branch: "main".into(),
            clone_url: "https://github.com/acme/api.git".into(),
            status: TaskStatus::Completed,
            worker_name: None,
            progress: AiProgress::default(),
            counters: AiCounters::default(),
            last_error: None,
        };
        t.stop();
        assert_eq!(t.status, TaskStatus::Completed);

        t.status = TaskStatus::Running;
        t.stop();
        assert_eq!(t.status, TaskStatus::Stopped);
    }

    #[test]
    fn ai_progress_advance_computes_percent() {
        let mut p = AiProgress::default();
        p.advance("triage", 2, 4, "halfway", 1000);
        assert_eq!(p.percent, 50.0);
        p.advance("triage", 0, 0, "empty", 1000);
        assert_eq!(p.percent, 0.0);
    }
}
