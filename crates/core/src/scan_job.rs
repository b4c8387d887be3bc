// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ScanJob`: one execution of all scanners against one
//! (provider, owner, repo, branch, commit).

use crate::repo::Provider;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a scan job.
    pub struct ScanJobId("scj-");
}

/// Status of a whole scan job, aggregated from its per-scanner results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Partial,
    Failed,
    Stopped,
}

crate::display_as! {
    ScanStatus {
        Running => "running",
        Completed => "completed",
        Partial => "partial",
        Failed => "failed",
        Stopped => "stopped",
    }
}

/// Requested remediation mode for a scan (also used by campaigns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Triage,
    Semi,
    Auto,
}

impl ScanMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "triage" => Some(Self::Triage),
            "semi" => Some(Self::Semi),
            "auto" => Some(Self::Auto),
            "" => None,
            _ => None,
        }
    }
}

crate::display_as! {
    ScanMode {
        Triage => "triage",
        Semi => "semi",
        Auto => "auto",
    }
}

/// Who caused this scan job to be created. Ambient bookkeeping surfaced by
/// the CLI's status views; never read by a core algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TriggeredBy {
    Schedule { schedule_id: String },
    Manual,
    Campaign { campaign_id: String },
}

/// Severity counters, summed across a job's scanners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl SeverityCounts {
    pub fn total(&self) -> u32 {
        self.critical + self.high + self.medium + self.low
    }

    pub fn add(&mut self, other: &SeverityCounts) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
    }
}

/// One execution of all scanners against one (provider, owner, repo, branch,
/// commit) — spec.md §3's `ScanJob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: ScanJobId,
    /// Dedup hash of (provider, owner, repo, branch, commit), computed by
    /// the orchestrator when a job is created.
    pub unique_key: String,
    pub provider: Provider,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub status: ScanStatus,
    pub scan_mode: ScanMode,
    pub severity: SeverityCounts,
    pub started_at_ms: u64,
    pub completed_at_ms: Option<u64>,
    pub error_msg: Option<String>,
    #[serde(default)]
    pub triggered_by: Option<TriggeredBy>,
}

impl ScanJob {
    pub fn unique_key_for(provider: Provider, owner: &str, repo: &str, branch: &str, commit: &str) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            provider,
            owner.to_ascii_lowercase(),
            repo.to_ascii_lowercase(),
            branch.to_ascii_lowercase(),
            commit
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, ScanStatus::Running)
    }
}

crate::test_builder! {
    pub struct ScanJobBuilder => ScanJob {
        required {
            id: ScanJobId = ScanJobId::new(),
            unique_key: String = String::new(),
            provider: Provider = Provider::GitHub,
            owner: String = "acme".to_string(),
            repo: String = "api".to_string(),
            branch: String = "main".to_string(),
            commit: String = "deadbeef".to_string(),
            status: ScanStatus = ScanStatus::Running,
            scan_mode: ScanMode = ScanMode::Triage,
            severity: SeverityCounts = SeverityCounts::default(),
            started_at_ms: u64 = 0,
        }
        optional {
            completed_at_ms: u64,
            error_msg: String,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ScanJobBuilder {
    pub fn build(self) -> ScanJob {
        ScanJob {
            id: self.id,
            unique_key: self.unique_key,
            provider: self.provider,
            owner: self.owner,
            repo: self.repo,
            branch: self.branch,
            commit: self.commit,
            status: self.status,
            scan_mode: self.scan_mode,
            severity: self.severity,
            started_at_ms: self.started_at_ms,
            completed_at_ms: self.completed_at_ms,
            error_msg: self.error_msg,
            triggered_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_key_is_lowercased_except_commit() {
        let a = ScanJob::unique_key_for(Provider::GitHub, "Acme", "API", "Main", "deadBEEF");
        let b = ScanJob::unique_key_for(Provider::GitHub, "acme", "api", "main", "deadBEEF");
        assert_eq!(a, b);
    }

    #[test]
    fn severity_counts_add_sums_each_bucket() {
        let mut a = SeverityCounts { critical: 1, high: 2, medium: 3, low: 4 };
        let b = SeverityCounts { critical: 1, high: 1, medium: 1, low: 1 };
        a.add(&b);
        assert_eq!(a, SeverityCounts { critical: 2, high: 3, medium: 4, low: 5 });
        assert_eq!(a.total(), 14);
    }

    #[test]
    fn builder_produces_running_job_by_default() {
        let job = ScanJob::fixture().owner("acme").repo("api").build();
        assert_eq!(job.status, ScanStatus::Running);
        assert_eq!(job.owner, "acme");
    }
}
