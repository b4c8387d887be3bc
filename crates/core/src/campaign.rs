// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch offline AI remediation campaigns (spec.md §3/§4.G's
//! `RemediationCampaign`).

use crate::finding::Severity;
use crate::scan_job::ScanMode;
use crate::scanner::ScannerKind;
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct CampaignId("cam-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Running,
    Stopped,
    Completed,
    Failed,
}

crate::display_as! {
    CampaignStatus {
        Draft => "draft",
        Running => "running",
        Stopped => "stopped",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Filters used during task materialization to select candidate scan jobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignFilters {
    #[serde(default)]
    pub repos: Vec<String>,
    #[serde(default)]
    pub scan_job_ids: Vec<String>,
    #[serde(default)]
    pub max_repos: u32,
    #[serde(default = "default_true")]
    pub latest_only: bool,
    #[serde(default)]
    pub scanners: Vec<ScannerKind>,
    #[serde(default)]
    pub kinds: Vec<ScannerKind>,
    #[serde(default)]
    pub severities: Vec<Severity>,
}

fn default_true() -> bool {
    true
}

impl Default for CampaignStatus {
    fn default() -> Self {
        Self::Draft
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TaskCounters {
    pub total: u32,
    pub pending: u32,
    pub running: u32,
    pub completed: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationCampaign {
    pub id: CampaignId,
    pub name: String,
    pub status: CampaignStatus,
    pub mode: ScanMode,
    pub auto_pr: bool,
    pub filters: CampaignFilters,
    pub counters: TaskCounters,
    pub created_at_ms: u64,
}

impl RemediationCampaign {
    pub fn is_active(&self) -> bool {
        matches!(self.status, CampaignStatus::Draft | CampaignStatus::Running)
    }
}

crate::test_builder! {
    pub struct RemediationCampaignBuilder => RemediationCampaign {
        required {
            id: CampaignId = CampaignId::new(),
            name: String = "sweep remediation".to_string(),
            status: CampaignStatus = CampaignStatus::Draft,
            mode: ScanMode = ScanMode::Triage,
            auto_pr: bool = false,
            filters: CampaignFilters = CampaignFilters::default(),
            counters: TaskCounters = TaskCounters::default(),
            created_at_ms: u64 = 0,
        }
        optional {}
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RemediationCampaignBuilder {
    pub fn build(self) -> RemediationCampaign {
        RemediationCampaign {
            id: self.id,
            name: self.name,
            status: self.status,
            mode: self.mode,
            auto_pr: self.auto_pr,
            filters: self.filters,
            counters: self.counters,
            created_at_ms: self.created_at_ms,
        }
    }
}
