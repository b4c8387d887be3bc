// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The vocabulary of write operations recorded in the WAL. Every mutation
//! the store accepts is expressed as one `StoreOp` before being applied to
//! [`crate::state::MaterializedState`] — this is what "replaying the log"
//! means.

use ctrlscan_core::campaign::RemediationCampaign;
use ctrlscan_core::finding::NormalizedFinding;
use ctrlscan_core::fixqueue::FixQueueEntry;
use ctrlscan_core::lifecycle::RepoFindingLifecycle;
use ctrlscan_core::queue::RepoQueueEntry;
use ctrlscan_core::scan_job::ScanJob;
use ctrlscan_core::scanner::{RawScannerOutput, ScanJobScanner};
use ctrlscan_core::schedule::Schedule;
use ctrlscan_core::summary::ScanJobFindingSummary;
use ctrlscan_core::task::RemediationTask;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOp {
    UpsertScanJob(Box<ScanJob>),
    DeleteScanJob { scan_job_id: String },
    UpsertScanJobScanner(Box<ScanJobScanner>),
    UpsertRawOutput(Box<RawScannerOutput>),
    ReplaceScanJobFindings { scan_job_id: String, findings: Vec<NormalizedFinding> },
    UpsertFindingSummary { scan_job_id: String, summary: ScanJobFindingSummary },
    UpsertLifecycle(Box<RepoFindingLifecycle>),
    UpsertQueueEntry(Box<RepoQueueEntry>),
    UpsertSchedule(Box<Schedule>),
    DeleteSchedule { schedule_id: String },
    UpsertCampaign(Box<RemediationCampaign>),
    UpsertTask(Box<RemediationTask>),
    UpsertFixQueueEntry(Box<FixQueueEntry>),
    /// Administrative wipe of a `RepoFindingLifecycle` row.
    DeleteLifecycle { provider: String, owner: String, repo: String, branch: String, kind: String, fingerprint: String },
}
