// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional façade over the WAL + materialized state: spec.md §4.A's
//! `Exec`/`Get`/`Select`/`Insert`/`Upsert`/`Migrate` contract.
//!
//! All writers serialize through the single [`parking_lot::Mutex`] guarding
//! [`Inner`] (single-writer discipline); reads take the same lock but never
//! block on I/O since the materialized state lives in memory.

use crate::op::StoreOp;
use crate::state::MaterializedState;
use crate::wal::Wal;
use ctrlscan_core::campaign::RemediationCampaign;
use ctrlscan_core::error::{CoreError, CoreResult};
use ctrlscan_core::finding::NormalizedFinding;
use ctrlscan_core::fixqueue::FixQueueEntry;
use ctrlscan_core::lifecycle::{LifecycleKey, RepoFindingLifecycle};
use ctrlscan_core::queue::RepoQueueEntry;
use ctrlscan_core::repo::{Provider, RepoKey};
use ctrlscan_core::scan_job::{ScanJob, ScanStatus};
use ctrlscan_core::scanner::{RawScannerOutput, ScanJobScanner};
use ctrlscan_core::schedule::Schedule;
use ctrlscan_core::summary::ScanJobFindingSummary;
use ctrlscan_core::task::RemediationTask;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

struct Inner {
    wal: Wal,
    state: MaterializedState,
    migrated: bool,
}

/// The single-writer, non-blocking-reader persistent store. One instance
/// per `ctrlscand` process (spec.md §9's "global state" singleton).
pub struct Store {
    inner: Mutex<Inner>,
    #[allow(dead_code)]
    wal_path: PathBuf,
}

impl Store {
    /// Open the store's WAL at `wal_path`, replaying it into a fresh
    /// `MaterializedState`. Does not run [`Store::migrate`] — callers must
    /// migrate before issuing reads/writes, matching spec.md §4.A's
    /// explicit `Migrate` step.
    pub fn open(wal_path: impl AsRef<Path>) -> CoreResult<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        let mut wal = Wal::open(&wal_path, 0).map_err(|e| CoreError::external(e.to_string()))?;
        let mut state = MaterializedState::new();
        while let Some(entry) = wal.next_unprocessed().map_err(|e| CoreError::external(e.to_string()))? {
            state.apply(&entry.op);
            wal.mark_processed(entry.seq);
        }
        Ok(Self { inner: Mutex::new(Inner { wal, state, migrated: false }), wal_path })
    }

    /// Idempotent schema apply. The in-memory store has no SQL files to
    /// run; this simply flips the readiness flag so `no such table`-style
    /// [`CoreError::MissingSchema`] stops being raised.
    pub fn migrate(&self) -> CoreResult<()> {
        self.inner.lock().migrated = true;
        Ok(())
    }

    fn ensure_migrated(&self, table: &str) -> CoreResult<()> {
        if self.inner.lock().migrated {
            Ok(())
        } else {
            Err(CoreError::MissingSchema(format!("no such table: {table}")))
        }
    }

    fn apply_and_log(&self, op: StoreOp) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        inner.state.apply(&op);
        inner.wal.append(&op).map_err(|e| CoreError::external(e.to_string()))?;
        if inner.wal.needs_flush() {
            inner.wal.flush().map_err(|e| CoreError::external(e.to_string()))?;
        }
        Ok(())
    }

    // ---- ScanJob ----------------------------------------------------

    pub fn upsert_scan_job(&self, job: ScanJob) -> CoreResult<()> {
        self.ensure_migrated("scan_jobs")?;
        self.apply_and_log(StoreOp::UpsertScanJob(Box::new(job)))
    }

    pub fn get_scan_job(&self, id: &str) -> CoreResult<ScanJob> {
        self.ensure_migrated("scan_jobs")?;
        self.inner.lock().state.scan_jobs.get(id).cloned().ok_or_else(|| CoreError::not_found(format!("scan job {id}")))
    }

    pub fn delete_scan_job(&self, id: &str) -> CoreResult<()> {
        self.ensure_migrated("scan_jobs")?;
        self.apply_and_log(StoreOp::DeleteScanJob { scan_job_id: id.to_string() })
    }

    /// Every job still in `running` status, regardless of repo — used by
    /// `StopCurrentSweep` to backfill `stopped` across the whole sweep.
    pub fn running_scan_jobs(&self) -> CoreResult<Vec<ScanJob>> {
        self.ensure_migrated("scan_jobs")?;
        let inner = self.inner.lock();
        Ok(inner.state.scan_jobs.values().filter(|j| j.status == ScanStatus::Running).cloned().collect())
    }

    /// The `limit` most recently started scan jobs, newest first — the
    /// Remediation Engine's fallback candidate pool when a campaign's
    /// filters don't name explicit `scan_job_ids` (spec.md §4.G).
    pub fn recent_scan_jobs(&self, limit: usize) -> CoreResult<Vec<ScanJob>> {
        self.ensure_migrated("scan_jobs")?;
        let inner = self.inner.lock();
        let mut jobs: Vec<ScanJob> = inner.state.scan_jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));
        jobs.truncate(limit);
        Ok(jobs)
    }

    pub fn select_scan_jobs_for_repo_branch(&self, provider: Provider, owner: &str, repo: &str, branch: &str) -> CoreResult<Vec<ScanJob>> {
        self.ensure_migrated("scan_jobs")?;
        let inner = self.inner.lock();
        Ok(inner
            .state
            .scan_jobs
            .values()
            .filter(|j| {
                j.provider == provider && j.owner.eq_ignore_ascii_case(owner) && j.repo.eq_ignore_ascii_case(repo) && j.branch.eq_ignore_ascii_case(branch)
            })
            .cloned()
            .collect())
    }

    // ---- ScanJobScanner / RawScannerOutput ---------------------------

    pub fn upsert_scanner_result(&self, row: ScanJobScanner) -> CoreResult<()> {
        self.ensure_migrated("scan_job_scanners")?;
        self.apply_and_log(StoreOp::UpsertScanJobScanner(Box::new(row)))
    }

    pub fn upsert_raw_output(&self, row: RawScannerOutput) -> CoreResult<()> {
        self.ensure_migrated("raw_scanner_outputs")?;
        self.apply_and_log(StoreOp::UpsertRawOutput(Box::new(row)))
    }

    // ---- NormalizedFinding / ScanJobFindingSummary -------------------

    pub fn replace_scan_job_findings(&self, scan_job_id: &str, findings: Vec<NormalizedFinding>) -> CoreResult<()> {
        self.ensure_migrated("scan_job_findings")?;
        self.apply_and_log(StoreOp::ReplaceScanJobFindings { scan_job_id: scan_job_id.to_string(), findings })
    }

    pub fn findings_for_scan_job(&self, scan_job_id: &str) -> CoreResult<Vec<NormalizedFinding>> {
        self.ensure_migrated("scan_job_findings")?;
        Ok(self.inner.lock().state.findings_for_scan_job(scan_job_id).to_vec())
    }

    pub fn upsert_finding_summary(&self, scan_job_id: &str, summary: ScanJobFindingSummary) -> CoreResult<()> {
        self.ensure_migrated("scan_job_finding_summaries")?;
        self.apply_and_log(StoreOp::UpsertFindingSummary { scan_job_id: scan_job_id.to_string(), summary })
    }

    pub fn get_finding_summary(&self, scan_job_id: &str) -> CoreResult<ScanJobFindingSummary> {
        self.ensure_migrated("scan_job_finding_summaries")?;
        self.inner
            .lock()
            .state
            .finding_summaries
            .get(scan_job_id)
            .copied()
            .ok_or_else(|| CoreError::not_found(format!("finding summary for {scan_job_id}")))
    }

    // ---- RepoFindingLifecycle -----------------------------------------

    pub fn upsert_lifecycle(&self, lifecycle: RepoFindingLifecycle) -> CoreResult<()> {
        self.ensure_migrated("repo_finding_lifecycles")?;
        self.apply_and_log(StoreOp::UpsertLifecycle(Box::new(lifecycle)))
    }

    pub fn get_lifecycle(&self, key: &LifecycleKey) -> CoreResult<Option<RepoFindingLifecycle>> {
        self.ensure_migrated("repo_finding_lifecycles")?;
        Ok(self.inner.lock().state.lifecycle(key).cloned())
    }

    pub fn lifecycles_for_repo_branch(&self, provider: Provider, owner: &str, repo: &str, branch: &str) -> CoreResult<Vec<RepoFindingLifecycle>> {
        self.ensure_migrated("repo_finding_lifecycles")?;
        Ok(self.inner.lock().state.lifecycles_for_repo_branch(provider, owner, repo, branch).into_iter().cloned().collect())
    }

    pub fn delete_lifecycle(&self, key: &LifecycleKey) -> CoreResult<()> {
        self.ensure_migrated("repo_finding_lifecycles")?;
        self.apply_and_log(StoreOp::DeleteLifecycle {
            provider: key.provider.to_string(),
            owner: key.owner.clone(),
            repo: key.repo.clone(),
            branch: key.branch.clone(),
            kind: key.kind.clone(),
            fingerprint: key.fingerprint.clone(),
        })
    }

    // ---- RepoQueue ------------------------------------------------------

    pub fn enqueue_repo(&self, entry: RepoQueueEntry) -> CoreResult<()> {
        self.ensure_migrated("repo_queue")?;
        self.apply_and_log(StoreOp::UpsertQueueEntry(Box::new(entry)))
    }

    /// Compare-and-swap claim of the highest-priority pending repo.
    /// Mirrors the `UPDATE ... WHERE status='pending'` race-free claim.
    pub fn claim_next_repo(&self) -> CoreResult<Option<RepoQueueEntry>> {
        self.ensure_migrated("repo_queue")?;
        let mut inner = self.inner.lock();
        let key = inner.state.pending_queue_entries().first().map(|e| e.key.dedup_key());
        let Some(key) = key else { return Ok(None) };
        let Some(mut entry) = inner.state.queue.get(&key).cloned() else { return Ok(None) };
        if !entry.try_claim() {
            return Ok(None);
        }
        let op = StoreOp::UpsertQueueEntry(Box::new(entry.clone()));
        inner.state.apply(&op);
        inner.wal.append(&op).map_err(|e| CoreError::external(e.to_string()))?;
        Ok(Some(entry))
    }

    pub fn return_to_pending(&self, key: &RepoKey) -> CoreResult<()> {
        self.ensure_migrated("repo_queue")?;
        let mut inner = self.inner.lock();
        let dedup = key.dedup_key();
        let Some(mut entry) = inner.state.queue.get(&dedup).cloned() else {
            return Err(CoreError::not_found(format!("queue entry {dedup}")));
        };
        entry.return_to_pending();
        let op = StoreOp::UpsertQueueEntry(Box::new(entry));
        inner.state.apply(&op);
        inner.wal.append(&op).map_err(|e| CoreError::external(e.to_string()))?;
        Ok(())
    }

    pub fn pending_queue_len(&self) -> CoreResult<usize> {
        self.ensure_migrated("repo_queue")?;
        Ok(self.inner.lock().state.pending_queue_entries().len())
    }

    // ---- Schedule -------------------------------------------------------

    pub fn upsert_schedule(&self, schedule: Schedule) -> CoreResult<()> {
        self.ensure_migrated("schedules")?;
        self.apply_and_log(StoreOp::UpsertSchedule(Box::new(schedule)))
    }

    pub fn get_schedule(&self, id: &str) -> CoreResult<Schedule> {
        self.ensure_migrated("schedules")?;
        self.inner.lock().state.schedules.get(id).cloned().ok_or_else(|| CoreError::not_found(format!("schedule {id}")))
    }

    pub fn list_schedules(&self) -> CoreResult<Vec<Schedule>> {
        self.ensure_migrated("schedules")?;
        Ok(self.inner.lock().state.schedules.values().cloned().collect())
    }

    pub fn delete_schedule(&self, id: &str) -> CoreResult<()> {
        self.ensure_migrated("schedules")?;
        self.apply_and_log(StoreOp::DeleteSchedule { schedule_id: id.to_string() })
    }

    // ---- RemediationCampaign / RemediationTask --------------------------

    pub fn upsert_campaign(&self, campaign: RemediationCampaign) -> CoreResult<()> {
        self.ensure_migrated("remediation_campaigns")?;
        self.apply_and_log(StoreOp::UpsertCampaign(Box::new(campaign)))
    }

    pub fn get_campaign(&self, id: &str) -> CoreResult<RemediationCampaign> {
        self.ensure_migrated("remediation_campaigns")?;
        self.inner.lock().state.campaigns.get(id).cloned().ok_or_else(|| CoreError::not_found(format!("campaign {id}")))
    }

    pub fn list_campaigns(&self) -> CoreResult<Vec<RemediationCampaign>> {
        self.ensure_migrated("remediation_campaigns")?;
        Ok(self.inner.lock().state.campaigns.values().cloned().collect())
    }

    /// Campaigns in {draft, running} whose tasks reference any of
    /// `scan_job_ids` — spec.md §4.G's overlap-conflict check.
    pub fn campaigns_overlapping(&self, scan_job_ids: &[String]) -> CoreResult<Vec<(String, String)>> {
        self.ensure_migrated("remediation_campaigns")?;
        let inner = self.inner.lock();
        let mut conflicts = Vec::new();
        for campaign in inner.state.campaigns.values().filter(|c| c.is_active()) {
            for task in inner.state.tasks_for_campaign(campaign.id.as_str()) {
                if scan_job_ids.iter().any(|id| id == &task.scan_job_id) {
                    conflicts.push((task.scan_job_id.clone(), campaign.id.to_string()));
                }
            }
        }
        Ok(conflicts)
    }

    pub fn upsert_task(&self, task: RemediationTask) -> CoreResult<()> {
        self.ensure_migrated("remediation_tasks")?;
        self.apply_and_log(StoreOp::UpsertTask(Box::new(task)))
    }

    pub fn tasks_for_campaign(&self, campaign_id: &str) -> CoreResult<Vec<RemediationTask>> {
        self.ensure_migrated("remediation_tasks")?;
        Ok(self.inner.lock().state.tasks_for_campaign(campaign_id).into_iter().cloned().collect())
    }

    // ---- FixQueueEntry --------------------------------------------------

    pub fn upsert_fix_queue_entry(&self, entry: FixQueueEntry) -> CoreResult<()> {
        self.ensure_migrated("fix_queue_entries")?;
        self.apply_and_log(StoreOp::UpsertFixQueueEntry(Box::new(entry)))
    }

    pub fn get_fix_queue_entry(&self, id: &str) -> CoreResult<FixQueueEntry> {
        self.ensure_migrated("fix_queue_entries")?;
        self.inner.lock().state.fix_queue.get(id).cloned().ok_or_else(|| CoreError::not_found(format!("fix queue entry {id}")))
    }

    pub fn list_fix_queue(&self) -> CoreResult<Vec<FixQueueEntry>> {
        self.ensure_migrated("fix_queue_entries")?;
        Ok(self.inner.lock().state.fix_queue.values().cloned().collect())
    }

    /// Flush any buffered WAL writes to disk. Call on clean shutdown.
    pub fn flush(&self) -> CoreResult<()> {
        self.inner.lock().wal.flush().map_err(|e| CoreError::external(e.to_string()))
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Store {
    /// Open an ephemeral store for tests, already migrated.
    pub fn open_temp(dir: &std::path::Path) -> Self {
        let store = Self::open(dir.join("test.wal")).expect("open temp store");
        store.migrate().expect("migrate temp store");
        store
    }
}
