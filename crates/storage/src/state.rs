// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-memory materialized view rebuilt by replaying the WAL. This is
//! the "database" half of the store; [`crate::store::Store`] is the
//! transactional façade over it.
//!
//! Every table keys on a plain `String` rather than a composite struct or
//! tuple: the state snapshot round-trips through JSON, and JSON object
//! keys must be strings.

use crate::op::StoreOp;
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
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

fn scanner_key(scan_job_id: &str, scanner_name: &str) -> String {
    format!("{scan_job_id}|{scanner_name}")
}

fn task_key(campaign_id: &str, scan_job_id: &str) -> String {
    format!("{campaign_id}|{scan_job_id}")
}

/// Every table the store exposes, materialized as an ordinary in-memory
/// collection. `IndexMap` preserves insertion order where the contract
/// requires stable iteration (queue, schedules, campaigns, fix queue);
/// plain `HashMap` is used for purely keyed-lookup tables.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    pub scan_jobs: IndexMap<String, ScanJob>,
    pub scan_job_scanners: HashMap<String, ScanJobScanner>,
    pub raw_outputs: HashMap<String, RawScannerOutput>,
    pub scan_job_findings: HashMap<String, Vec<NormalizedFinding>>,
    pub finding_summaries: HashMap<String, ScanJobFindingSummary>,
    pub lifecycles: HashMap<String, RepoFindingLifecycle>,
    pub queue: IndexMap<String, RepoQueueEntry>,
    pub schedules: IndexMap<String, Schedule>,
    pub campaigns: IndexMap<String, RemediationCampaign>,
    pub tasks: HashMap<String, RemediationTask>,
    pub fix_queue: IndexMap<String, FixQueueEntry>,
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one logged operation. This is the only place state mutates;
    /// both live writes and WAL replay funnel through here.
    pub fn apply(&mut self, op: &StoreOp) {
        match op {
            StoreOp::UpsertScanJob(job) => {
                self.scan_jobs.insert(job.id.to_string(), (**job).clone());
            }
            StoreOp::DeleteScanJob { scan_job_id } => {
                self.scan_jobs.shift_remove(scan_job_id);
                self.scan_job_scanners.retain(|k, _| !k.starts_with(&format!("{scan_job_id}|")));
                self.raw_outputs.retain(|k, _| !k.starts_with(&format!("{scan_job_id}|")));
                self.scan_job_findings.remove(scan_job_id);
                self.finding_summaries.remove(scan_job_id);
                self.fix_queue.retain(|_, e| &e.scan_job_id != scan_job_id);
            }
            StoreOp::UpsertScanJobScanner(s) => {
                self.scan_job_scanners.insert(scanner_key(&s.scan_job_id, &s.scanner_name), (**s).clone());
            }
            StoreOp::UpsertRawOutput(r) => {
                self.raw_outputs.insert(scanner_key(&r.scan_job_id, &r.scanner_name), (**r).clone());
            }
            StoreOp::ReplaceScanJobFindings { scan_job_id, findings } => {
                self.scan_job_findings.insert(scan_job_id.clone(), findings.clone());
            }
            StoreOp::UpsertFindingSummary { scan_job_id, summary } => {
                self.finding_summaries.insert(scan_job_id.clone(), *summary);
            }
            StoreOp::UpsertLifecycle(l) => {
                self.lifecycles.insert(l.key.dedup_key(), (**l).clone());
            }
            StoreOp::DeleteLifecycle { provider, owner, repo, branch, kind, fingerprint } => {
                let key = format!(
                    "{}|{}|{}|{}|{}|{}",
                    provider.to_ascii_lowercase(),
                    owner.to_ascii_lowercase(),
                    repo.to_ascii_lowercase(),
                    branch.to_ascii_lowercase(),
                    kind.to_ascii_lowercase(),
                    fingerprint.to_ascii_lowercase()
                );
                self.lifecycles.remove(&key);
            }
            StoreOp::UpsertQueueEntry(q) => {
                self.queue.insert(q.key.dedup_key(), (**q).clone());
            }
            StoreOp::UpsertSchedule(s) => {
                self.schedules.insert(s.id.to_string(), (**s).clone());
            }
            StoreOp::DeleteSchedule { schedule_id } => {
                self.schedules.shift_remove(schedule_id);
            }
            StoreOp::UpsertCampaign(c) => {
                self.campaigns.insert(c.id.to_string(), (**c).clone());
            }
            StoreOp::UpsertTask(t) => {
                self.tasks.insert(task_key(t.campaign_id.as_str(), &t.scan_job_id), (**t).clone());
            }
            StoreOp::UpsertFixQueueEntry(f) => {
                self.fix_queue.insert(f.id.to_string(), (**f).clone());
            }
        }
    }

    /// Queue entries ordered priority DESC, discovered_at ASC (spec.md
    /// §4.E's dequeue order), filtered to `pending`.
    pub fn pending_queue_entries(&self) -> Vec<&RepoQueueEntry> {
        let mut entries: Vec<&RepoQueueEntry> = self
            .queue
            .values()
            .filter(|e| e.status == ctrlscan_core::queue::QueueStatus::Pending)
            .collect();
        entries.sort_by(|a, b| ctrlscan_core::queue::queue_order(a, b));
        entries
    }

    pub fn tasks_for_campaign(&self, campaign_id: &str) -> Vec<&RemediationTask> {
        self.tasks.values().filter(|t| t.campaign_id.as_str() == campaign_id).collect()
    }

    pub fn findings_for_scan_job(&self, scan_job_id: &str) -> &[NormalizedFinding] {
        self.scan_job_findings.get(scan_job_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lifecycle(&self, key: &ctrlscan_core::lifecycle::LifecycleKey) -> Option<&RepoFindingLifecycle> {
        self.lifecycles.get(&key.dedup_key())
    }

    /// All lifecycles scoped to one (provider, owner, repo, branch), for
    /// the Lifecycle Engine's step 1 ("load all existing lifecycles").
    pub fn lifecycles_for_repo_branch(
        &self,
        provider: ctrlscan_core::repo::Provider,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Vec<&RepoFindingLifecycle> {
        self.lifecycles
            .values()
            .filter(|l| {
                l.key.provider == provider
                    && l.key.owner.eq_ignore_ascii_case(owner)
                    && l.key.repo.eq_ignore_ascii_case(repo)
                    && l.key.branch.eq_ignore_ascii_case(branch)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlscan_core::queue::QueueStatus;
    use ctrlscan_core::repo::{Provider, RepoKey};

    fn queue_entry(owner: &str, priority: i32, discovered_at_ms: u64) -> RepoQueueEntry {
        let mut e = RepoQueueEntry::new(RepoKey::new(Provider::GitHub, "github.com", owner, "repo"), "url", "main", discovered_at_ms);
        e.priority = priority;
        e
    }

    #[test]
    fn apply_upsert_scan_job_is_idempotent_by_id() {
        let mut state = MaterializedState::new();
        let job = ScanJob::fixture().build();
        state.apply(&StoreOp::UpsertScanJob(Box::new(job.clone())));
        state.apply(&StoreOp::UpsertScanJob(Box::new(job)));
        assert_eq!(state.scan_jobs.len(), 1);
    }

    #[test]
    fn delete_scan_job_cascades_to_children() {
        let mut state = MaterializedState::new();
        let job = ScanJob::fixture().build();
        let job_id = job.id.to_string();
        state.apply(&StoreOp::UpsertScanJob(Box::new(job)));
        state.apply(&StoreOp::ReplaceScanJobFindings { scan_job_id: job_id.clone(), findings: vec![] });
        state.apply(&StoreOp::DeleteScanJob { scan_job_id: job_id.clone() });
        assert!(!state.scan_jobs.contains_key(&job_id));
        assert!(!state.scan_job_findings.contains_key(&job_id));
    }

    #[test]
    fn pending_queue_entries_orders_by_priority_then_discovery() {
        let mut state = MaterializedState::new();
        let low = queue_entry("a", 0, 100);
        let high = queue_entry("b", 5, 200);
        let mut claimed = queue_entry("c", 9, 1);
        claimed.status = QueueStatus::Claimed;

        state.apply(&StoreOp::UpsertQueueEntry(Box::new(low)));
        state.apply(&StoreOp::UpsertQueueEntry(Box::new(high)));
        state.apply(&StoreOp::UpsertQueueEntry(Box::new(claimed)));

        let pending = state.pending_queue_entries();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].priority, 5);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = MaterializedState::new();
        state.apply(&StoreOp::UpsertScanJob(Box::new(ScanJob::fixture().build())));
        let json = serde_json::to_string(&state).unwrap();
        let back: MaterializedState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scan_jobs.len(), 1);
    }
}
