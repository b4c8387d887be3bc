// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The long-lived identity of a finding across scans (spec.md §3's
//! `RepoFindingLifecycle`) and its per-repo scoping key.

use crate::finding::{FindingStatus, Severity};
use crate::repo::Provider;
use serde::{Deserialize, Serialize};

/// (provider, owner, repo, branch, kind, fingerprint) — the unique key a
/// lifecycle row is addressed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LifecycleKey {
    pub provider: Provider,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub kind: String,
    pub fingerprint: String,
}

impl LifecycleKey {
    pub fn new(
        provider: Provider,
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        kind: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            kind: kind.into().to_ascii_lowercase(),
            fingerprint: fingerprint.into().to_ascii_lowercase(),
        }
    }

    /// Canonical string form, used as the map key in the persisted store
    /// (JSON object keys must be strings, unlike an in-memory struct key).
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.provider,
            self.owner.to_ascii_lowercase(),
            self.repo.to_ascii_lowercase(),
            self.branch.to_ascii_lowercase(),
            self.kind,
            self.fingerprint
        )
    }
}

/// The long-lived identity of one finding across every scan of a
/// (provider, owner, repo, branch). Exactly one row per [`LifecycleKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoFindingLifecycle {
    pub key: LifecycleKey,
    pub status: FindingStatus,
    pub first_seen_scan_job_id: String,
    pub first_seen_at_ms: u64,
    pub first_seen_commit: String,
    pub last_seen_scan_job_id: String,
    pub last_seen_at_ms: u64,
    pub last_seen_commit: String,
    pub fixed_at_scan_job_id: Option<String>,
    pub fixed_at_ms: Option<u64>,
    pub fixed_at_commit: Option<String>,
    pub reintroduced_count: u32,
    pub total_seen_count: u32,
    /// Denormalized "latest" display fields, refreshed on every sighting.
    pub latest_severity: Severity,
    pub latest_title: String,
    pub latest_file_path: String,
    pub latest_line: Option<u64>,
    pub latest_message: String,
}

impl RepoFindingLifecycle {
    /// Invariant 6: `status == Fixed` iff `fixed_at_scan_job_id` is set.
    pub fn status_dichotomy_holds(&self) -> bool {
        (self.status == FindingStatus::Fixed) == self.fixed_at_scan_job_id.is_some()
    }

    pub fn new_from_sighting(
        key: LifecycleKey,
        scan_job_id: impl Into<String>,
        at_ms: u64,
        commit: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        file_path: impl Into<String>,
        line: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let scan_job_id = scan_job_id.into();
        let commit = commit.into();
        Self {
            key,
            status: FindingStatus::Open,
            first_seen_scan_job_id: scan_job_id.clone(),
            first_seen_at_ms: at_ms,
            first_seen_commit: commit.clone(),
            last_seen_scan_job_id: scan_job_id,
            last_seen_at_ms: at_ms,
            last_seen_commit: commit,
            fixed_at_scan_job_id: None,
            fixed_at_ms: None,
            fixed_at_commit: None,
            reintroduced_count: 0,
            total_seen_count: 1,
            latest_severity: severity,
            latest_title: title.into(),
            latest_file_path: file_path.into(),
            latest_line: line,
            latest_message: message.into(),
        }
    }

    /// Refresh `last_seen_*` and display fields for a continuing-open or
    /// reintroduced sighting. Does not touch `status` or `fixed_at_*`.
    pub fn refresh_sighting(
        &mut self,
        scan_job_id: impl Into<String>,
        at_ms: u64,
        commit: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        file_path: impl Into<String>,
        line: Option<u64>,
        message: impl Into<String>,
    ) {
        self.last_seen_scan_job_id = scan_job_id.into();
        self.last_seen_at_ms = at_ms;
        self.last_seen_commit = commit.into();
        self.total_seen_count += 1;
        self.latest_severity = severity;
        self.latest_title = title.into();
        self.latest_file_path = file_path.into();
        self.latest_line = line;
        self.latest_message = message.into();
    }

    /// Transition a `fixed` lifecycle back to `open` on reintroduction.
    /// Invariant 5: increments `reintroduced_count` only on this transition.
    pub fn reintroduce(
        &mut self,
        scan_job_id: impl Into<String>,
        at_ms: u64,
        commit: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        file_path: impl Into<String>,
        line: Option<u64>,
        message: impl Into<String>,
    ) {
        debug_assert_eq!(self.status, FindingStatus::Fixed, "reintroduce called on a non-fixed lifecycle");
        self.status = FindingStatus::Open;
        self.fixed_at_scan_job_id = None;
        self.fixed_at_ms = None;
        self.fixed_at_commit = None;
        self.reintroduced_count += 1;
        self.refresh_sighting(scan_job_id, at_ms, commit, severity, title, file_path, line, message);
    }

    /// Transition an `open` lifecycle to `fixed` because it was absent from
    /// the current scan.
    pub fn mark_fixed(&mut self, scan_job_id: impl Into<String>, at_ms: u64, commit: impl Into<String>) {
        let scan_job_id = scan_job_id.into();
        let commit = commit.into();
        self.status = FindingStatus::Fixed;
        self.fixed_at_scan_job_id = Some(scan_job_id);
        self.fixed_at_ms = Some(at_ms);
        self.fixed_at_commit = Some(commit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> LifecycleKey {
        LifecycleKey::new(Provider::GitHub, "acme", "api", "main", "sca", "deadbeef")
    }

    #[test]
    fn new_lifecycle_is_open_with_one_sighting() {
        let l = RepoFindingLifecycle::new_from_sighting(
            key(), "scj-1", 100, "c1", Severity::High, "t", "f", Some(1), "m",
        );
        assert_eq!(l.status, FindingStatus::Open);
        assert_eq!(l.total_seen_count, 1);
        assert_eq!(l.reintroduced_count, 0);
        assert!(l.status_dichotomy_holds());
    }

    #[test]
    fn mark_fixed_then_reintroduce_increments_reintroduced_count() {
        let mut l = RepoFindingLifecycle::new_from_sighting(
            key(), "scj-1", 100, "c1", Severity::High, "t", "f", Some(1), "m",
        );
        l.mark_fixed("scj-2", 200, "c2");
        assert!(l.status_dichotomy_holds());
        assert_eq!(l.status, FindingStatus::Fixed);

        l.reintroduce("scj-3", 300, "c3", Severity::High, "t", "f", Some(1), "m");
        assert_eq!(l.status, FindingStatus::Open);
        assert_eq!(l.reintroduced_count, 1);
        assert!(l.fixed_at_scan_job_id.is_none());
        assert!(l.status_dichotomy_holds());
    }

    #[test]
    fn total_seen_count_is_monotonic_across_refreshes() {
        let mut l = RepoFindingLifecycle::new_from_sighting(
            key(), "scj-1", 100, "c1", Severity::High, "t", "f", Some(1), "m",
        );
        let before = l.total_seen_count;
        l.refresh_sighting("scj-2", 200, "c2", Severity::High, "t", "f", Some(1), "m");
        assert!(l.total_seen_count > before);
    }
}
