// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle Engine: folds one scan's deduped findings into the repo's
//! persisted `RepoFindingLifecycle` rows and produces a
//! `ScanJobFindingSummary` (spec.md §4.D).

use ctrlscan_core::finding::{FindingKey, FindingStatus, NormalizedFinding};
use ctrlscan_core::lifecycle::{LifecycleKey, RepoFindingLifecycle};
use ctrlscan_core::repo::Provider;
use ctrlscan_core::summary::ScanJobFindingSummary;
use ctrlscan_core::CoreResult;
use ctrlscan_storage::Store;

/// Everything about the finished scan that the lifecycle algorithm needs
/// beyond the findings themselves.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub provider: Provider,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub scan_job_id: String,
    pub scanned_at_ms: u64,
}

/// Runs the six-step algorithm for one finished scan. Idempotent under
/// retry: re-running with the same `scan_job_id` and findings reproduces
/// the same lifecycle state and summary.
pub fn apply_scan_to_lifecycle(
    store: &Store,
    ctx: &ScanContext,
    findings: &[NormalizedFinding],
) -> CoreResult<ScanJobFindingSummary> {
    // Step 1: load existing lifecycles for this (provider, owner, repo, branch).
    let existing = store.lifecycles_for_repo_branch(ctx.provider, &ctx.owner, &ctx.repo, &ctx.branch)?;
    let mut by_key: std::collections::HashMap<FindingKey, RepoFindingLifecycle> = existing
        .into_iter()
        .map(|l| (FindingKey::new(&l.key.kind, &l.key.fingerprint), l))
        .collect();

    // Step 2: clear prior scan_job_findings rows for this scan (idempotency).
    store.replace_scan_job_findings(&ctx.scan_job_id, Vec::new())?;

    let mut summary = ScanJobFindingSummary::default();
    let mut current_keys = std::collections::HashSet::new();
    let mut snapshot_rows = Vec::with_capacity(findings.len());

    // Step 3: fold each current finding into its lifecycle.
    for finding in findings {
        let key = FindingKey::from(finding);
        current_keys.insert(key.clone());
        let lifecycle_key = LifecycleKey::new(
            ctx.provider,
            &ctx.owner,
            &ctx.repo,
            &ctx.branch,
            finding.kind.to_string(),
            finding.fingerprint.clone(),
        );

        let mut snapshot = finding.clone();
        match by_key.get_mut(&key) {
            None => {
                let lifecycle = RepoFindingLifecycle::new_from_sighting(
                    lifecycle_key,
                    &ctx.scan_job_id,
                    ctx.scanned_at_ms,
                    &ctx.commit,
                    finding.severity,
                    &finding.title,
                    &finding.file_path,
                    finding.line,
                    &finding.message,
                );
                snapshot.first_seen_at_ms = lifecycle.first_seen_at_ms;
                snapshot.introduced = true;
                snapshot.reintroduced = false;
                summary.introduced_count += 1;
                by_key.insert(key, lifecycle);
            }
            Some(lifecycle) if lifecycle.status == FindingStatus::Fixed => {
                lifecycle.reintroduce(
                    &ctx.scan_job_id,
                    ctx.scanned_at_ms,
                    &ctx.commit,
                    finding.severity,
                    &finding.title,
                    &finding.file_path,
                    finding.line,
                    &finding.message,
                );
                snapshot.first_seen_at_ms = lifecycle.first_seen_at_ms;
                snapshot.introduced = false;
                snapshot.reintroduced = true;
                summary.reintroduced_count += 1;
            }
            Some(lifecycle) => {
                lifecycle.refresh_sighting(
                    &ctx.scan_job_id,
                    ctx.scanned_at_ms,
                    &ctx.commit,
                    finding.severity,
                    &finding.title,
                    &finding.file_path,
                    finding.line,
                    &finding.message,
                );
                snapshot.first_seen_at_ms = lifecycle.first_seen_at_ms;
                snapshot.introduced = false;
                snapshot.reintroduced = false;
                summary.present_count += 1;
            }
        }
        snapshot.last_seen_at_ms = ctx.scanned_at_ms;
        snapshot.status = FindingStatus::Open;
        snapshot_rows.push(snapshot);
    }
    // present_count so far only counts continuing-open findings; fold in
    // the introduced/reintroduced ones too, per the invariant in summary.rs.
    summary.present_count += summary.introduced_count + summary.reintroduced_count;

    // Step 4: anything open but absent from the current scan is now fixed.
    for lifecycle in by_key.values_mut() {
        let key = FindingKey::new(&lifecycle.key.kind, &lifecycle.key.fingerprint);
        if lifecycle.status == FindingStatus::Open && !current_keys.contains(&key) {
            lifecycle.mark_fixed(&ctx.scan_job_id, ctx.scanned_at_ms, &ctx.commit);
            summary.fixed_count += 1;
        }
    }

    for lifecycle in by_key.into_values() {
        store.upsert_lifecycle(lifecycle)?;
    }

    // Step 5: persist the snapshot rows for this scan.
    store.replace_scan_job_findings(&ctx.scan_job_id, snapshot_rows)?;

    // Step 6: upsert the summary, overwriting any prior retry's summary.
    store.upsert_finding_summary(&ctx.scan_job_id, summary)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlscan_core::finding::{NormalizedFinding, Severity};
    use ctrlscan_core::scanner::ScannerKind;
    use ctrlscan_storage::Store;
    use tempfile::tempdir;

    fn ctx(scan_job_id: &str, scanned_at_ms: u64) -> ScanContext {
        ScanContext {
            provider: Provider::GitHub,
            owner: "acme".into(),
            repo: "api".into(),
            branch: "main".into(),
            commit: format!("c{scanned_at_ms}"),
            scan_job_id: scan_job_id.into(),
            scanned_at_ms,
        }
    }

    fn finding(fingerprint: &str, kind: ScannerKind) -> NormalizedFinding {
        let mut f = NormalizedFinding::fixture().build();
        f.fingerprint = fingerprint.to_string();
        f.kind = kind;
        f.severity = Severity::High;
        f
    }

    #[test]
    fn first_scan_introduces_every_finding() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let findings = vec![finding("a", ScannerKind::Sca), finding("b", ScannerKind::Sca)];

        let summary = apply_scan_to_lifecycle(&store, &ctx("scj-1", 100), &findings).unwrap();
        assert_eq!(summary.introduced_count, 2);
        assert_eq!(summary.fixed_count, 0);
        assert!(summary.present_decomposition_holds(0));
    }

    #[test]
    fn finding_absent_in_second_scan_is_marked_fixed() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        apply_scan_to_lifecycle(&store, &ctx("scj-1", 100), &[finding("a", ScannerKind::Sca)]).unwrap();

        let summary = apply_scan_to_lifecycle(&store, &ctx("scj-2", 200), &[]).unwrap();
        assert_eq!(summary.fixed_count, 1);

        let lifecycles = store.lifecycles_for_repo_branch(Provider::GitHub, "acme", "api", "main").unwrap();
        assert_eq!(lifecycles.len(), 1);
        assert_eq!(lifecycles[0].status, FindingStatus::Fixed);
        assert!(lifecycles[0].status_dichotomy_holds());
    }

    #[test]
    fn reappearing_after_fixed_increments_reintroduced_count() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        apply_scan_to_lifecycle(&store, &ctx("scj-1", 100), &[finding("a", ScannerKind::Sca)]).unwrap();
        apply_scan_to_lifecycle(&store, &ctx("scj-2", 200), &[]).unwrap();

        let summary = apply_scan_to_lifecycle(&store, &ctx("scj-3", 300), &[finding("a", ScannerKind::Sca)]).unwrap();
        assert_eq!(summary.reintroduced_count, 1);

        let lifecycles = store.lifecycles_for_repo_branch(Provider::GitHub, "acme", "api", "main").unwrap();
        assert_eq!(lifecycles[0].reintroduced_count, 1);
        assert_eq!(lifecycles[0].status, FindingStatus::Open);
    }

    #[test]
    fn retrying_the_same_scan_overwrites_the_summary_without_double_counting() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let findings = vec![finding("a", ScannerKind::Sca)];

        apply_scan_to_lifecycle(&store, &ctx("scj-1", 100), &findings).unwrap();
        let retried = apply_scan_to_lifecycle(&store, &ctx("scj-1", 100), &findings).unwrap();

        let lifecycles = store.lifecycles_for_repo_branch(Provider::GitHub, "acme", "api", "main").unwrap();
        assert_eq!(lifecycles.len(), 1, "retry must not duplicate lifecycle rows");
        assert_eq!(retried.introduced_count, 0, "the lifecycle already existed, so the retry sees it as continuing-open");
        assert!(retried.present_decomposition_holds(1), "the one finding is continuing-open, not introduced");
    }

    #[test]
    fn unrelated_kinds_with_the_same_fingerprint_are_tracked_separately() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let findings = vec![finding("shared", ScannerKind::Sca), finding("shared", ScannerKind::Sast)];

        let summary = apply_scan_to_lifecycle(&store, &ctx("scj-1", 100), &findings).unwrap();
        assert_eq!(summary.introduced_count, 2);
    }
}
