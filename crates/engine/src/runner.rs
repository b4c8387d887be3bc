// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scanner Runner: fans a repo checkout out to every registered [`Scanner`]
//! adapter, normalizes and persists each one's output, and aggregates an
//! overall [`ScanStatus`] (spec.md §4.C).

use ctrlscan_adapters::{ScanOptions, ScanOutcome as AdapterOutcome, ScanResult, Scanner};
use ctrlscan_core::clock::Clock;
use ctrlscan_core::finding::NormalizedFinding;
use ctrlscan_core::repo::Provider;
use ctrlscan_core::scan_job::{ScanStatus, SeverityCounts};
use ctrlscan_core::scanner::{RawScannerOutput, ScanJobScanner, ScannerRunStatus};
use ctrlscan_core::CoreResult;
use ctrlscan_storage::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::normalize::{dedup_findings, normalize_raw};

/// How many in-flight scanner results the parallel fan-out buffers before a
/// sender blocks — the "bounded channel" spec.md §4.C calls for.
const CHANNEL_CAPACITY: usize = 8;

/// Everything the runner needs about the repo checkout and job beyond the
/// scanner list itself.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub job_id: String,
    pub checkout_path: PathBuf,
    pub provider: Provider,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub parallel: bool,
}

impl RunParams {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            checkout_path: self.checkout_path.clone(),
            scan_job_id: self.job_id.clone(),
            provider: self.provider.to_string(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            commit: self.commit.clone(),
        }
    }
}

/// What one finished scan produced: the job's aggregated status plus the
/// deduped findings the Lifecycle Engine folds in next.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: ScanStatus,
    pub severity: SeverityCounts,
    pub findings: Vec<NormalizedFinding>,
}

/// Runs every scanner in `scanners` against `params.checkout_path`,
/// persists per-scanner rows and raw output, finalizes the `ScanJob` row,
/// and returns the aggregated outcome. Never returns `Err` for a scanner
/// failure — only a `Store` I/O error propagates.
pub async fn run_scan<C: Clock>(
    store: &Store,
    clock: &C,
    scanners: &[Arc<dyn Scanner>],
    params: &RunParams,
    cancel: CancellationToken,
) -> CoreResult<RunOutcome> {
    let opts = params.scan_options();
    let timed = if params.parallel {
        run_parallel(scanners, &opts, &cancel).await
    } else {
        run_sequential(scanners, &opts, &cancel).await
    };

    let mut all_findings = Vec::new();
    for (result, duration_ms) in &timed {
        let findings = if result.outcome == AdapterOutcome::Completed && !result.raw.is_empty() {
            match normalize_raw(result.scanner_type, &params.job_id, &result.scanner, &result.raw) {
                Ok(findings) => findings,
                Err(e) => {
                    tracing::warn!(scanner = %result.scanner, error = %e, "failed to normalize scanner output");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        persist_scanner_row(store, &cancel, &params.job_id, result, *duration_ms, findings.len() as u32)?;
        persist_raw_output(store, &cancel, &params.job_id, result)?;

        all_findings.extend(findings);
    }

    let findings = dedup_findings(all_findings);
    let severity = sum_severity(&findings);
    let status = aggregate_status(&timed);

    finalize_job(store, clock, &cancel, &params.job_id, status, severity)?;

    Ok(RunOutcome { status, severity, findings })
}

async fn run_parallel(scanners: &[Arc<dyn Scanner>], opts: &ScanOptions, cancel: &CancellationToken) -> Vec<(ScanResult, u64)> {
    if scanners.is_empty() {
        return Vec::new();
    }
    let capacity = CHANNEL_CAPACITY.min(scanners.len());
    let (tx, mut rx) = mpsc::channel(capacity);
    let mut workers = JoinSet::new();

    for scanner in scanners.iter().cloned() {
        let tx = tx.clone();
        let opts = opts.clone();
        let cancel = cancel.clone();
        workers.spawn(async move {
            let (result, duration_ms) = if cancel.is_cancelled() {
                (
                    ScanResult::skipped(scanner.name(), scanner.scanner_type(), "sweep canceled before this scanner started"),
                    0,
                )
            } else {
                let started = Instant::now();
                let result = scanner.scan(&opts).await;
                (result, started.elapsed().as_millis() as u64)
            };
            if tx.send((result, duration_ms)).await.is_err() {
                tracing::warn!(scanner = scanner.name(), "dropped scanner result: runner already collecting elsewhere");
            }
        });
    }
    // Dropping our own sender lets the channel close once every spawned
    // worker's clone has also been dropped, so `rx.recv()` terminates the
    // loop below without a separate "closed" signal.
    drop(tx);

    let mut results = Vec::with_capacity(scanners.len());
    while let Some(item) = rx.recv().await {
        results.push(item);
    }
    // Drain the join set so a panicking worker is observed (join error
    // logged) rather than silently vanishing.
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "scanner task panicked");
        }
    }
    results
}

async fn run_sequential(scanners: &[Arc<dyn Scanner>], opts: &ScanOptions, cancel: &CancellationToken) -> Vec<(ScanResult, u64)> {
    let mut results = Vec::with_capacity(scanners.len());
    for scanner in scanners {
        if cancel.is_cancelled() {
            results.push((
                ScanResult::skipped(scanner.name(), scanner.scanner_type(), "sweep canceled before this scanner ran"),
                0,
            ));
            continue;
        }
        let started = Instant::now();
        let result = scanner.scan(opts).await;
        results.push((result, started.elapsed().as_millis() as u64));
    }
    results
}

fn map_outcome(outcome: AdapterOutcome) -> ScannerRunStatus {
    match outcome {
        AdapterOutcome::Completed => ScannerRunStatus::Completed,
        AdapterOutcome::Failed => ScannerRunStatus::Failed,
        AdapterOutcome::Skipped => ScannerRunStatus::Skipped,
    }
}

/// `completed` iff every scanner completed; `partial` iff at least one
/// completed and at least one didn't; `failed` otherwise (spec.md §4.C). A
/// job with no registered scanners is vacuously `completed`.
fn aggregate_status(timed: &[(ScanResult, u64)]) -> ScanStatus {
    if timed.is_empty() {
        return ScanStatus::Completed;
    }
    let completed = timed.iter().filter(|(r, _)| r.outcome == AdapterOutcome::Completed).count();
    if completed == timed.len() {
        ScanStatus::Completed
    } else if completed > 0 {
        ScanStatus::Partial
    } else {
        ScanStatus::Failed
    }
}

fn sum_severity(findings: &[NormalizedFinding]) -> SeverityCounts {
    use ctrlscan_core::finding::Severity;
    let mut counts = SeverityCounts::default();
    for f in findings {
        match f.severity {
            Severity::Critical => counts.critical += 1,
            Severity::High => counts.high += 1,
            Severity::Medium => counts.medium += 1,
            Severity::Low => counts.low += 1,
        }
    }
    counts
}

/// Scanner-result and raw-output persistence never skips under
/// cancellation — only logs — per spec.md §4.C: "persistence is redirected
/// ... to preserve completion state rather than dropping it."
fn persist_scanner_row(
    store: &Store,
    cancel: &CancellationToken,
    job_id: &str,
    result: &ScanResult,
    duration_ms: u64,
    findings_count: u32,
) -> CoreResult<()> {
    if cancel.is_cancelled() {
        tracing::warn!(scanner = %result.scanner, "persisting scanner result after cancellation; completing anyway");
    }
    store.upsert_scanner_result(ScanJobScanner {
        scan_job_id: job_id.to_string(),
        scanner_name: result.scanner.clone(),
        scanner_type: result.scanner_type,
        status: map_outcome(result.outcome),
        findings_count,
        duration_ms,
        error_msg: result.error_msg.clone(),
        hint: result.hint.clone(),
    })
}

fn persist_raw_output(store: &Store, cancel: &CancellationToken, job_id: &str, result: &ScanResult) -> CoreResult<()> {
    if result.raw.is_empty() {
        return Ok(());
    }
    if cancel.is_cancelled() {
        tracing::warn!(scanner = %result.scanner, "persisting raw output after cancellation; completing anyway");
    }
    store.upsert_raw_output(RawScannerOutput {
        scan_job_id: job_id.to_string(),
        scanner_name: result.scanner.clone(),
        content_type: result.content_type.clone(),
        payload: result.raw.clone(),
    })
}

/// Job finalization is best-effort under cancellation: if a stop was
/// requested mid-run, the orchestrator owns transitioning this job to
/// `stopped` and the runner skips its own update rather than racing it
/// (spec.md §4.C, §4.E).
fn finalize_job<C: Clock>(
    store: &Store,
    clock: &C,
    cancel: &CancellationToken,
    job_id: &str,
    status: ScanStatus,
    severity: SeverityCounts,
) -> CoreResult<()> {
    if cancel.is_cancelled() {
        tracing::warn!(job_id, "skipping job finalization: sweep was canceled mid-run");
        return Ok(());
    }
    let mut job = store.get_scan_job(job_id)?;
    job.status = status;
    job.severity = severity;
    job.completed_at_ms = Some(clock.epoch_ms());
    store.upsert_scan_job(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlscan_adapters::FakeScanner;
    use ctrlscan_core::clock::FakeClock;
    use ctrlscan_core::scan_job::ScanJob;
    use ctrlscan_core::scanner::ScannerKind;
    use tempfile::tempdir;

    fn params(job_id: &str, parallel: bool) -> RunParams {
        RunParams {
            job_id: job_id.to_string(),
            checkout_path: PathBuf::from("/tmp/ctrlscan-clone-test"),
            provider: Provider::GitHub,
            owner: "acme".into(),
            repo: "api".into(),
            branch: "main".into(),
            commit: "deadbeef".into(),
            parallel,
        }
    }

    fn seed_running_job(store: &Store, job_id: &str) {
        store.upsert_scan_job(ScanJob::fixture().id(job_id).status(ScanStatus::Running).build()).unwrap();
    }

    fn sca_payload() -> Vec<u8> {
        serde_json::json!({
            "results": [{
                "source": {"path": "package.json"},
                "packages": [{
                    "package": {"name": "lodash", "version": "4.17.0"},
                    "vulnerabilities": [{"id": "GHSA-1", "summary": "prototype pollution", "database_specific": {"severity": "CRITICAL"}}]
                }]
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn completed_scanners_yield_completed_status_and_findings() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let clock = FakeClock::default();
        seed_running_job(&store, "scj-1");

        let scanner: Arc<dyn Scanner> =
            Arc::new(FakeScanner::new("osv-scanner", ScannerKind::Sca).returning(ScanResult::completed("osv-scanner", ScannerKind::Sca, sca_payload())));

        let outcome = run_scan(&store, &clock, &[scanner], &params("scj-1", true), CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, ScanStatus::Completed);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.severity.critical, 1);

        let job = store.get_scan_job("scj-1").unwrap();
        assert_eq!(job.status, ScanStatus::Completed);
        assert_eq!(job.severity.critical, 1);
        assert!(job.completed_at_ms.is_some());
    }

    #[tokio::test]
    async fn mixed_outcomes_produce_partial_status() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let clock = FakeClock::default();
        seed_running_job(&store, "scj-2");

        let ok: Arc<dyn Scanner> = Arc::new(FakeScanner::new("osv-scanner", ScannerKind::Sca));
        let broken: Arc<dyn Scanner> =
            Arc::new(FakeScanner::new("semgrep", ScannerKind::Sast).returning(ScanResult::failed("semgrep", ScannerKind::Sast, "boom")));

        let outcome = run_scan(&store, &clock, &[ok, broken], &params("scj-2", false), CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, ScanStatus::Partial);
    }

    #[tokio::test]
    async fn unavailable_scanner_is_skipped_not_failed() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let clock = FakeClock::default();
        seed_running_job(&store, "scj-3");

        let missing: Arc<dyn Scanner> = Arc::new(FakeScanner::new("trivy", ScannerKind::Iac).unavailable());
        let outcome = run_scan(&store, &clock, &[missing], &params("scj-3", false), CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, ScanStatus::Failed, "every scanner skipped means none completed");

        let rows = store.findings_for_scan_job("scj-3").unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn canceled_before_start_skips_every_scanner_and_job_finalization() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let clock = FakeClock::default();
        seed_running_job(&store, "scj-4");

        let scanner: Arc<dyn Scanner> = Arc::new(FakeScanner::new("osv-scanner", ScannerKind::Sca));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run_scan(&store, &clock, &[scanner], &params("scj-4", true), cancel).await.unwrap();
        assert_eq!(outcome.status, ScanStatus::Failed);

        let job = store.get_scan_job("scj-4").unwrap();
        assert_eq!(job.status, ScanStatus::Running, "finalization is skipped under cancellation; orchestrator owns the stopped transition");
    }

    #[tokio::test]
    async fn no_registered_scanners_is_vacuously_completed() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let clock = FakeClock::default();
        seed_running_job(&store, "scj-5");

        let outcome = run_scan(&store, &clock, &[], &params("scj-5", true), CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, ScanStatus::Completed);
        assert!(outcome.findings.is_empty());
    }

    #[tokio::test]
    async fn sequential_mode_preserves_per_scanner_rows() {
        let dir = tempdir().unwrap();
        let store = Store::open_temp(dir.path());
        let clock = FakeClock::default();
        seed_running_job(&store, "scj-6");

        let a: Arc<dyn Scanner> = Arc::new(FakeScanner::new("osv-scanner", ScannerKind::Sca));
        let b: Arc<dyn Scanner> = Arc::new(FakeScanner::new("gitleaks", ScannerKind::Secrets));

        run_scan(&store, &clock, &[a, b], &params("scj-6", false), CancellationToken::new()).await.unwrap();
        // Both adapters ran and persisted rows; severity is zero since the
        // fake scanner's default payload is empty.
        let job = store.get_scan_job("scj-6").unwrap();
        assert_eq!(job.status, ScanStatus::Completed);
    }
}
