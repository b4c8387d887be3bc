// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Scanner` — one adapter per scanning tool, all speaking the same
//! `Scan()` contract so the Scanner Runner can fan them out uniformly.
//! Concrete adapters shell out to a local binary or, failing that, a
//! Docker image; both paths are best-effort and never surface as a
//! runner-level error (spec.md §4.C).

mod gitleaks;
mod osv;
mod process;
mod semgrep;
mod trivy;

pub use gitleaks::GitleaksScanner;
pub use osv::OsvScanner;
pub use semgrep::SemgrepScanner;
pub use trivy::TrivyConfigScanner;

use async_trait::async_trait;
use ctrlscan_core::scanner::ScannerKind;
use std::path::Path;

/// Inputs to one scanner run: a checkout path plus the job metadata that
/// a scanner may fold into its invocation (e.g. a commit for annotations).
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub checkout_path: std::path::PathBuf,
    pub scan_job_id: String,
    pub provider: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub commit: String,
}

/// How a scanner run concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Failed,
    Skipped,
}

/// What one scanner adapter hands back to the runner: its raw bytes (if
/// any) plus enough metadata to build a `ScanJobScanner` row without the
/// adapter depending on storage.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub scanner: String,
    pub scanner_type: ScannerKind,
    pub outcome: ScanOutcome,
    pub raw: Vec<u8>,
    pub content_type: String,
    pub error_msg: Option<String>,
    pub hint: Option<String>,
}

impl ScanResult {
    pub fn skipped(scanner: impl Into<String>, kind: ScannerKind, hint: impl Into<String>) -> Self {
        Self {
            scanner: scanner.into(),
            scanner_type: kind,
            outcome: ScanOutcome::Skipped,
            raw: Vec::new(),
            content_type: kind.default_content_type().to_string(),
            error_msg: None,
            hint: Some(hint.into()),
        }
    }

    pub fn failed(scanner: impl Into<String>, kind: ScannerKind, error: impl Into<String>) -> Self {
        Self {
            scanner: scanner.into(),
            scanner_type: kind,
            outcome: ScanOutcome::Failed,
            raw: Vec::new(),
            content_type: kind.default_content_type().to_string(),
            error_msg: Some(error.into()),
            hint: None,
        }
    }

    pub fn completed(scanner: impl Into<String>, kind: ScannerKind, raw: Vec<u8>) -> Self {
        Self {
            scanner: scanner.into(),
            scanner_type: kind,
            outcome: ScanOutcome::Completed,
            content_type: kind.default_content_type().to_string(),
            raw,
            error_msg: None,
            hint: None,
        }
    }
}

/// One scanning tool, uniform across local-binary and Docker invocation.
#[async_trait]
pub trait Scanner: Send + Sync {
    fn name(&self) -> &str;
    fn scanner_type(&self) -> ScannerKind;
    async fn is_available_local(&self) -> bool;
    async fn is_available_docker(&self) -> bool;
    fn docker_image(&self) -> &str;

    /// Run the scan. Never returns `Err`: every failure mode (binary
    /// missing, process error, unparsable output) is folded into the
    /// returned `ScanResult` per spec.md §4.C.
    async fn scan(&self, opts: &ScanOptions) -> ScanResult;
}

/// Resolve which invocation path a scanner should take: local binary if
/// present, else Docker if the daemon is reachable, else neither (the
/// caller should return a `skipped` result with a hint).
pub async fn resolve_availability(scanner: &dyn Scanner) -> AvailabilityPath {
    if scanner.is_available_local().await {
        AvailabilityPath::Local
    } else if scanner.is_available_docker().await {
        AvailabilityPath::Docker
    } else {
        AvailabilityPath::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityPath {
    Local,
    Docker,
    None,
}

/// True if a path under `root` exists — the common "did the scanner even
/// write a report" check shared by every concrete adapter's output read.
pub(crate) fn report_exists(root: &Path, rel: &str) -> bool {
    root.join(rel).is_file()
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ScanOptions, ScanResult, Scanner};
    use async_trait::async_trait;
    use ctrlscan_core::scanner::ScannerKind;
    use parking_lot::Mutex;

    /// Canned scanner: returns a fixed `ScanResult` and records every
    /// `ScanOptions` it was invoked with.
    pub struct FakeScanner {
        name: String,
        kind: ScannerKind,
        local: bool,
        docker: bool,
        next_result: Mutex<ScanResult>,
        calls: Mutex<Vec<ScanOptions>>,
    }

    impl FakeScanner {
        pub fn new(name: impl Into<String>, kind: ScannerKind) -> Self {
            let name = name.into();
            Self {
                next_result: Mutex::new(ScanResult::completed(name.clone(), kind, Vec::new())),
                name,
                kind,
                local: true,
                docker: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn unavailable(mut self) -> Self {
            self.local = false;
            self.docker = false;
            self
        }

        pub fn docker_only(mut self) -> Self {
            self.local = false;
            self.docker = true;
            self
        }

        pub fn returning(self, result: ScanResult) -> Self {
            *self.next_result.lock() = result;
            self
        }

        pub fn calls(&self) -> Vec<ScanOptions> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Scanner for FakeScanner {
        fn name(&self) -> &str {
            &self.name
        }

        fn scanner_type(&self) -> ScannerKind {
            self.kind
        }

        async fn is_available_local(&self) -> bool {
            self.local
        }

        async fn is_available_docker(&self) -> bool {
            self.docker
        }

        fn docker_image(&self) -> &str {
            "fake/scanner"
        }

        async fn scan(&self, opts: &ScanOptions) -> ScanResult {
            self.calls.lock().push(opts.clone());
            if !self.local && !self.docker {
                return ScanResult::skipped(&self.name, self.kind, "fake scanner unavailable");
            }
            let result = self.next_result.lock().clone();
            result
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeScanner;

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ScanOptions {
        ScanOptions {
            checkout_path: std::path::PathBuf::from("/tmp/ctrlscan-clone-xyz"),
            scan_job_id: "scj-1".into(),
            provider: "github".into(),
            owner: "acme".into(),
            repo: "api".into(),
            branch: "main".into(),
            commit: "abc123".into(),
        }
    }

    #[tokio::test]
    async fn unavailable_fake_scanner_is_skipped_with_a_hint() {
        let scanner = fake::FakeScanner::new("osv-scanner", ScannerKind::Sca).unavailable();
        let result = scanner.scan(&opts()).await;
        assert_eq!(result.outcome, ScanOutcome::Skipped);
        assert!(result.hint.is_some());
    }

    #[tokio::test]
    async fn available_fake_scanner_records_the_call() {
        let scanner = fake::FakeScanner::new("semgrep", ScannerKind::Sast);
        let _ = scanner.scan(&opts()).await;
        assert_eq!(scanner.calls().len(), 1);
        assert_eq!(scanner.calls()[0].scan_job_id, "scj-1");
    }

    #[tokio::test]
    async fn resolve_availability_prefers_local_over_docker() {
        let scanner = fake::FakeScanner::new("trivy", ScannerKind::Iac);
        assert_eq!(resolve_availability(&scanner).await, AvailabilityPath::Local);
    }
}
