// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gitleaks` adapter — secret detection. Reports NDJSON, one finding per
//! line, so its content type is `application/x-ndjson` (spec.md §4.B).

use super::process::{binary_available, docker_available, run_capture, run_docker_capture};
use super::{report_exists, ScanOptions, ScanResult, Scanner};
use async_trait::async_trait;
use ctrlscan_core::scanner::ScannerKind;

/// gitleaks exits 1 when leaks are found; only other codes indicate the
/// scan itself failed.
const RAN_EXIT_CODES: [i32; 2] = [0, 1];
const REPORT_REL_PATH: &str = ".ctrlscan-gitleaks-report.ndjson";

pub struct GitleaksScanner;

#[async_trait]
impl Scanner for GitleaksScanner {
    fn name(&self) -> &str {
        "gitleaks"
    }

    fn scanner_type(&self) -> ScannerKind {
        ScannerKind::Secrets
    }

    async fn is_available_local(&self) -> bool {
        binary_available("gitleaks", &["version"]).await
    }

    async fn is_available_docker(&self) -> bool {
        docker_available().await
    }

    fn docker_image(&self) -> &str {
        "zricethezav/gitleaks"
    }

    async fn scan(&self, opts: &ScanOptions) -> ScanResult {
        let args = [
            "detect",
            "--source",
            ".",
            "--no-git",
            "--report-format",
            "ndjson",
            "--report-path",
            REPORT_REL_PATH,
        ];
        let output = if self.is_available_local().await {
            run_capture(self.name(), &args, &opts.checkout_path).await
        } else if self.is_available_docker().await {
            run_docker_capture(self.docker_image(), &args, &opts.checkout_path).await
        } else {
            return ScanResult::skipped(self.name(), self.scanner_type(), "gitleaks not found locally or via docker");
        };

        match output {
            Ok(out) if RAN_EXIT_CODES.contains(&out.status.code().unwrap_or(-1)) => {
                let raw = if report_exists(&opts.checkout_path, REPORT_REL_PATH) {
                    std::fs::read(opts.checkout_path.join(REPORT_REL_PATH)).unwrap_or_default()
                } else {
                    Vec::new()
                };
                ScanResult::completed(self.name(), self.scanner_type(), raw)
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
                tracing::warn!(scanner = self.name(), code = ?out.status.code(), %stderr, "scan exited with an unexpected status");
                ScanResult::failed(self.name(), self.scanner_type(), stderr)
            }
            Err(e) => {
                tracing::warn!(scanner = self.name(), error = %e, "failed to spawn scanner process");
                ScanResult::failed(self.name(), self.scanner_type(), e.to_string())
            }
        }
    }
}
