// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `semgrep` adapter — static code analysis (sast).

use super::process::{binary_available, docker_available, run_capture, run_docker_capture};
use super::{ScanOptions, ScanResult, Scanner};
use async_trait::async_trait;
use ctrlscan_core::scanner::ScannerKind;

/// semgrep exits 1 when findings are present; only other codes indicate
/// the scan itself failed.
const RAN_EXIT_CODES: [i32; 2] = [0, 1];

pub struct SemgrepScanner;

#[async_trait]
impl Scanner for SemgrepScanner {
    fn name(&self) -> &str {
        "semgrep"
    }

    fn scanner_type(&self) -> ScannerKind {
        ScannerKind::Sast
    }

    async fn is_available_local(&self) -> bool {
        binary_available("semgrep", &["--version"]).await
    }

    async fn is_available_docker(&self) -> bool {
        docker_available().await
    }

    fn docker_image(&self) -> &str {
        "semgrep/semgrep"
    }

    async fn scan(&self, opts: &ScanOptions) -> ScanResult {
        let args = ["--config=auto", "--json", "--quiet", "."];
        let output = if self.is_available_local().await {
            run_capture(self.name(), &args, &opts.checkout_path).await
        } else if self.is_available_docker().await {
            run_docker_capture(self.docker_image(), &args, &opts.checkout_path).await
        } else {
            return ScanResult::skipped(self.name(), self.scanner_type(), "semgrep not found locally or via docker");
        };

        match output {
            Ok(out) if RAN_EXIT_CODES.contains(&out.status.code().unwrap_or(-1)) => {
                ScanResult::completed(self.name(), self.scanner_type(), out.stdout)
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
