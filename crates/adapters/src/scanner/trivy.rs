// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `trivy config` adapter — infrastructure-as-code misconfiguration
//! scanning (iac).

use super::process::{binary_available, docker_available, run_capture, run_docker_capture};
use super::{ScanOptions, ScanResult, Scanner};
use async_trait::async_trait;
use ctrlscan_core::scanner::ScannerKind;

/// trivy exits 1 when `--exit-code 1` is set and misconfigurations are
/// found; we don't set that flag, so a clean scan and a scan with
/// findings both exit 0. Only other codes indicate the scan itself failed.
const RAN_EXIT_CODES: [i32; 1] = [0];

pub struct TrivyConfigScanner;

#[async_trait]
impl Scanner for TrivyConfigScanner {
    fn name(&self) -> &str {
        "trivy"
    }

    fn scanner_type(&self) -> ScannerKind {
        ScannerKind::Iac
    }

    async fn is_available_local(&self) -> bool {
        binary_available("trivy", &["--version"]).await
    }

    async fn is_available_docker(&self) -> bool {
        docker_available().await
    }

    fn docker_image(&self) -> &str {
        "aquasec/trivy"
    }

    async fn scan(&self, opts: &ScanOptions) -> ScanResult {
        let args = ["config", "--format", "json", "."];
        let output = if self.is_available_local().await {
            run_capture(self.name(), &args, &opts.checkout_path).await
        } else if self.is_available_docker().await {
            run_docker_capture(self.docker_image(), &args, &opts.checkout_path).await
        } else {
            return ScanResult::skipped(self.name(), self.scanner_type(), "trivy not found locally or via docker");
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
