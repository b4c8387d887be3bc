// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `RepoCheckout` — provisions the local working directory the Scanner
//! Runner scans, then tears it down. Grounded in the teacher's workspace
//! adapter: filesystem provisioning lives behind a trait so the worker
//! pipeline never shells out directly.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("git clone failed: {0}")]
    CloneFailed(String),
    #[error("failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub clone_url: String,
    pub branch: String,
    pub dest: PathBuf,
}

/// Provisions and tears down the filesystem checkout a scan runs against.
/// A repo-level failure here (clone, filesystem) is the orchestrator's
/// "repo-level failure" case (spec.md §4.E): it marks the job `failed`
/// rather than propagating a scanner-style per-adapter error.
#[async_trait]
pub trait RepoCheckout: Send + Sync {
    async fn checkout(&self, req: &CheckoutRequest) -> Result<PathBuf, CheckoutError>;
    async fn cleanup(&self, path: &Path);
}

/// Shallow-clones via the local `git` binary.
pub struct GitCheckout;

#[async_trait]
impl RepoCheckout for GitCheckout {
    async fn checkout(&self, req: &CheckoutRequest) -> Result<PathBuf, CheckoutError> {
        if let Some(parent) = req.dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let output = tokio::process::Command::new("git")
            .args(["clone", "--depth", "1", "--branch", &req.branch, &req.clone_url, &req.dest.display().to_string()])
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CheckoutError::CloneFailed(stderr));
        }
        Ok(req.dest.clone())
    }

    async fn cleanup(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove checkout directory (best-effort)");
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;

    /// Records every request and returns `dest` unchanged without touching
    /// the filesystem or network, unless built with `failing()`.
    pub struct FakeCheckout {
        fail: bool,
        calls: Mutex<Vec<CheckoutRequest>>,
    }

    impl FakeCheckout {
        pub fn new() -> Self {
            Self { fail: false, calls: Mutex::new(Vec::new()) }
        }

        pub fn failing() -> Self {
            Self { fail: true, calls: Mutex::new(Vec::new()) }
        }

        pub fn calls(&self) -> Vec<CheckoutRequest> {
            self.calls.lock().clone()
        }
    }

    impl Default for FakeCheckout {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl RepoCheckout for FakeCheckout {
        async fn checkout(&self, req: &CheckoutRequest) -> Result<PathBuf, CheckoutError> {
            self.calls.lock().push(req.clone());
            if self.fail {
                return Err(CheckoutError::CloneFailed("fake checkout failure".into()));
            }
            Ok(req.dest.clone())
        }

        async fn cleanup(&self, _path: &Path) {}
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCheckout;

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> CheckoutRequest {
        CheckoutRequest { clone_url: "https://github.com/acme/api.git".into(), branch: "main".into(), dest: PathBuf::from("/tmp/ctrlscan-clone-abc") }
    }

    #[tokio::test]
    async fn fake_checkout_records_the_request_and_returns_dest() {
        let checkout = FakeCheckout::new();
        let path = checkout.checkout(&req()).await.unwrap();
        assert_eq!(path, req().dest);
        assert_eq!(checkout.calls().len(), 1);
    }

    #[tokio::test]
    async fn failing_fake_checkout_reports_clone_failure() {
        let checkout = FakeCheckout::failing();
        assert!(checkout.checkout(&req()).await.is_err());
    }
}
