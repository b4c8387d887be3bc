// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SweepControl`: the trait boundary consumed by the scheduler, heartbeat
//! monitor, and remediation engine so they can drive the orchestrator
//! without a direct dependency cycle (spec.md §9's cyclic-reference note).

use crate::error::CoreResult;

/// Operations the scheduler/heartbeat/remediation components need from the
/// orchestrator, without depending on its concrete type.
#[async_trait::async_trait]
pub trait SweepControl: Send + Sync {
    async fn trigger(&self) -> CoreResult<()>;
    async fn trigger_with_selected_repos(&self, repo_keys: Vec<crate::repo::RepoKey>) -> CoreResult<()>;
    async fn stop_current_sweep(&self) -> CoreResult<bool>;
    async fn cancel_remediation_for_campaign(&self, campaign_id: &str) -> CoreResult<()>;
    async fn cancel_remediation_for_scan_job(&self, scan_job_id: &str) -> CoreResult<()>;
    fn is_sweep_in_flight(&self) -> bool;
}

#[cfg(any(test, feature = "test-support"))]
pub struct FakeSweepControl {
    pub in_flight: std::sync::atomic::AtomicBool,
    pub trigger_count: std::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeSweepControl {
    fn default() -> Self {
        Self {
            in_flight: std::sync::atomic::AtomicBool::new(false),
            trigger_count: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait::async_trait]
impl SweepControl for FakeSweepControl {
    async fn trigger(&self) -> CoreResult<()> {
        self.trigger_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn trigger_with_selected_repos(&self, _repo_keys: Vec<crate::repo::RepoKey>) -> CoreResult<()> {
        self.trigger_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn stop_current_sweep(&self) -> CoreResult<bool> {
        Ok(self.in_flight.swap(false, std::sync::atomic::Ordering::SeqCst))
    }

    async fn cancel_remediation_for_campaign(&self, _campaign_id: &str) -> CoreResult<()> {
        Ok(())
    }

    async fn cancel_remediation_for_scan_job(&self, _scan_job_id: &str) -> CoreResult<()> {
        Ok(())
    }

    fn is_sweep_in_flight(&self) -> bool {
        self.in_flight.load(std::sync::atomic::Ordering::SeqCst)
    }
}
