// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `AiProvider` — the offline remediation collaborator the Remediation
//! Engine drives per task: triage a batch of findings, then synthesize a
//! fix candidate for each one worth acting on. Treated as opaque per
//! spec.md §6; this crate only defines the seam.

use async_trait::async_trait;
use ctrlscan_core::finding::NormalizedFinding;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiProviderError {
    #[error("ai provider error: {0}")]
    Failed(String),
}

/// Outcome of triaging one batch of findings: which ones are worth
/// synthesizing a fix for, and a short human-readable summary of why.
#[derive(Debug, Clone)]
pub struct TriageResult {
    pub worth_fixing: Vec<String>,
    pub summary: String,
}

/// A candidate fix for one finding, ready to enqueue as a `FixQueueEntry`.
#[derive(Debug, Clone)]
pub struct FixCandidate {
    pub pr_title: String,
    pub pr_body: String,
    pub confidence: f32,
}

/// Context handed to `synthesize_fix` alongside the finding: whatever the
/// caller knows about the surrounding repo that the provider might use.
#[derive(Debug, Clone, Default)]
pub struct FixContext {
    pub repo_full_name: String,
    pub branch: String,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn triage(&self, findings: &[NormalizedFinding]) -> Result<TriageResult, AiProviderError>;

    async fn synthesize_fix(
        &self,
        finding: &NormalizedFinding,
        context: &FixContext,
    ) -> Result<FixCandidate, AiProviderError>;
}

/// Confidence below this is skipped rather than queued (spec.md §4.G's
/// `fix_skipped_low_conf` counter).
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.4;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{AiProvider, AiProviderError, FixCandidate, FixContext, TriageResult};
    use async_trait::async_trait;
    use ctrlscan_core::finding::NormalizedFinding;
    use parking_lot::Mutex;

    /// Canned AI provider: marks every finding worth fixing and returns a
    /// fixed-confidence candidate, unless configured to fail.
    pub struct FakeAiProvider {
        confidence: f32,
        fail: bool,
        triage_calls: Mutex<u32>,
        fix_calls: Mutex<u32>,
    }

    impl Default for FakeAiProvider {
        fn default() -> Self {
            Self { confidence: 0.9, fail: false, triage_calls: Mutex::new(0), fix_calls: Mutex::new(0) }
        }
    }

    impl FakeAiProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_confidence(confidence: f32) -> Self {
            Self { confidence, ..Self::default() }
        }

        pub fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }

        pub fn triage_call_count(&self) -> u32 {
            *self.triage_calls.lock()
        }

        pub fn fix_call_count(&self) -> u32 {
            *self.fix_calls.lock()
        }
    }

    #[async_trait]
    impl AiProvider for FakeAiProvider {
        async fn triage(&self, findings: &[NormalizedFinding]) -> Result<TriageResult, AiProviderError> {
            *self.triage_calls.lock() += 1;
            if self.fail {
                return Err(AiProviderError::Failed("fake triage failure".into()));
            }
            Ok(TriageResult {
                worth_fixing: findings.iter().map(|f| f.fingerprint.clone()).collect(),
                summary: format!("{} findings triaged", findings.len()),
            })
        }

        async fn synthesize_fix(
            &self,
            finding: &NormalizedFinding,
            context: &FixContext,
        ) -> Result<FixCandidate, AiProviderError> {
            *self.fix_calls.lock() += 1;
            if self.fail {
                return Err(AiProviderError::Failed("fake fix synthesis failure".into()));
            }
            Ok(FixCandidate {
                pr_title: format!("fix: {}", finding.title),
                pr_body: format!("Addresses `{}` in {}", finding.fingerprint, context.repo_full_name),
                confidence: self.confidence,
            })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAiProvider;
