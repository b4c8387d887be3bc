// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending repo-discovery entries (spec.md §3's `RepoQueue`) — the only
//! surface that feeds the orchestrator's worker loop.

use crate::repo::{Provider, RepoKey};
use serde::{Deserialize, Serialize};

/// Claim state of one queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Claimed,
    Done,
}

crate::display_as! {
    QueueStatus {
        Pending => "pending",
        Claimed => "claimed",
        Done => "done",
    }
}

/// One candidate repo waiting to be scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoQueueEntry {
    pub key: RepoKey,
    pub clone_url: String,
    pub default_branch: String,
    pub status: QueueStatus,
    pub priority: i32,
    pub discovered_at_ms: u64,
    /// **(expansion)** claim-attempt counter; display-only, see DESIGN.md.
    #[serde(default)]
    pub attempts: u32,
}

impl RepoQueueEntry {
    pub fn new(key: RepoKey, clone_url: impl Into<String>, default_branch: impl Into<String>, discovered_at_ms: u64) -> Self {
        Self {
            key,
            clone_url: clone_url.into(),
            default_branch: default_branch.into(),
            status: QueueStatus::Pending,
            priority: 0,
            discovered_at_ms,
            attempts: 0,
        }
    }

    /// Compare-and-swap claim: only succeeds from `Pending`.
    pub fn try_claim(&mut self) -> bool {
        if self.status == QueueStatus::Pending {
            self.status = QueueStatus::Claimed;
            true
        } else {
            false
        }
    }

    /// A worker claimed the repo then failed before finishing; it returns
    /// to `pending` and its attempt counter is bumped.
    pub fn return_to_pending(&mut self) {
        self.status = QueueStatus::Pending;
        self.attempts += 1;
    }
}

/// Ordering for queue dequeue: priority DESC, discovered_at ASC.
pub fn queue_order(a: &RepoQueueEntry, b: &RepoQueueEntry) -> std::cmp::Ordering {
    b.priority.cmp(&a.priority).then(a.discovered_at_ms.cmp(&b.discovered_at_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(priority: i32, discovered_at_ms: u64) -> RepoQueueEntry {
        RepoQueueEntry::new(
            RepoKey::new(Provider::GitHub, "github.com", "acme", "api"),
            "https://github.com/acme/api.git",
            "main",
            discovered_at_ms,
        )
        .tap_priority(priority)
    }

    trait TapPriority {
        fn tap_priority(self, p: i32) -> Self;
    }
    impl TapPriority for RepoQueueEntry {
        fn tap_priority(mut self, p: i32) -> Self {
            self.priority = p;
            self
        }
    }

    #[test]
    fn queue_order_prefers_higher_priority_then_earlier_discovery() {
        let mut entries = vec![entry(0, 100), entry(5, 200), entry(5, 50)];
        entries.sort_by(queue_order);
        assert_eq!(entries[0].priority, 5);
        assert_eq!(entries[0].discovered_at_ms, 50);
        assert_eq!(entries[2].priority, 0);
    }

    #[test]
    fn try_claim_only_succeeds_from_pending() {
        let mut e = entry(0, 1);
        assert!(e.try_claim());
        assert_eq!(e.status, QueueStatus::Claimed);
        assert!(!e.try_claim());
    }

    #[test]
    fn return_to_pending_increments_attempts() {
        let mut e = entry(0, 1);
        e.try_claim();
        e.return_to_pending();
        assert_eq!(e.status, QueueStatus::Pending);
        assert_eq!(e.attempts, 1);
    }
}
