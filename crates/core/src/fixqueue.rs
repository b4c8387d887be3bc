// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Candidate PRs generated by the AI remediation path (spec.md §3/§4.G's
//! `FixQueueEntry`).

use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct FixQueueEntryId("fqe-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixQueueStatus {
    Pending,
    Approved,
    Rejected,
    Merged,
}

crate::display_as! {
    FixQueueStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Merged => "merged",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixQueueEntry {
    pub id: FixQueueEntryId,
    pub scan_job_id: String,
    pub finding_type: String,
    pub finding_id: String,
    pub pr_title: String,
    pub pr_body: String,
    pub status: FixQueueStatus,
    pub pr_url: Option<String>,
    pub generated_at_ms: u64,
    pub approved_at_ms: Option<u64>,
}

impl FixQueueEntry {
    pub fn approve(&mut self, at_ms: u64) -> Result<(), crate::error::CoreError> {
        if self.status != FixQueueStatus::Pending {
            return Err(crate::error::CoreError::invalid(format!(
                "fix queue entry {} is not pending (status: {})",
                self.id, self.status
            )));
        }
        self.status = FixQueueStatus::Approved;
        self.approved_at_ms = Some(at_ms);
        Ok(())
    }

    /// Rejection is terminal: rejecting twice is a no-op error, matching the
    /// approve path's guard.
    pub fn reject(&mut self) -> Result<(), crate::error::CoreError> {
        if self.status != FixQueueStatus::Pending {
            return Err(crate::error::CoreError::invalid(format!(
                "fix queue entry {} is not pending (status: {})",
                self.id, self.status
            )));
        }
        self.status = FixQueueStatus::Rejected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> FixQueueEntry {
        FixQueueEntry {
            id: FixQueueEntryId::new(),
            scan_job_id: "scj-1".into(),
            finding_type: "sca".into(),
            finding_id: "deadbeef".into(),
            pr_title: "bump lodash".into(),
            pr_body: "fixes CVE-...".into(),
            status: FixQueueStatus::Pending,
            pr_url: None,
            generated_at_ms: 0,
            approved_at_ms: None,
        }
    }

    #[test]
    fn approve_sets_timestamp_and_status() {
        let mut e = entry();
        e.approve(500).unwrap();
        assert_eq!(e.status, FixQueueStatus::Approved);
        assert_eq!(e.approved_at_ms, Some(500));
    }

    #[test]
    fn approving_twice_fails() {
        let mut e = entry();
        e.approve(500).unwrap();
        assert!(e.approve(600).is_err());
    }

    #[test]
    fn rejection_is_terminal() {
        let mut e = entry();
        e.reject().unwrap();
        assert_eq!(e.status, FixQueueStatus::Rejected);
        assert!(e.approve(1).is_err());
    }
}
