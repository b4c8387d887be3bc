// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error-kind vocabulary shared by every crate in the workspace.
//!
//! Every fallible operation in `ctrlscan-storage` and `ctrlscan-engine`
//! eventually resolves to one of these six kinds. Callers match on kind, not
//! on message text, except for [`CoreError::is_missing_schema`] which exists
//! specifically because "no such table" is the only portable signal for a
//! not-yet-migrated store across drivers.

use thiserror::Error;

/// The six error kinds the control plane distinguishes.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A row lookup returned zero rows.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store reports a table that hasn't been created yet (migration
    /// hasn't run). Callers degrade gracefully rather than treating this as
    /// fatal.
    #[error("missing schema: {0}")]
    MissingSchema(String),

    /// A unique-constraint violation, or (for campaigns) an overlap with an
    /// in-flight campaign's scan jobs.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bad input: invalid cron expression, malformed scope, unknown scan
    /// target, worker count out of range, invalid mode, invalid repo URL.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The operation's context was canceled or its deadline elapsed. Not a
    /// failure — a signal to short-circuit and commit partial state.
    #[error("canceled: {0}")]
    Canceled(String),

    /// A scanner or provider failure. Captured in the owning row's
    /// `error_msg` and surfaced via status; never escalated to a sweep-level
    /// failure on its own.
    #[error("external failure: {0}")]
    External(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(why: impl Into<String>) -> Self {
        Self::Invalid(why.into())
    }

    pub fn conflict(why: impl Into<String>) -> Self {
        Self::Conflict(why.into())
    }

    pub fn canceled(where_: impl Into<String>) -> Self {
        Self::Canceled(where_.into())
    }

    pub fn external(why: impl Into<String>) -> Self {
        Self::External(why.into())
    }

    /// True for [`CoreError::MissingSchema`], and for any driver-reported
    /// error whose text contains the portable `"no such table"` substring —
    /// the only cross-driver signal spec'd for "migration hasn't run yet".
    pub fn is_missing_schema(text: &str) -> bool {
        text.contains("no such table")
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_schema_detected_by_substring() {
        assert!(CoreError::is_missing_schema("Error: no such table: scan_jobs"));
        assert!(!CoreError::is_missing_schema("connection refused"));
    }

    #[test]
    fn canceled_is_distinguishable_from_other_kinds() {
        let e = CoreError::canceled("sweep stopped");
        assert!(e.is_canceled());
        assert!(!CoreError::external("boom").is_canceled());
    }
}
