// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scanner-agnostic finding records, persisted per scan as `scan_job_findings`
//! (spec.md §3's `NormalizedFinding`).

use crate::scanner::ScannerKind;
use serde::{Deserialize, Serialize};

/// Severity normalized across all four scanner kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

crate::display_as! {
    Severity {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Open/fixed status of a finding snapshot within one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Open,
    Fixed,
}

crate::display_as! {
    FindingStatus {
        Open => "open",
        Fixed => "fixed",
    }
}

/// One scanner-agnostic finding, unique within a job by (kind, fingerprint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedFinding {
    pub scan_job_id: String,
    pub kind: ScannerKind,
    pub scanner: String,
    pub fingerprint: String,
    pub severity: Severity,
    pub title: String,
    pub file_path: String,
    pub line: Option<u64>,
    pub message: String,
    pub package: Option<String>,
    pub version: Option<String>,
    pub fix: Option<String>,
    pub status: FindingStatus,
    pub first_seen_at_ms: u64,
    pub last_seen_at_ms: u64,
    pub introduced: bool,
    pub reintroduced: bool,
}

/// Identity key a finding is deduplicated and tracked by, within one
/// (provider, owner, repo, branch) scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FindingKey {
    pub kind: String,
    pub fingerprint: String,
}

impl FindingKey {
    /// Lowercased (kind, fingerprint) — the dedup/lifecycle lookup key.
    pub fn new(kind: &str, fingerprint: &str) -> Self {
        Self { kind: kind.to_ascii_lowercase(), fingerprint: fingerprint.to_ascii_lowercase() }
    }
}

impl From<&NormalizedFinding> for FindingKey {
    fn from(f: &NormalizedFinding) -> Self {
        Self::new(&f.kind.to_string(), &f.fingerprint)
    }
}

crate::test_builder! {
    pub struct NormalizedFindingBuilder => NormalizedFinding {
        required {
            scan_job_id: String = "scj-fixture0000000000".to_string(),
            kind: ScannerKind = ScannerKind::Sca,
            scanner: String = "osv-scanner".to_string(),
            fingerprint: String = "deadbeef".to_string(),
            severity: Severity = Severity::Medium,
            title: String = "vulnerable dependency".to_string(),
            file_path: String = "go.sum".to_string(),
            message: String = String::new(),
            status: FindingStatus = FindingStatus::Open,
            first_seen_at_ms: u64 = 0,
            last_seen_at_ms: u64 = 0,
            introduced: bool = false,
            reintroduced: bool = false,
        }
        optional {
            line: u64,
            package: String,
            version: String,
            fix: String,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl NormalizedFindingBuilder {
    pub fn build(self) -> NormalizedFinding {
        NormalizedFinding {
            scan_job_id: self.scan_job_id,
            kind: self.kind,
            scanner: self.scanner,
            fingerprint: self.fingerprint,
            severity: self.severity,
            title: self.title,
            file_path: self.file_path,
            line: self.line,
            message: self.message,
            package: self.package,
            version: self.version,
            fix: self.fix,
            status: self.status,
            first_seen_at_ms: self.first_seen_at_ms,
            last_seen_at_ms: self.last_seen_at_ms,
            introduced: self.introduced,
            reintroduced: self.reintroduced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_ranks_critical_highest() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn finding_key_lowercases_kind_and_fingerprint() {
        let a = FindingKey::new("SCA", "ABCDEF");
        let b = FindingKey::new("sca", "abcdef");
        assert_eq!(a, b);
    }

    #[test]
    fn severity_parse_rejects_unknown() {
        assert_eq!(Severity::parse("extreme"), None);
        assert_eq!(Severity::parse("high"), Some(Severity::High));
    }
}
