// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path-substring ignore rules, applied as a post-filter on normalized
//! findings (spec.md §3's `FindingPathIgnoreRule`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingPathIgnoreRule {
    pub substring: String,
    pub enabled: bool,
    pub note: String,
}

impl FindingPathIgnoreRule {
    pub fn new(substring: impl Into<String>) -> Self {
        Self { substring: substring.into(), enabled: true, note: String::new() }
    }

    pub fn matches(&self, file_path: &str) -> bool {
        self.enabled && !self.substring.is_empty() && file_path.contains(&self.substring)
    }
}

/// Drop findings whose `file_path` matches any enabled rule.
pub fn apply_ignore_rules<'a>(
    findings: impl IntoIterator<Item = &'a crate::finding::NormalizedFinding>,
    rules: &[FindingPathIgnoreRule],
) -> Vec<&'a crate::finding::NormalizedFinding> {
    findings.into_iter().filter(|f| !rules.iter().any(|r| r.matches(&f.file_path))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::NormalizedFinding;

    #[test]
    fn disabled_rule_never_matches() {
        let mut rule = FindingPathIgnoreRule::new("vendor/");
        rule.enabled = false;
        assert!(!rule.matches("vendor/pkg/main.go"));
    }

    #[test]
    fn apply_ignore_rules_drops_matching_paths() {
        let keep = NormalizedFinding::fixture().file_path("src/main.rs").build();
        let drop = NormalizedFinding::fixture().file_path("vendor/pkg/main.go").build();
        let rules = vec![FindingPathIgnoreRule::new("vendor/")];
        let kept = apply_ignore_rules([&keep, &drop], &rules);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].file_path, "src/main.rs");
    }
}
