// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron-driven trigger sources (spec.md §3's `Schedule`, §4.F scope
//! resolution).

use crate::repo::Provider;
use crate::scan_job::ScanMode;
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct ScheduleId("sch-");
}

/// An exact-owner or owner-prefix selector, scoped to one provider+host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSelector {
    pub provider: Provider,
    pub host: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerPrefixSelector {
    pub provider: Provider,
    pub host: String,
    pub owner_prefix: String,
}

/// Which discovery sources a schedule fires against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTarget {
    ListRepos,
    SearchRepos,
}

/// Typed scope for one schedule: explicit repos, owner selectors, owner
/// prefix selectors, targets, and a mode override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeJson {
    #[serde(default)]
    pub targets: Vec<ScanTarget>,
    /// Empty string means "inherit the orchestrator default".
    #[serde(default)]
    pub mode: Option<ScanMode>,
    #[serde(default)]
    pub explicit_repos: Vec<String>,
    #[serde(default)]
    pub owner_selectors: Vec<OwnerSelector>,
    #[serde(default)]
    pub owner_prefix_selectors: Vec<OwnerPrefixSelector>,
}

impl ScopeJson {
    /// Step 1 of §4.F fire resolution: only explicit repos configured.
    pub fn is_explicit_only(&self) -> bool {
        !self.explicit_repos.is_empty() && self.owner_selectors.is_empty() && self.owner_prefix_selectors.is_empty()
    }

    pub fn has_selectors(&self) -> bool {
        !self.owner_selectors.is_empty() || !self.owner_prefix_selectors.is_empty()
    }

    /// True when this scope names an explicit repo or selector, so a fire
    /// that resolves it to zero repos must not fall back to full discovery.
    pub fn is_scoped(&self) -> bool {
        !self.explicit_repos.is_empty() || self.has_selectors()
    }
}

/// A cron entry: id, expression, scope, and enabled flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    /// Cron expression, `@every <duration>`, `@hourly`, or `@daily`.
    pub expr: String,
    pub scope: ScopeJson,
    pub enabled: bool,
    pub last_run_at_ms: Option<u64>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

crate::test_builder! {
    pub struct ScheduleBuilder => Schedule {
        required {
            id: ScheduleId = ScheduleId::new(),
            expr: String = "@daily".to_string(),
            scope: ScopeJson = ScopeJson::default(),
            enabled: bool = true,
            created_at_ms: u64 = 0,
            updated_at_ms: u64 = 0,
        }
        optional {
            last_run_at_ms: u64,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ScheduleBuilder {
    pub fn build(self) -> Schedule {
        Schedule {
            id: self.id,
            expr: self.expr,
            scope: self.scope,
            enabled: self.enabled,
            last_run_at_ms: self.last_run_at_ms,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_only_requires_no_selectors() {
        let mut scope = ScopeJson { explicit_repos: vec!["acme/api".into()], ..Default::default() };
        assert!(scope.is_explicit_only());
        scope.owner_selectors.push(OwnerSelector { provider: Provider::GitHub, host: "github.com".into(), owner: "acme".into() });
        assert!(!scope.is_explicit_only());
        assert!(scope.has_selectors());
    }

    #[test]
    fn builder_defaults_to_enabled_daily_schedule() {
        let s = Schedule::fixture().build();
        assert!(s.enabled);
        assert_eq!(s.expr, "@daily");
    }
}
