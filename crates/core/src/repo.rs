// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository identity shared by every component that scopes work to a
//! (provider, owner, repo, branch) tuple.

use serde::{Deserialize, Serialize};

/// The Git hosting provider a repo was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    GitLab,
    AzureDevOps,
}

crate::display_as! {
    Provider {
        GitHub => "github",
        GitLab => "gitlab",
        AzureDevOps => "azure",
    }
}

impl Provider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Some(Self::GitHub),
            "gitlab" => Some(Self::GitLab),
            "azure" | "azuredevops" | "azure_devops" => Some(Self::AzureDevOps),
            _ => None,
        }
    }
}

/// A repository as returned by a `RepoProvider` implementation (defined in
/// `ctrlscan-adapters`). Fields mirror spec.md §6's `Repo` shape exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub provider: Provider,
    pub host: String,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub language: Option<String>,
    pub stars: u64,
    pub html_url: String,
    pub clone_url: String,
    pub default_branch: String,
}

/// The scoping tuple used as a map key throughout lifecycle tracking:
/// (provider, host, owner, repo name). Branch is tracked alongside this in
/// contexts that need it (lifecycles, scan jobs) but is kept out of
/// `RepoKey` itself since queue discovery is branch-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoKey {
    pub provider: Provider,
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RepoKey {
    pub fn new(provider: Provider, host: impl Into<String>, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self { provider, host: host.into(), owner: owner.into(), name: name.into() }
    }

    /// Lowercased `provider|host|owner|name`, used for the scheduler's
    /// dedup-by-lowercased-tuple requirement (spec.md §4.F step 2).
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.provider,
            self.host.to_ascii_lowercase(),
            self.owner.to_ascii_lowercase(),
            self.name.to_ascii_lowercase()
        )
    }
}

impl From<&Repo> for RepoKey {
    fn from(r: &Repo) -> Self {
        Self::new(r.provider, r.host.clone(), r.owner.clone(), r.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("GitHub"), Some(Provider::GitHub));
        assert_eq!(Provider::parse("AZURE"), Some(Provider::AzureDevOps));
        assert_eq!(Provider::parse("bitbucket"), None);
    }

    #[test]
    fn dedup_key_lowercases_everything() {
        let a = RepoKey::new(Provider::GitHub, "GitHub.com", "Acme", "API");
        let b = RepoKey::new(Provider::GitHub, "github.com", "acme", "api");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
