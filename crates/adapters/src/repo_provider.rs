// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `RepoProvider` — the discovery collaborator that lists and resolves
//! repositories on a Git hosting service. The Scheduler and Remediation
//! Engine both call through this trait rather than any concrete host SDK.

use async_trait::async_trait;
use ctrlscan_core::repo::{Provider, Repo};
use thiserror::Error;

/// Errors surfaced by a `RepoProvider` implementation.
#[derive(Debug, Error)]
pub enum RepoProviderError {
    #[error("http error: {0}")]
    Http(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
}

/// Visibility filter passed to `ListRepos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    Public,
    Private,
}

/// Affiliation filter passed to `ListRepos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affiliation {
    Owner,
    Collaborator,
    OrganizationMember,
}

/// Options for a paged repo listing, mirroring spec.md §6's `ListRepos`.
#[derive(Debug, Clone)]
pub struct ListReposOptions {
    pub per_page: u32,
    pub page: u32,
    pub visibility: Visibility,
    pub affiliation: Option<Affiliation>,
}

impl Default for ListReposOptions {
    fn default() -> Self {
        Self { per_page: 100, page: 1, visibility: Visibility::All, affiliation: None }
    }
}

/// Discovers and resolves repositories on one Git hosting provider.
#[async_trait]
pub trait RepoProvider: Send + Sync {
    /// The provider's name, used as part of `RepoKey`'s dedup identity.
    fn name(&self) -> Provider;

    async fn list_repos(&self, opts: &ListReposOptions) -> Result<Vec<Repo>, RepoProviderError>;

    async fn search_repos(&self, query: &str) -> Result<Vec<Repo>, RepoProviderError>;

    async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repo, RepoProviderError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ListReposOptions, RepoProvider, RepoProviderError, Visibility};
    use async_trait::async_trait;
    use ctrlscan_core::repo::{Provider, Repo};
    use parking_lot::Mutex;

    /// Canned provider: holds a fixed repo list and returns slices of it,
    /// recording every call it receives for assertions in tests.
    pub struct FakeRepoProvider {
        provider: Provider,
        repos: Vec<Repo>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRepoProvider {
        pub fn new(provider: Provider, repos: Vec<Repo>) -> Self {
            Self { provider, repos, calls: Mutex::new(Vec::new()) }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl RepoProvider for FakeRepoProvider {
        fn name(&self) -> Provider {
            self.provider
        }

        async fn list_repos(&self, opts: &ListReposOptions) -> Result<Vec<Repo>, RepoProviderError> {
            self.calls.lock().push(format!("list_repos(page={})", opts.page));
            if opts.page > 1 {
                return Ok(Vec::new());
            }
            let filtered = match opts.visibility {
                Visibility::All => self.repos.clone(),
                Visibility::Public => self.repos.iter().filter(|r| !r.private).cloned().collect(),
                Visibility::Private => self.repos.iter().filter(|r| r.private).cloned().collect(),
            };
            Ok(filtered)
        }

        async fn search_repos(&self, query: &str) -> Result<Vec<Repo>, RepoProviderError> {
            self.calls.lock().push(format!("search_repos({query})"));
            let q = query.to_ascii_lowercase();
            Ok(self.repos.iter().filter(|r| r.full_name.to_ascii_lowercase().contains(&q)).cloned().collect())
        }

        async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repo, RepoProviderError> {
            self.calls.lock().push(format!("get_repo({owner}/{repo})"));
            self.repos
                .iter()
                .find(|r| r.owner.eq_ignore_ascii_case(owner) && r.name.eq_ignore_ascii_case(repo))
                .cloned()
                .ok_or_else(|| RepoProviderError::NotFound(format!("{owner}/{repo}")))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRepoProvider;
