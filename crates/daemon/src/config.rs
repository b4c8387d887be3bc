// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: fixed state-directory layout plus a `ctrlscan.toml`
//! file for orchestrator tunables and the seeded repo list that stands in
//! for a real `RepoProvider` (spec.md §6 treats `RepoProvider` as an opaque
//! consumed interface; see DESIGN.md for why the daemon wires the
//! adapters crate's test-support fakes rather than a real GitHub/GitLab
//! client).

use std::path::PathBuf;
use std::time::Duration;

use ctrlscan_core::repo::{Provider, Repo};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve a home directory for the default state dir")]
    NoHomeDir,
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("daemon is already running (pid file locked)")]
    AlreadyRunning,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One statically configured repo, standing in for provider discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    pub provider: String,
    #[serde(default = "default_host")]
    pub host: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

fn default_host() -> String {
    "github.com".to_string()
}

impl RepoConfig {
    pub fn into_repo(self) -> Option<Repo> {
        let provider = Provider::parse(&self.provider)?;
        let full_name = format!("{}/{}", self.owner, self.name);
        let clone_url = self.clone_url.unwrap_or_else(|| format!("https://{}/{}.git", self.host, full_name));
        let html_url = self.html_url.unwrap_or_else(|| format!("https://{}/{}", self.host, full_name));
        Some(Repo {
            provider,
            host: self.host,
            owner: self.owner,
            name: self.name,
            full_name,
            private: self.private,
            language: self.language,
            stars: self.stars,
            html_url,
            clone_url,
            default_branch: self.default_branch.unwrap_or_else(|| "main".to_string()),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OrchestratorSettings {
    pub default_workers: Option<usize>,
    pub heartbeat_interval_secs: Option<u64>,
    pub dead_threshold_secs: Option<u64>,
    pub stuck_threshold_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchedulerSettings {
    pub max_discovery_pages: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RemediationSettings {
    pub worker_count: Option<usize>,
}

/// Deserialized shape of `ctrlscan.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub remediation: RemediationSettings,
    #[serde(default)]
    pub repos: Vec<RepoConfig>,
}

/// Resolved daemon configuration: fixed paths plus the parsed TOML settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub wal_path: PathBuf,
    pub file: FileConfig,
}

impl Config {
    /// Resolve state directory: `CTRLSCAN_STATE_DIR` > `XDG_STATE_HOME/ctrlscan` > `~/.local/state/ctrlscan`.
    pub fn state_dir() -> Result<PathBuf, ConfigError> {
        if let Ok(dir) = std::env::var("CTRLSCAN_STATE_DIR") {
            return Ok(PathBuf::from(dir));
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return Ok(PathBuf::from(xdg).join("ctrlscan"));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".local/state/ctrlscan"))
    }

    /// Path to the `ctrlscan.toml` config file, `CTRLSCAN_CONFIG` or
    /// `<state_dir>/ctrlscan.toml`.
    pub fn config_path(state_dir: &std::path::Path) -> PathBuf {
        std::env::var("CTRLSCAN_CONFIG").map(PathBuf::from).unwrap_or_else(|_| state_dir.join("ctrlscan.toml"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = Self::state_dir()?;
        let config_path = Self::config_path(&state_dir);

        let file = if config_path.exists() {
            let text = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path: config_path, source })?
        } else {
            FileConfig::default()
        };

        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            wal_path: state_dir.join("wal").join("ctrlscan.wal"),
            state_dir,
            file,
        })
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.file.orchestrator.heartbeat_interval_secs.unwrap_or(30))
    }

    pub fn dead_threshold(&self) -> Duration {
        Duration::from_secs(self.file.orchestrator.dead_threshold_secs.unwrap_or(10 * 60))
    }

    pub fn stuck_threshold(&self) -> Duration {
        Duration::from_secs(self.file.orchestrator.stuck_threshold_secs.unwrap_or(15 * 60))
    }

    pub fn ipc_timeout(&self) -> Duration {
        std::env::var("CTRLSCAN_IPC_TIMEOUT_MS").ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis).unwrap_or(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_config_fills_in_derived_urls() {
        let cfg = RepoConfig {
            provider: "github".to_string(),
            host: "github.com".to_string(),
            owner: "acme".to_string(),
            name: "api".to_string(),
            private: false,
            language: None,
            stars: 0,
            default_branch: None,
            clone_url: None,
            html_url: None,
        };
        let repo = cfg.into_repo().expect("valid provider");
        assert_eq!(repo.full_name, "acme/api");
        assert_eq!(repo.clone_url, "https://github.com/acme/api.git");
        assert_eq!(repo.default_branch, "main");
    }

    #[test]
    fn repo_config_rejects_an_unknown_provider() {
        let cfg = RepoConfig {
            provider: "bitbucket".to_string(),
            host: "bitbucket.org".to_string(),
            owner: "acme".to_string(),
            name: "api".to_string(),
            private: false,
            language: None,
            stars: 0,
            default_branch: None,
            clone_url: None,
            html_url: None,
        };
        assert!(cfg.into_repo().is_none());
    }

    #[test]
    fn file_config_defaults_to_an_empty_repo_list() {
        let file: FileConfig = toml::from_str("").expect("empty config parses");
        assert!(file.repos.is_empty());
    }
}
