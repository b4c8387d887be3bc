// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ctrlscand: background process owning the repo queue, sweep orchestrator,
//! schedule firing, and remediation campaigns. Talks to `ctrlscan` over a
//! Unix domain socket (see `ctrlscan-wire`).

mod config;
mod listener;

use std::collections::HashMap;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ctrlscan_adapters::{FakeAiProvider, FakeRepoProvider, GitCheckout, RepoProvider};
use ctrlscan_core::clock::SystemClock;
use ctrlscan_core::repo::Provider;
use ctrlscan_engine::{Orchestrator, OrchestratorConfig, RemediationEngine, RemediationEngineConfig, Scheduler, SchedulerConfig};
use ctrlscan_storage::Store;
use fs2::FileExt;
use listener::{ListenCtx, Listener};
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{Config, ConfigError};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const STARTUP_MARKER_PREFIX: &str = "--- ctrlscand: starting (pid: ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("ctrlscand {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("ctrlscand {}", env!("CARGO_PKG_VERSION"));
                println!("Control-plane daemon for scheduled security sweeps and remediation.");
                println!();
                println!("USAGE:");
                println!("    ctrlscand");
                println!();
                println!("Normally started by the `ctrlscan` CLI. Listens on a Unix socket");
                println!("under the state directory (see ctrlscan.toml).");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: ctrlscand [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let _log_guard = setup_logging(&config)?;

    info!("starting ctrlscand");

    let lock_file = match acquire_lock(&config.lock_path) {
        Ok(f) => f,
        Err(e) => {
            write_startup_error(&config, &e);
            eprintln!("ctrlscand is already running (see {})", config.lock_path.display());
            std::process::exit(1);
        }
    };

    match run(config).await {
        Ok(()) => {
            drop(lock_file);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "daemon exited with an error");
            drop(lock_file);
            Err(e)
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = Arc::new(Store::open(&config.wal_path)?);
    store.migrate()?;

    let clock = SystemClock;
    let scanners = ctrlscan_adapters::default_scanners();
    let checkout = Arc::new(GitCheckout);

    let mut by_provider: HashMap<Provider, Vec<ctrlscan_core::repo::Repo>> = HashMap::new();
    for repo_cfg in config.file.repos.clone() {
        if let Some(repo) = repo_cfg.into_repo() {
            by_provider.entry(repo.provider).or_default().push(repo);
        } else {
            tracing::warn!("skipping repo with unknown provider in ctrlscan.toml");
        }
    }
    if by_provider.is_empty() {
        by_provider.insert(Provider::GitHub, Vec::new());
    }
    let providers: Vec<Arc<dyn RepoProvider>> =
        by_provider.into_iter().map(|(provider, repos)| Arc::new(FakeRepoProvider::new(provider, repos)) as Arc<dyn RepoProvider>).collect();
    let primary_provider = Arc::clone(&providers[0]);
    let ai_provider: Arc<dyn ctrlscan_adapters::AiProvider> = Arc::new(FakeAiProvider::new());

    let orchestrator_config = OrchestratorConfig {
        default_workers: config.file.orchestrator.default_workers.unwrap_or(4),
        heartbeat_interval: config.heartbeat_interval(),
        dead_threshold: config.dead_threshold(),
        stuck_threshold: config.stuck_threshold(),
    };
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&store), clock, scanners, checkout, Arc::clone(&primary_provider), orchestrator_config));

    let scheduler_config = SchedulerConfig { max_discovery_pages: config.file.scheduler.max_discovery_pages.unwrap_or(50) };
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&store), clock, providers.clone(), Arc::clone(&orchestrator), scheduler_config));
    scheduler.load_and_register_all()?;

    let remediation_config = RemediationEngineConfig { worker_count: config.file.remediation.worker_count.unwrap_or(2) };
    let remediation = Arc::new(RemediationEngine::new(Arc::clone(&store), clock, providers, ai_provider, Arc::clone(&orchestrator), remediation_config));

    let shutdown = CancellationToken::new();
    orchestrator.spawn_heartbeat_monitor(shutdown.clone());

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let unix_listener = UnixListener::bind(&config.socket_path)?;

    let ctx = Arc::new(ListenCtx {
        store: Arc::clone(&store),
        orchestrator: Arc::clone(&orchestrator),
        scheduler: Arc::clone(&scheduler),
        remediation: Arc::clone(&remediation),
        repo_provider: primary_provider,
        clock,
        start_time: Instant::now(),
        ipc_timeout: config.ipc_timeout(),
    });
    let listener_task = tokio::spawn(Listener::new(unix_listener, ctx, shutdown.clone()).run());

    let flush_store = Arc::clone(&store);
    let flush_shutdown = shutdown.clone();
    let flush_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        loop {
            tokio::select! {
                _ = flush_shutdown.cancelled() => return,
                _ = interval.tick() => {
                    if let Err(e) = flush_store.flush() {
                        error!(error = %e, "periodic flush failed");
                    }
                }
            }
        }
    });

    let shutdown_requested = Arc::new(Notify::new());
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(socket = %config.socket_path.display(), "ctrlscand ready");
    println!("READY");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = shutdown_requested.notified() => info!("shutdown requested"),
    }

    shutdown.cancel();
    let _ = orchestrator.stop_current_sweep();
    let _ = listener_task.await;
    let _ = flush_task.await;
    let _ = std::fs::remove_file(&config.socket_path);
    store.flush()?;

    info!("ctrlscand stopped");
    Ok(())
}

fn acquire_lock(lock_path: &Path) -> Result<std::fs::File, ConfigError> {
    let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(lock_path)?;
    lock_file.try_lock_exclusive().map_err(|_| ConfigError::AlreadyRunning)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }
    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn write_startup_marker(config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

fn write_startup_error(config: &Config, error: &ConfigError) {
    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {error}");
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, ConfigError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = config.log_path.parent().ok_or(ConfigError::NoHomeDir)?;
    let file_name = config.log_path.file_name().ok_or(ConfigError::NoHomeDir)?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
