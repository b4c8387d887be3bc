// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sweep Orchestrator: the control-plane state machine driving worker pools
//! over the `RepoQueue`, with coalescing triggers, advisory pause/resume,
//! cooperative stop, and heartbeat health (spec.md §4.E).

use async_trait::async_trait;
use ctrlscan_adapters::{RepoCheckout, RepoProvider, Scanner};
use ctrlscan_core::clock::{Clock, SystemClock};
use ctrlscan_core::control::SweepControl;
use ctrlscan_core::event::{AgentHealth, EventSink, NullEventSink, SweepEvent};
use ctrlscan_core::queue::RepoQueueEntry;
use ctrlscan_core::repo::RepoKey;
use ctrlscan_core::scan_job::{ScanJob, ScanMode, ScanStatus};
use ctrlscan_core::{CoreError, CoreResult};
use ctrlscan_storage::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::{apply_scan_to_lifecycle, ScanContext};
use crate::runner::{run_scan, RunParams};

/// Tunables for worker pool sizing and the heartbeat's health thresholds.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub default_workers: usize,
    pub heartbeat_interval: Duration,
    pub dead_threshold: Duration,
    pub stuck_threshold: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_workers: 4,
            heartbeat_interval: Duration::from_secs(30),
            dead_threshold: Duration::from_secs(10 * 60),
            stuck_threshold: Duration::from_secs(15 * 60),
        }
    }
}

/// `TriggerWithRequest`'s overrides (spec.md §4.E).
#[derive(Debug, Clone, Default)]
pub struct TriggerRequest {
    pub worker_count: Option<usize>,
    /// True when the caller explicitly named a repo selection (even if it
    /// resolved to zero repos), so `populate_queue` never silently falls
    /// back to full discovery for a scope that was just empty.
    pub scoped: bool,
    pub selected_repos: Vec<RepoQueueEntry>,
    pub force: bool,
    pub mode: Option<ScanMode>,
    pub profile: Option<String>,
}

/// Point-in-time view of one worker, returned by `WorkerStatuses`.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub name: String,
    pub repo: Option<String>,
    pub status: String,
    pub since_ms: u64,
}

struct OrchState {
    sweep_in_flight: bool,
    paused: bool,
    pending_trigger: Option<TriggerRequest>,
    cancel: Option<CancellationToken>,
    started_at_ms: u64,
    last_event_at_ms: Option<u64>,
    last_activity_at_ms: Option<u64>,
    health: AgentHealth,
    workers: HashMap<String, WorkerStatus>,
    remediation_cancels: HashMap<String, CancellationToken>,
}

/// The central sweep state machine. Cheap to clone (every field is an
/// `Arc`/`Clock` value); clone it into the tasks it spawns rather than
/// sharing `&Orchestrator` across an `.await`.
pub struct Orchestrator<C: Clock = SystemClock> {
    store: Arc<Store>,
    clock: C,
    scanners: Vec<Arc<dyn Scanner>>,
    checkout: Arc<dyn RepoCheckout>,
    repo_provider: Arc<dyn RepoProvider>,
    events: Arc<dyn EventSink>,
    config: OrchestratorConfig,
    state: Arc<Mutex<OrchState>>,
    resume_signal: Arc<Notify>,
}

impl<C: Clock> Clone for Orchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
            scanners: self.scanners.clone(),
            checkout: self.checkout.clone(),
            repo_provider: self.repo_provider.clone(),
            events: self.events.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
            resume_signal: self.resume_signal.clone(),
        }
    }
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(
        store: Arc<Store>,
        clock: C,
        scanners: Vec<Arc<dyn Scanner>>,
        checkout: Arc<dyn RepoCheckout>,
        repo_provider: Arc<dyn RepoProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        let started_at_ms = clock.epoch_ms();
        Self {
            store,
            clock,
            scanners,
            checkout,
            repo_provider,
            events: Arc::new(NullEventSink),
            config,
            state: Arc::new(Mutex::new(OrchState {
                sweep_in_flight: false,
                paused: false,
                pending_trigger: None,
                cancel: None,
                started_at_ms,
                last_event_at_ms: None,
                last_activity_at_ms: None,
                health: AgentHealth::Idle,
                workers: HashMap::new(),
                remediation_cancels: HashMap::new(),
            })),
            resume_signal: Arc::new(Notify::new()),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    fn emit(&self, event: SweepEvent) {
        let mut state = self.state.lock();
        state.last_event_at_ms = Some(self.clock.epoch_ms());
        drop(state);
        self.events.emit(event);
    }

    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.state.lock().workers.values().cloned().collect()
    }

    pub fn is_sweep_in_flight(&self) -> bool {
        self.state.lock().sweep_in_flight
    }

    /// Health as last derived by the heartbeat monitor (spec.md §4.E).
    pub fn health(&self) -> AgentHealth {
        self.state.lock().health
    }

    /// Coalescing trigger (spec.md §4.E): starts a sweep if idle, records
    /// the request if one is already running, and drops (with an event) if
    /// paused.
    pub fn trigger_with_request(self: &Arc<Self>, req: TriggerRequest) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.paused {
            drop(state);
            self.emit(SweepEvent::TriggerIgnored { reason: "orchestrator is paused".to_string() });
            return Ok(());
        }
        if state.sweep_in_flight {
            state.pending_trigger = Some(req);
            return Ok(());
        }
        state.sweep_in_flight = true;
        state.last_activity_at_ms = Some(self.clock.epoch_ms());
        let cancel = CancellationToken::new();
        state.cancel = Some(cancel.clone());
        drop(state);

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_sweep(req, cancel).await });
        Ok(())
    }

    pub fn trigger(self: &Arc<Self>) -> CoreResult<()> {
        self.trigger_with_request(TriggerRequest::default())
    }

    /// Cancels the in-flight sweep's context and backfills every job still
    /// `running` to `stopped`. Returns whether a sweep was actually
    /// canceled.
    pub fn stop_current_sweep(&self) -> CoreResult<bool> {
        let cancel = {
            let mut state = self.state.lock();
            if !state.sweep_in_flight {
                return Ok(false);
            }
            state.cancel.take()
        };
        let Some(cancel) = cancel else { return Ok(false) };
        cancel.cancel();

        for mut job in self.store.running_scan_jobs()? {
            job.status = ScanStatus::Stopped;
            job.completed_at_ms = Some(self.clock.epoch_ms());
            if job.error_msg.is_none() {
                job.error_msg = Some("sweep stopped".to_string());
            }
            self.store.upsert_scan_job(job)?;
        }
        Ok(true)
    }

    /// Advisory: workers finish their current repo, then block on
    /// [`Self::resume`] before claiming the next one.
    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn resume(&self) {
        self.state.lock().paused = false;
        self.resume_signal.notify_waiters();
    }

    fn register_worker(&self, name: &str, repo: Option<String>, status: &str) {
        let mut state = self.state.lock();
        let since_ms = self.clock.epoch_ms();
        state.workers.insert(name.to_string(), WorkerStatus { name: name.to_string(), repo, status: status.to_string(), since_ms });
    }

    fn touch_activity(&self) {
        self.state.lock().last_activity_at_ms = Some(self.clock.epoch_ms());
    }

    /// Registers a cancellation token so `CancelActiveRemediationFor*` can
    /// reach an in-flight remediation task without the orchestrator
    /// depending on `ctrlscan-engine::remediation` directly.
    pub fn register_remediation_cancel(&self, key: impl Into<String>, token: CancellationToken) {
        self.state.lock().remediation_cancels.insert(key.into(), token);
    }

    pub fn clear_remediation_cancel(&self, key: &str) {
        self.state.lock().remediation_cancels.remove(key);
    }

    fn cancel_remediation(&self, key: &str) {
        if let Some(token) = self.state.lock().remediation_cancels.remove(key) {
            token.cancel();
        }
    }

    /// Every 30s (per `config.heartbeat_interval`), derive agent health and
    /// broadcast on transition only. Runs until `shutdown` fires.
    pub fn spawn_heartbeat_monitor(self: &Arc<Self>, shutdown: CancellationToken) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.config.heartbeat_interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => this.tick_heartbeat(),
                }
            }
        });
    }

    fn tick_heartbeat(&self) {
        let now_ms = self.clock.epoch_ms();
        let (health, stuck_for_seconds) = {
            let state = self.state.lock();
            derive_health(&self.config, state.started_at_ms, state.last_event_at_ms, state.sweep_in_flight, state.last_activity_at_ms, now_ms)
        };
        let changed = {
            let mut state = self.state.lock();
            let changed = state.health != health;
            state.health = health;
            changed
        };
        if changed {
            self.emit(SweepEvent::HealthChanged { health, stuck_for_seconds });
        }
    }

    async fn run_sweep(self: Arc<Self>, req: TriggerRequest, cancel: CancellationToken) {
        if let Err(e) = self.populate_queue(&req).await {
            tracing::error!(error = %e, "failed to populate repo queue for this sweep");
        }

        let worker_count = clamp_workers(req.worker_count.unwrap_or(self.config.default_workers));
        self.emit(SweepEvent::SweepStarted { scan_job_count: self.store.pending_queue_len().unwrap_or(0) as u32 });

        let mut workers = JoinSet::new();
        for i in 0..worker_count {
            let this = self.clone();
            let cancel = cancel.clone();
            let req = req.clone();
            let name = format!("worker-{i}");
            workers.spawn(async move { this.worker_loop(&name, &req, cancel).await });
        }

        let mut succeeded = 0u32;
        let mut failed = 0u32;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((s, f)) => {
                    succeeded += s;
                    failed += f;
                }
                Err(e) => tracing::warn!(error = %e, "sweep worker task panicked; continuing with the remaining workers"),
            }
        }

        self.emit(SweepEvent::SweepCompleted { succeeded, failed });

        let rerun = {
            let mut state = self.state.lock();
            state.sweep_in_flight = false;
            state.cancel = None;
            state.workers.clear();
            state.pending_trigger.take()
        };
        if let Some(req) = rerun {
            let _ = Arc::clone(&self).trigger_with_request(req);
        }
    }

    async fn populate_queue(&self, req: &TriggerRequest) -> CoreResult<()> {
        if req.scoped {
            for entry in &req.selected_repos {
                self.store.enqueue_repo(entry.clone())?;
            }
            return Ok(());
        }
        let opts = ctrlscan_adapters::ListReposOptions::default();
        let repos = self.repo_provider.list_repos(&opts).await.map_err(|e| CoreError::external(e.to_string()))?;
        for repo in repos {
            let key = RepoKey::from(&repo);
            let entry = RepoQueueEntry::new(key, repo.clone_url, repo.default_branch, self.clock.epoch_ms());
            self.store.enqueue_repo(entry)?;
        }
        Ok(())
    }

    /// One worker: claims repos one at a time until the queue is drained or
    /// the sweep is canceled, respecting pause between claims. Returns
    /// (succeeded, failed) counts for this worker's repos.
    async fn worker_loop(&self, name: &str, req: &TriggerRequest, cancel: CancellationToken) -> (u32, u32) {
        let mut succeeded = 0;
        let mut failed = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            loop {
                if !self.state.lock().paused || cancel.is_cancelled() {
                    break;
                }
                self.resume_signal.notified().await;
            }
            if cancel.is_cancelled() {
                break;
            }
            let entry = match self.store.claim_next_repo() {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "failed to claim next repo");
                    break;
                }
            };
            self.register_worker(name, Some(entry.key.name.clone()), "scanning");
            match self.process_repo(&entry, req, cancel.clone()).await {
                true => succeeded += 1,
                false => failed += 1,
            }
            self.touch_activity();
        }
        self.register_worker(name, None, "idle");
        (succeeded, failed)
    }

    /// Clone -> scan -> normalize -> lifecycle for one repo. Returns `true`
    /// on a successfully completed (or partial) job, `false` on a
    /// repo-level failure (checkout, filesystem).
    async fn process_repo(&self, entry: &RepoQueueEntry, req: &TriggerRequest, cancel: CancellationToken) -> bool {
        let id = ctrlscan_core::scan_job::ScanJobId::new();
        let job_id = id.to_string();
        let job = ScanJob {
            id,
            unique_key: ScanJob::unique_key_for(entry.key.provider, &entry.key.owner, &entry.key.name, &entry.default_branch, ""),
            provider: entry.key.provider,
            owner: entry.key.owner.clone(),
            repo: entry.key.name.clone(),
            branch: entry.default_branch.clone(),
            commit: String::new(),
            status: ScanStatus::Running,
            scan_mode: req.mode.unwrap_or(ScanMode::Triage),
            severity: Default::default(),
            started_at_ms: self.clock.epoch_ms(),
            completed_at_ms: None,
            error_msg: None,
            triggered_by: None,
        };
        if let Err(e) = self.store.upsert_scan_job(job) {
            tracing::error!(error = %e, "failed to persist scan job");
            return false;
        }

        let dest = std::env::temp_dir().join(format!("ctrlscan-clone-{job_id}"));
        let checkout_req = ctrlscan_adapters::CheckoutRequest {
            clone_url: entry.clone_url.clone(),
            branch: entry.default_branch.clone(),
            dest: dest.clone(),
        };
        let checkout_path = match self.checkout.checkout(&checkout_req).await {
            Ok(path) => path,
            Err(e) => {
                self.fail_job(&job_id, &e.to_string());
                self.emit(SweepEvent::RepoSkipped { owner: entry.key.owner.clone(), repo: entry.key.name.clone(), reason: e.to_string() });
                self.finish_queue_entry(entry);
                return false;
            }
        };

        let run_params = RunParams {
            job_id: job_id.clone(),
            checkout_path: checkout_path.clone(),
            provider: entry.key.provider,
            owner: entry.key.owner.clone(),
            repo: entry.key.name.clone(),
            branch: entry.default_branch.clone(),
            commit: String::new(),
            parallel: true,
        };

        let ok = match run_scan(&self.store, &self.clock, &self.scanners, &run_params, cancel).await {
            Ok(outcome) => {
                let ctx = ScanContext {
                    provider: entry.key.provider,
                    owner: entry.key.owner.clone(),
                    repo: entry.key.name.clone(),
                    branch: entry.default_branch.clone(),
                    commit: String::new(),
                    scan_job_id: job_id.clone(),
                    scanned_at_ms: self.clock.epoch_ms(),
                };
                if let Err(e) = apply_scan_to_lifecycle(&self.store, &ctx, &outcome.findings) {
                    tracing::error!(error = %e, "lifecycle update failed");
                }
                true
            }
            Err(e) => {
                self.fail_job(&job_id, &e.to_string());
                false
            }
        };

        self.checkout.cleanup(&checkout_path).await;
        self.finish_queue_entry(entry);
        ok
    }

    fn fail_job(&self, job_id: &str, error: &str) {
        if let Ok(mut job) = self.store.get_scan_job(job_id) {
            job.status = ScanStatus::Failed;
            job.completed_at_ms = Some(self.clock.epoch_ms());
            job.error_msg = Some(error.to_string());
            let _ = self.store.upsert_scan_job(job);
        }
    }

    fn finish_queue_entry(&self, entry: &RepoQueueEntry) {
        let mut entry = entry.clone();
        entry.status = ctrlscan_core::queue::QueueStatus::Done;
        let _ = self.store.enqueue_repo(entry);
    }
}

/// `SweepControl` needs an `Arc<Orchestrator>` receiver to spawn sweeps, but
/// the trait's methods take `&self`; this thin handle closes that gap so
/// the scheduler and remediation engine can hold a `dyn SweepControl`
/// without knowing the concrete orchestrator type.
pub struct OrchestratorHandle<C: Clock>(pub Arc<Orchestrator<C>>);

impl<C: Clock> Clone for OrchestratorHandle<C> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[async_trait]
impl<C: Clock> SweepControl for OrchestratorHandle<C> {
    async fn trigger(&self) -> CoreResult<()> {
        self.0.trigger()
    }

    async fn trigger_with_selected_repos(&self, repo_keys: Vec<RepoKey>) -> CoreResult<()> {
        let mut selected = Vec::new();
        for key in repo_keys {
            match self.0.repo_provider.get_repo(&key.owner, &key.name).await {
                Ok(repo) => {
                    let entry = RepoQueueEntry::new(RepoKey::from(&repo), repo.clone_url, repo.default_branch, self.0.clock.epoch_ms());
                    selected.push(entry);
                }
                Err(e) => tracing::warn!(owner = %key.owner, repo = %key.name, error = %e, "could not resolve selected repo; skipping"),
            }
        }
        self.0.trigger_with_request(TriggerRequest { scoped: true, selected_repos: selected, ..Default::default() })
    }

    async fn stop_current_sweep(&self) -> CoreResult<bool> {
        self.0.stop_current_sweep()
    }

    async fn cancel_remediation_for_campaign(&self, campaign_id: &str) -> CoreResult<()> {
        self.0.cancel_remediation(campaign_id);
        Ok(())
    }

    async fn cancel_remediation_for_scan_job(&self, scan_job_id: &str) -> CoreResult<()> {
        self.0.cancel_remediation(scan_job_id);
        Ok(())
    }

    fn is_sweep_in_flight(&self) -> bool {
        self.0.is_sweep_in_flight()
    }
}

fn clamp_workers(n: usize) -> usize {
    n.clamp(1, 64)
}

/// Pure health derivation so the four-state machine (spec.md §4.E) is
/// testable without waiting on real timers.
fn derive_health(
    config: &OrchestratorConfig,
    started_at_ms: u64,
    last_event_at_ms: Option<u64>,
    sweep_running: bool,
    last_activity_at_ms: Option<u64>,
    now_ms: u64,
) -> (AgentHealth, Option<u64>) {
    let dead_ms = config.dead_threshold.as_millis() as u64;
    let stuck_ms = config.stuck_threshold.as_millis() as u64;

    if last_event_at_ms.is_none() && now_ms.saturating_sub(started_at_ms) > dead_ms {
        return (AgentHealth::Dead, None);
    }
    if !sweep_running {
        return (AgentHealth::Idle, None);
    }
    let since_activity = now_ms.saturating_sub(last_activity_at_ms.unwrap_or(started_at_ms));
    if since_activity > stuck_ms {
        (AgentHealth::Stuck, Some(since_activity / 1000))
    } else {
        (AgentHealth::Alive, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlscan_adapters::{FakeCheckout, FakeRepoProvider, FakeScanner};
    use ctrlscan_core::clock::FakeClock;
    use ctrlscan_core::event::RecordingEventSink;
    use ctrlscan_core::repo::{Provider, Repo};
    use ctrlscan_core::scanner::ScannerKind;
    use tempfile::tempdir;
    use tokio::time::{sleep, Duration as TokioDuration};

    fn repo(owner: &str, name: &str) -> Repo {
        Repo {
            provider: Provider::GitHub,
            host: "github.com".into(),
            owner: owner.into(),
            name: name.into(),
            full_name: format!("{owner}/{name}"),
            private: false,
            language: None,
            stars: 0,
            html_url: format!("https://github.com/{owner}/{name}"),
            clone_url: format!("https://github.com/{owner}/{name}.git"),
            default_branch: "main".into(),
        }
    }

    fn build_orchestrator(store: Arc<Store>, repos: Vec<Repo>) -> Arc<Orchestrator<FakeClock>> {
        let provider = Arc::new(FakeRepoProvider::new(Provider::GitHub, repos));
        let checkout = Arc::new(FakeCheckout::new());
        let scanner: Arc<dyn Scanner> = Arc::new(FakeScanner::new("osv-scanner", ScannerKind::Sca));
        let mut config = OrchestratorConfig::default();
        config.default_workers = 2;
        Arc::new(Orchestrator::new(store, FakeClock::default(), vec![scanner], checkout, provider, config))
    }

    async fn wait_until_idle(orch: &Arc<Orchestrator<FakeClock>>) {
        for _ in 0..200 {
            if !orch.is_sweep_in_flight() {
                return;
            }
            sleep(TokioDuration::from_millis(5)).await;
        }
        panic!("sweep never went idle");
    }

    fn open_store(dir: &std::path::Path) -> Arc<Store> {
        Arc::new(Store::open_temp(dir))
    }

    #[tokio::test]
    async fn trigger_discovers_and_processes_every_repo() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let orch = build_orchestrator(store.clone(), vec![repo("acme", "api"), repo("acme", "web")]);

        orch.trigger().unwrap();
        wait_until_idle(&orch).await;

        assert_eq!(store.pending_queue_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn trigger_while_in_flight_coalesces_into_one_rerun() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let orch = build_orchestrator(store.clone(), vec![repo("acme", "api")]);

        orch.trigger().unwrap();
        assert!(orch.is_sweep_in_flight());
        orch.trigger().unwrap();
        orch.trigger().unwrap();
        wait_until_idle(&orch).await;
        // Draining is robust to however many reruns coalescing produced;
        // the point is every repo is eventually marked done without panics.
        assert_eq!(store.pending_queue_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn stop_current_sweep_marks_running_jobs_stopped() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let orch = build_orchestrator(store.clone(), vec![repo("acme", "api")]);

        // `trigger` flips `sweep_in_flight` synchronously before spawning
        // the sweep task, so calling `stop_current_sweep` before the test
        // yields lets us exercise the cancel-before-any-worker-claims path
        // deterministically.
        orch.trigger().unwrap();
        assert!(orch.stop_current_sweep().unwrap());

        for job in store.running_scan_jobs().unwrap() {
            panic!("job {} should have been stopped, not left running", job.id);
        }
        assert!(!orch.is_sweep_in_flight());
    }

    #[tokio::test]
    async fn handle_trigger_with_selected_repos_resolves_clone_urls() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let orch = build_orchestrator(store.clone(), vec![repo("acme", "api")]);
        let handle = OrchestratorHandle(orch.clone());

        handle.trigger_with_selected_repos(vec![RepoKey::new(Provider::GitHub, "github.com", "acme", "api")]).await.unwrap();
        wait_until_idle(&orch).await;

        assert_eq!(store.pending_queue_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn pause_then_resume_eventually_drains_the_queue() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let orch = build_orchestrator(store.clone(), vec![repo("acme", "api")]);

        orch.pause();
        orch.trigger().unwrap();
        sleep(TokioDuration::from_millis(20)).await;
        assert_eq!(store.pending_queue_len().unwrap(), 0, "trigger while paused is recorded, not started");

        orch.resume();
        wait_until_idle(&orch).await;
    }

    #[test]
    fn derive_health_is_dead_before_first_event_past_the_threshold() {
        let config = OrchestratorConfig::default();
        let (health, _) = derive_health(&config, 0, None, false, None, 11 * 60 * 1000);
        assert_eq!(health, AgentHealth::Dead);
    }

    #[test]
    fn derive_health_is_idle_when_sweep_not_running() {
        let config = OrchestratorConfig::default();
        let (health, _) = derive_health(&config, 0, Some(100), false, None, 1000);
        assert_eq!(health, AgentHealth::Idle);
    }

    #[test]
    fn derive_health_is_alive_within_the_stuck_threshold() {
        let config = OrchestratorConfig::default();
        let (health, _) = derive_health(&config, 0, Some(100), true, Some(1000), 2000);
        assert_eq!(health, AgentHealth::Alive);
    }

    #[test]
    fn derive_health_is_stuck_past_the_stuck_threshold() {
        let config = OrchestratorConfig::default();
        let now = 16 * 60 * 1000;
        let (health, stuck_for) = derive_health(&config, 0, Some(100), true, Some(0), now);
        assert_eq!(health, AgentHealth::Stuck);
        assert_eq!(stuck_for, Some(now / 1000));
    }

    #[test]
    fn clamp_workers_enforces_the_1_to_64_range() {
        assert_eq!(clamp_workers(0), 1);
        assert_eq!(clamp_workers(200), 64);
        assert_eq!(clamp_workers(8), 8);
    }

    #[tokio::test]
    async fn events_are_recorded_through_a_custom_sink() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let sink = Arc::new(RecordingEventSink::default());
        let provider = Arc::new(FakeRepoProvider::new(Provider::GitHub, vec![repo("acme", "api")]));
        let checkout = Arc::new(FakeCheckout::new());
        let scanner: Arc<dyn Scanner> = Arc::new(FakeScanner::new("osv-scanner", ScannerKind::Sca));
        let orch = Arc::new(
            Orchestrator::new(store, FakeClock::default(), vec![scanner], checkout, provider, OrchestratorConfig::default())
                .with_event_sink(sink.clone()),
        );

        orch.trigger().unwrap();
        wait_until_idle(&orch).await;

        let events = sink.events.lock();
        assert!(events.iter().any(|e| matches!(e, SweepEvent::SweepStarted { .. })));
        assert!(events.iter().any(|e| matches!(e, SweepEvent::SweepCompleted { .. })));
    }
}
