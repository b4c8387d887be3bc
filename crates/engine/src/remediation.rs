// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remediation Engine: batch offline AI remediation campaigns (spec.md
//! §4.G). Creates campaigns with conflict detection, materializes one
//! [`RemediationTask`] per candidate scan job, runs the AI triage/fix
//! pipeline per task, and enqueues candidate PRs onto the fix queue.

use ctrlscan_adapters::ai::LOW_CONFIDENCE_THRESHOLD;
use ctrlscan_adapters::{AiProvider, FixContext, RepoProvider};
use ctrlscan_core::campaign::{CampaignFilters, CampaignStatus, RemediationCampaign, TaskCounters};
use ctrlscan_core::clock::Clock;
use ctrlscan_core::event::{EventSink, NullEventSink, SweepEvent};
use ctrlscan_core::finding::{FindingStatus, NormalizedFinding};
use ctrlscan_core::fixqueue::{FixQueueEntry, FixQueueEntryId, FixQueueStatus};
use ctrlscan_core::repo::Provider;
use ctrlscan_core::scan_job::{ScanJob, ScanMode};
use ctrlscan_core::task::{AiProgress, RemediationTask, TaskStatus};
use ctrlscan_core::{CoreError, CoreResult};
use ctrlscan_storage::Store;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::Orchestrator;

/// Fallback candidate pool size when a campaign's filters don't name
/// explicit `scan_job_ids` (spec.md §4.G: "the most recent 2,000").
const RECENT_CANDIDATE_LIMIT: usize = 2_000;

#[derive(Debug, Clone)]
pub struct RemediationEngineConfig {
    pub worker_count: usize,
}

impl Default for RemediationEngineConfig {
    fn default() -> Self {
        Self { worker_count: 2 }
    }
}

fn default_host(provider: Provider) -> &'static str {
    match provider {
        Provider::GitHub => "github.com",
        Provider::GitLab => "gitlab.com",
        Provider::AzureDevOps => "dev.azure.com",
    }
}

pub struct RemediationEngine<C: Clock> {
    store: Arc<Store>,
    clock: C,
    providers: HashMap<Provider, Arc<dyn RepoProvider>>,
    ai: Arc<dyn AiProvider>,
    orchestrator: Arc<Orchestrator<C>>,
    events: Arc<dyn EventSink>,
    config: RemediationEngineConfig,
    claim_lock: Mutex<()>,
    campaign_cancels: Mutex<HashMap<String, CancellationToken>>,
    task_cancels: Mutex<HashMap<String, CancellationToken>>,
}

impl<C: Clock> RemediationEngine<C> {
    pub fn new(
        store: Arc<Store>,
        clock: C,
        providers: Vec<Arc<dyn RepoProvider>>,
        ai: Arc<dyn AiProvider>,
        orchestrator: Arc<Orchestrator<C>>,
        config: RemediationEngineConfig,
    ) -> Self {
        let providers = providers.into_iter().map(|p| (p.name(), p)).collect();
        Self {
            store,
            clock,
            providers,
            ai,
            orchestrator,
            events: Arc::new(NullEventSink),
            config,
            claim_lock: Mutex::new(()),
            campaign_cancels: Mutex::new(HashMap::new()),
            task_cancels: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    fn candidate_scan_job_ids(&self, filters: &CampaignFilters) -> CoreResult<Vec<String>> {
        if !filters.scan_job_ids.is_empty() {
            return Ok(filters.scan_job_ids.clone());
        }
        Ok(self.store.recent_scan_jobs(RECENT_CANDIDATE_LIMIT)?.into_iter().map(|j| j.id.to_string()).collect())
    }

    /// Creation (spec.md §4.G "Creation"). Conflict-checks the filters'
    /// candidate scan jobs against active campaigns unless `force` is set,
    /// then persists a `draft` campaign. Does not materialize tasks —
    /// callers call [`Self::materialize_tasks`] next.
    pub fn create_campaign(&self, name: String, mode: ScanMode, auto_pr: bool, filters: CampaignFilters, force: bool) -> CoreResult<RemediationCampaign> {
        if !force {
            let candidate_ids = self.candidate_scan_job_ids(&filters)?;
            let conflicts = self.store.campaigns_overlapping(&candidate_ids)?;
            if !conflicts.is_empty() {
                return Err(CoreError::conflict(format!("{} scan job(s) already belong to an active campaign", conflicts.len())));
            }
        }
        let campaign = RemediationCampaign {
            id: ctrlscan_core::campaign::CampaignId::new(),
            name,
            status: CampaignStatus::Draft,
            mode,
            auto_pr,
            filters,
            counters: TaskCounters::default(),
            created_at_ms: self.clock.epoch_ms(),
        };
        self.store.upsert_campaign(campaign.clone())?;
        Ok(campaign)
    }

    /// Task materialization (spec.md §4.G): resolve candidate scan jobs,
    /// apply the repo/scanner/severity filters, dedup to one task per repo
    /// when `latest_only`, cut off at `max_repos`, resolve each task's
    /// `clone_url`, and persist one [`RemediationTask`] per survivor.
    pub async fn materialize_tasks(&self, campaign_id: &str) -> CoreResult<TaskCounters> {
        let mut campaign = self.store.get_campaign(campaign_id)?;
        let candidate_ids = self.candidate_scan_job_ids(&campaign.filters)?;
        let mut jobs: Vec<ScanJob> = candidate_ids.iter().filter_map(|id| self.store.get_scan_job(id).ok()).collect();

        if !campaign.filters.repos.is_empty() {
            let allow: HashSet<String> = campaign.filters.repos.iter().map(|r| r.to_ascii_lowercase()).collect();
            jobs.retain(|j| allow.contains(&format!("{}/{}", j.owner, j.repo).to_ascii_lowercase()));
        }
        if !campaign.filters.scanners.is_empty() || !campaign.filters.kinds.is_empty() || !campaign.filters.severities.is_empty() {
            let mut kept = Vec::with_capacity(jobs.len());
            for job in jobs {
                if self.job_matches_finding_filters(&job, &campaign.filters) {
                    kept.push(job);
                }
            }
            jobs = kept;
        }
        if campaign.filters.latest_only {
            let mut best: HashMap<String, ScanJob> = HashMap::new();
            for job in jobs {
                let key = format!("{}|{}|{}|{}", job.provider, job.owner.to_ascii_lowercase(), job.repo.to_ascii_lowercase(), job.branch.to_ascii_lowercase());
                best.entry(key).and_modify(|existing| {
                    if job.started_at_ms > existing.started_at_ms {
                        *existing = job.clone();
                    }
                }).or_insert(job);
            }
            jobs = best.into_values().collect();
        }
        jobs.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));
        if campaign.filters.max_repos > 0 {
            jobs.truncate(campaign.filters.max_repos as usize);
        }

        let mut counters = TaskCounters::default();
        for job in &jobs {
            let clone_url = self.resolve_clone_url(job).await;
            let task = RemediationTask {
                campaign_id: campaign.id,
                scan_job_id: job.id.to_string(),
                provider: job.provider,
                owner: job.owner.clone(),
                repo: job.repo.clone(),
                branch: job.branch.clone(),
                clone_url,
                status: TaskStatus::Pending,
                worker_name: None,
                progress: AiProgress::default(),
                counters: Default::default(),
                last_error: None,
            };
            self.store.upsert_task(task)?;
            counters.total += 1;
            counters.pending += 1;
        }
        campaign.counters = counters;
        campaign.status = if counters.total > 0 { CampaignStatus::Running } else { CampaignStatus::Completed };
        self.store.upsert_campaign(campaign.clone())?;
        Ok(counters)
    }

    fn job_matches_finding_filters(&self, job: &ScanJob, filters: &CampaignFilters) -> bool {
        let Ok(findings) = self.store.findings_for_scan_job(&job.id.to_string()) else { return false };
        findings.iter().any(|f| {
            (filters.scanners.is_empty() || filters.scanners.contains(&f.kind))
                && (filters.kinds.is_empty() || filters.kinds.contains(&f.kind))
                && (filters.severities.is_empty() || filters.severities.contains(&f.severity))
        })
    }

    async fn resolve_clone_url(&self, job: &ScanJob) -> String {
        if let Some(provider) = self.providers.get(&job.provider) {
            if let Ok(repo) = provider.get_repo(&job.owner, &job.repo).await {
                return repo.clone_url;
            }
        }
        format!("https://{}/{}/{}.git", default_host(job.provider), job.owner, job.repo)
    }

    /// Execution (spec.md §4.G): spawns `config.worker_count` workers, each
    /// claiming pending tasks for `campaign_id` until none remain.
    pub fn start_campaign(self: &Arc<Self>, campaign_id: &str) -> CoreResult<()> {
        let mut campaign = self.store.get_campaign(campaign_id)?;
        campaign.status = CampaignStatus::Running;
        self.store.upsert_campaign(campaign)?;

        let cancel = CancellationToken::new();
        self.campaign_cancels.lock().insert(campaign_id.to_string(), cancel.clone());
        self.orchestrator.register_remediation_cancel(campaign_id.to_string(), cancel.clone());

        for i in 0..self.config.worker_count.max(1) {
            let this = Arc::clone(self);
            let campaign_id = campaign_id.to_string();
            let cancel = cancel.clone();
            let worker_name = format!("remediation-{i}");
            tokio::spawn(async move { this.worker_loop(&worker_name, &campaign_id, cancel).await });
        }
        Ok(())
    }

    async fn worker_loop(&self, worker_name: &str, campaign_id: &str, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(task) = self.claim_next_pending_task(campaign_id, worker_name) else { break };
            let task_cancel = cancel.child_token();
            self.task_cancels.lock().insert(task.scan_job_id.clone(), task_cancel.clone());
            self.orchestrator.register_remediation_cancel(task.scan_job_id.clone(), task_cancel.clone());

            self.run_task(task.clone(), task_cancel).await;

            self.task_cancels.lock().remove(&task.scan_job_id);
            self.orchestrator.clear_remediation_cancel(&task.scan_job_id);
        }
        self.finalize_campaign_if_done(campaign_id);
    }

    fn claim_next_pending_task(&self, campaign_id: &str, worker_name: &str) -> Option<RemediationTask> {
        let _guard = self.claim_lock.lock();
        let mut tasks = self.store.tasks_for_campaign(campaign_id).ok()?;
        tasks.sort_by(|a, b| a.scan_job_id.cmp(&b.scan_job_id));
        for mut task in tasks {
            if task.status == TaskStatus::Pending {
                task.status = TaskStatus::Running;
                task.worker_name = Some(worker_name.to_string());
                self.store.upsert_task(task.clone()).ok()?;
                return Some(task);
            }
        }
        None
    }

    async fn run_task(&self, mut task: RemediationTask, cancel: CancellationToken) {
        let scan_job_id = task.scan_job_id.clone();
        let findings = match self.store.findings_for_scan_job(&scan_job_id) {
            Ok(f) => f,
            Err(e) => {
                task.fail(e.to_string());
                let _ = self.store.upsert_task(task);
                return;
            }
        };
        let open: Vec<NormalizedFinding> = findings.into_iter().filter(|f| f.status == FindingStatus::Open).collect();
        task.counters.findings_loaded = open.len() as u32;
        task.progress.advance("triage", 0, open.len() as u32, "starting triage", self.clock.epoch_ms());
        let _ = self.store.upsert_task(task.clone());

        if cancel.is_cancelled() {
            task.stop();
            let _ = self.store.upsert_task(task);
            return;
        }

        let triage = match self.ai.triage(&open).await {
            Ok(t) => t,
            Err(e) => {
                task.fail(e.to_string());
                let _ = self.store.upsert_task(task);
                return;
            }
        };
        task.counters.triage_batches = 1;
        task.counters.triage_status = "completed".to_string();
        task.counters.triage_summary = triage.summary;

        let worth: HashSet<String> = triage.worth_fixing.into_iter().collect();
        let to_fix: Vec<&NormalizedFinding> = open.iter().filter(|f| worth.contains(&f.fingerprint)).collect();
        task.counters.deduped = to_fix.len() as u32;

        let context = FixContext { repo_full_name: format!("{}/{}", task.owner, task.repo), branch: task.branch.clone() };
        let total = to_fix.len() as u32;
        for (done, finding) in to_fix.into_iter().enumerate() {
            if cancel.is_cancelled() {
                task.stop();
                let _ = self.store.upsert_task(task);
                return;
            }
            task.counters.fix_attempted += 1;
            match self.ai.synthesize_fix(finding, &context).await {
                Ok(candidate) if candidate.confidence >= LOW_CONFIDENCE_THRESHOLD => {
                    let entry = FixQueueEntry {
                        id: FixQueueEntryId::new(),
                        scan_job_id: scan_job_id.clone(),
                        finding_type: finding.kind.to_string(),
                        finding_id: finding.fingerprint.clone(),
                        pr_title: candidate.pr_title,
                        pr_body: candidate.pr_body,
                        status: FixQueueStatus::Pending,
                        pr_url: None,
                        generated_at_ms: self.clock.epoch_ms(),
                        approved_at_ms: None,
                    };
                    match self.store.upsert_fix_queue_entry(entry) {
                        Ok(()) => task.counters.fix_queued += 1,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to enqueue fix candidate");
                            task.counters.fix_failed += 1;
                        }
                    }
                }
                Ok(_) => task.counters.fix_skipped_low_conf += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "fix synthesis failed");
                    task.counters.fix_failed += 1;
                }
            }
            task.progress.advance("fix", done as u32 + 1, total, "synthesizing fixes", self.clock.epoch_ms());
            let _ = self.store.upsert_task(task.clone());
            self.events.emit(SweepEvent::RemediationTaskProgress {
                campaign_id: task.campaign_id.to_string(),
                scan_job_id: scan_job_id.clone(),
                phase: task.progress.phase.clone(),
                percent: task.progress.percent,
            });
        }

        task.status = TaskStatus::Completed;
        let _ = self.store.upsert_task(task);
    }

    fn finalize_campaign_if_done(&self, campaign_id: &str) {
        let Ok(mut campaign) = self.store.get_campaign(campaign_id) else { return };
        if campaign.status == CampaignStatus::Stopped {
            return;
        }
        let Ok(tasks) = self.store.tasks_for_campaign(campaign_id) else { return };
        if tasks.iter().any(|t| t.is_in_flight()) {
            return;
        }
        campaign.counters = tally(&tasks);
        campaign.status = CampaignStatus::Completed;
        let _ = self.store.upsert_campaign(campaign);
        self.campaign_cancels.lock().remove(campaign_id);
        self.orchestrator.clear_remediation_cancel(campaign_id);
        self.events.emit(SweepEvent::RemediationCampaignFinished { campaign_id: campaign_id.to_string(), status: "completed".to_string() });
    }

    /// Stop (spec.md §4.G): cancels the campaign's token — which cascades
    /// to every in-flight task's child token — then transitions every
    /// still-in-flight task to `stopped` and recomputes counters.
    pub fn stop_campaign(&self, campaign_id: &str) -> CoreResult<TaskCounters> {
        if let Some(cancel) = self.campaign_cancels.lock().remove(campaign_id) {
            cancel.cancel();
        }
        self.orchestrator.clear_remediation_cancel(campaign_id);

        let mut campaign = self.store.get_campaign(campaign_id)?;
        let mut tasks = self.store.tasks_for_campaign(campaign_id)?;
        for task in &mut tasks {
            task.stop();
            self.store.upsert_task(task.clone())?;
        }
        let counters = tally(&tasks);
        campaign.counters = counters;
        campaign.status = CampaignStatus::Stopped;
        self.store.upsert_campaign(campaign)?;
        self.events.emit(SweepEvent::RemediationCampaignFinished { campaign_id: campaign_id.to_string(), status: "stopped".to_string() });
        Ok(counters)
    }

    pub fn stop_task(&self, scan_job_id: &str) {
        if let Some(token) = self.task_cancels.lock().remove(scan_job_id) {
            token.cancel();
        }
        self.orchestrator.clear_remediation_cancel(scan_job_id);
    }

    /// Fix queue approve/reject (spec.md §4.G).
    pub fn approve_fix(&self, id: &str) -> CoreResult<FixQueueEntry> {
        let mut entry = self.store.get_fix_queue_entry(id)?;
        entry.approve(self.clock.epoch_ms())?;
        self.store.upsert_fix_queue_entry(entry.clone())?;
        Ok(entry)
    }

    pub fn reject_fix(&self, id: &str) -> CoreResult<FixQueueEntry> {
        let mut entry = self.store.get_fix_queue_entry(id)?;
        entry.reject()?;
        self.store.upsert_fix_queue_entry(entry.clone())?;
        Ok(entry)
    }
}

fn tally(tasks: &[RemediationTask]) -> TaskCounters {
    let mut counters = TaskCounters::default();
    for task in tasks {
        counters.total += 1;
        match task.status {
            TaskStatus::Pending => counters.pending += 1,
            TaskStatus::Running => counters.running += 1,
            TaskStatus::Completed => counters.completed += 1,
            TaskStatus::Failed => counters.failed += 1,
            TaskStatus::Skipped | TaskStatus::Stopped => counters.skipped += 1,
        }
    }
    counters
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlscan_adapters::{FakeAiProvider, FakeCheckout, FakeRepoProvider, FakeScanner};
    use ctrlscan_core::clock::FakeClock;
    use ctrlscan_core::finding::Severity;
    use ctrlscan_core::repo::Repo;
    use ctrlscan_core::scanner::ScannerKind;
    use tempfile::tempdir;

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

    fn finding(scan_job_id: &str, fingerprint: &str, severity: Severity) -> NormalizedFinding {
        NormalizedFinding {
            scan_job_id: scan_job_id.to_string(),
            kind: ScannerKind::Sca,
            scanner: "osv-scanner".into(),
            fingerprint: fingerprint.to_string(),
            severity,
            title: format!("finding {fingerprint}"),
            file_path: "package.json".into(),
            line: None,
            message: "vulnerable dependency".into(),
            package: Some("lodash".into()),
            version: Some("4.0.0".into()),
            fix: None,
            status: FindingStatus::Open,
            first_seen_at_ms: 0,
            last_seen_at_ms: 0,
            introduced: true,
            reintroduced: false,
        }
    }

    fn build(store: Arc<Store>, repos: Vec<Repo>, ai: Arc<dyn AiProvider>) -> Arc<RemediationEngine<FakeClock>> {
        let provider: Arc<dyn RepoProvider> = Arc::new(FakeRepoProvider::new(Provider::GitHub, repos));
        let checkout = Arc::new(FakeCheckout::new());
        let scanner: Arc<dyn ctrlscan_adapters::Scanner> = Arc::new(FakeScanner::new("osv-scanner", ScannerKind::Sca));
        let orch = Arc::new(Orchestrator::new(store.clone(), FakeClock::default(), vec![scanner], checkout, provider.clone(), Default::default()));
        Arc::new(RemediationEngine::new(store, FakeClock::default(), vec![provider], ai, orch, RemediationEngineConfig::default()))
    }

    fn seed_job(store: &Store, owner: &str, repo: &str, started_at_ms: u64) -> ScanJob {
        let job = ScanJob::fixture().owner(owner).repo(repo).started_at_ms(started_at_ms).build();
        store.upsert_scan_job(job.clone()).unwrap();
        job
    }

    #[tokio::test]
    async fn create_campaign_rejects_overlap_unless_forced() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open_temp(dir.path()));
        let engine = build(store.clone(), vec![repo("acme", "api")], Arc::new(FakeAiProvider::new()));
        let job = seed_job(&store, "acme", "api", 1000);

        let filters = CampaignFilters { scan_job_ids: vec![job.id.to_string()], ..Default::default() };
        let first = engine.create_campaign("first".into(), ScanMode::Triage, false, filters.clone(), false).unwrap();
        engine.materialize_tasks(first.id.as_str()).await.unwrap();

        let result = engine.create_campaign("second".into(), ScanMode::Triage, false, filters.clone(), false);
        assert!(result.is_err());

        let forced = engine.create_campaign("third".into(), ScanMode::Triage, false, filters, true);
        assert!(forced.is_ok());
    }

    #[tokio::test]
    async fn materialize_tasks_keeps_latest_only_per_repo_and_resolves_clone_url() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open_temp(dir.path()));
        let engine = build(store.clone(), vec![repo("acme", "api")], Arc::new(FakeAiProvider::new()));
        let older = seed_job(&store, "acme", "api", 1000);
        let newer = seed_job(&store, "acme", "api", 2000);

        let filters = CampaignFilters { scan_job_ids: vec![older.id.to_string(), newer.id.to_string()], ..Default::default() };
        let campaign = engine.create_campaign("dedup".into(), ScanMode::Triage, false, filters, false).unwrap();
        let counters = engine.materialize_tasks(campaign.id.as_str()).await.unwrap();

        assert_eq!(counters.total, 1);
        let tasks = store.tasks_for_campaign(campaign.id.as_str()).unwrap();
        assert_eq!(tasks[0].scan_job_id, newer.id.to_string());
        assert_eq!(tasks[0].clone_url, "https://github.com/acme/api.git");
    }

    #[tokio::test]
    async fn materialize_tasks_respects_max_repos_cutoff() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open_temp(dir.path()));
        let engine = build(store.clone(), vec![repo("acme", "a"), repo("acme", "b")], Arc::new(FakeAiProvider::new()));
        let a = seed_job(&store, "acme", "a", 1000);
        let b = seed_job(&store, "acme", "b", 2000);

        let filters = CampaignFilters { scan_job_ids: vec![a.id.to_string(), b.id.to_string()], max_repos: 1, latest_only: false, ..Default::default() };
        let campaign = engine.create_campaign("cutoff".into(), ScanMode::Triage, false, filters, false).unwrap();
        let counters = engine.materialize_tasks(campaign.id.as_str()).await.unwrap();

        assert_eq!(counters.total, 1);
        let tasks = store.tasks_for_campaign(campaign.id.as_str()).unwrap();
        assert_eq!(tasks[0].scan_job_id, b.id.to_string());
    }

    #[tokio::test]
    async fn execution_triages_and_queues_high_confidence_fixes() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open_temp(dir.path()));
        let engine = build(store.clone(), vec![repo("acme", "api")], Arc::new(FakeAiProvider::with_confidence(0.9)));
        let job = seed_job(&store, "acme", "api", 1000);
        store.replace_scan_job_findings(&job.id.to_string(), vec![finding(&job.id.to_string(), "f1", Severity::High)]).unwrap();

        let filters = CampaignFilters { scan_job_ids: vec![job.id.to_string()], ..Default::default() };
        let campaign = engine.create_campaign("exec".into(), ScanMode::Triage, false, filters, false).unwrap();
        engine.materialize_tasks(campaign.id.as_str()).await.unwrap();

        engine.start_campaign(campaign.id.as_str()).unwrap();
        for _ in 0..200 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            if store.get_campaign(campaign.id.as_str()).unwrap().status != CampaignStatus::Running {
                break;
            }
        }

        let tasks = store.tasks_for_campaign(campaign.id.as_str()).unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Completed);
        assert_eq!(tasks[0].counters.fix_queued, 1);
        assert_eq!(store.list_fix_queue().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn execution_skips_low_confidence_fixes() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open_temp(dir.path()));
        let engine = build(store.clone(), vec![repo("acme", "api")], Arc::new(FakeAiProvider::with_confidence(0.1)));
        let job = seed_job(&store, "acme", "api", 1000);
        store.replace_scan_job_findings(&job.id.to_string(), vec![finding(&job.id.to_string(), "f1", Severity::Low)]).unwrap();

        let filters = CampaignFilters { scan_job_ids: vec![job.id.to_string()], ..Default::default() };
        let campaign = engine.create_campaign("lowconf".into(), ScanMode::Triage, false, filters, false).unwrap();
        engine.materialize_tasks(campaign.id.as_str()).await.unwrap();
        engine.start_campaign(campaign.id.as_str()).unwrap();

        for _ in 0..200 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            if store.get_campaign(campaign.id.as_str()).unwrap().status != CampaignStatus::Running {
                break;
            }
        }

        let tasks = store.tasks_for_campaign(campaign.id.as_str()).unwrap();
        assert_eq!(tasks[0].counters.fix_skipped_low_conf, 1);
        assert!(store.list_fix_queue().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_campaign_marks_in_flight_tasks_stopped() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open_temp(dir.path()));
        let engine = build(store.clone(), vec![repo("acme", "api")], Arc::new(FakeAiProvider::new()));
        let job = seed_job(&store, "acme", "api", 1000);

        let filters = CampaignFilters { scan_job_ids: vec![job.id.to_string()], ..Default::default() };
        let campaign = engine.create_campaign("stop-me".into(), ScanMode::Triage, false, filters, false).unwrap();
        engine.materialize_tasks(campaign.id.as_str()).await.unwrap();

        let counters = engine.stop_campaign(campaign.id.as_str()).unwrap();
        assert_eq!(counters.skipped, 1);
        let reloaded = store.get_campaign(campaign.id.as_str()).unwrap();
        assert_eq!(reloaded.status, CampaignStatus::Stopped);
    }

    #[tokio::test]
    async fn approve_and_reject_are_mutually_exclusive() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open_temp(dir.path()));
        let engine = build(store.clone(), vec![], Arc::new(FakeAiProvider::new()));
        let entry = FixQueueEntry {
            id: FixQueueEntryId::new(),
            scan_job_id: "scj-1".into(),
            finding_type: "sca".into(),
            finding_id: "f1".into(),
            pr_title: "bump lodash".into(),
            pr_body: "fixes CVE".into(),
            status: FixQueueStatus::Pending,
            pr_url: None,
            generated_at_ms: 0,
            approved_at_ms: None,
        };
        store.upsert_fix_queue_entry(entry.clone()).unwrap();

        let approved = engine.approve_fix(entry.id.as_str()).unwrap();
        assert_eq!(approved.status, FixQueueStatus::Approved);
        assert!(engine.reject_fix(entry.id.as_str()).is_err());
    }
}
