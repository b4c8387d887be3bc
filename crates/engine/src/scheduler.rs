// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler: cron-driven trigger source with scope resolution (spec.md
//! §4.F). Registers one background tick loop per enabled [`Schedule`],
//! each computing its own next fire time and handing a resolved
//! `TriggerRequest` to the [`Orchestrator`].

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use ctrlscan_adapters::{ListReposOptions, RepoProvider, Visibility};
use ctrlscan_core::clock::Clock;
use ctrlscan_core::queue::RepoQueueEntry;
use ctrlscan_core::repo::{Provider, Repo, RepoKey};
use ctrlscan_core::scan_job::ScanMode;
use ctrlscan_core::schedule::{OwnerPrefixSelector, ScheduleId, ScopeJson};
use ctrlscan_core::schedule::Schedule;
use ctrlscan_core::{CoreError, CoreResult};
use ctrlscan_storage::Store;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{Orchestrator, TriggerRequest};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Safety cap on paged `ListRepos` calls per fire, so a misbehaving
    /// provider can't loop the discovery pipeline forever.
    pub max_discovery_pages: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_discovery_pages: 50 }
    }
}

/// One schedule's parsed firing rule.
enum FireExpr {
    Cron(CronSchedule),
    Every(Duration),
}

fn parse_every_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let mut total = Duration::ZERO;
    let mut num = String::new();
    let mut saw_unit = false;
    for c in s.chars() {
        if c.is_ascii_digit() {
            num.push(c);
        } else {
            let n: u64 = num.parse().ok()?;
            num.clear();
            let secs = match c {
                's' => n,
                'm' => n * 60,
                'h' => n * 3600,
                _ => return None,
            };
            total += Duration::from_secs(secs);
            saw_unit = true;
        }
    }
    if !num.is_empty() || !saw_unit {
        return None;
    }
    Some(total)
}

/// Parses spec.md §4.F's expression grammar: standard 5-field cron,
/// `@every <duration>`, `@hourly`, `@daily`. The `cron` crate requires a
/// leading seconds field, so a 5-field expression is prefixed with `0 `.
fn parse_expr(expr: &str) -> CoreResult<FireExpr> {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix("@every ") {
        let dur = parse_every_duration(rest).ok_or_else(|| CoreError::invalid(format!("invalid @every duration: {rest}")))?;
        return Ok(FireExpr::Every(dur));
    }
    let cron_expr = match expr {
        "@hourly" => "0 0 * * * *".to_string(),
        "@daily" => "0 0 0 * * *".to_string(),
        other => match other.split_whitespace().count() {
            5 => format!("0 {other}"),
            6 => other.to_string(),
            n => return Err(CoreError::invalid(format!("cron expression must have 5 or 6 fields, got {n}: {other}"))),
        },
    };
    CronSchedule::from_str(&cron_expr).map(FireExpr::Cron).map_err(|e| CoreError::invalid(format!("invalid cron expression: {e}")))
}

fn next_fire_after(fire_expr: &FireExpr, after_ms: u64) -> Option<u64> {
    match fire_expr {
        FireExpr::Every(d) => Some(after_ms + d.as_millis() as u64),
        FireExpr::Cron(schedule) => {
            let after: DateTime<Utc> = DateTime::from_timestamp_millis(after_ms as i64)?;
            schedule.after(&after).next().map(|dt| dt.timestamp_millis() as u64)
        }
    }
}

/// Cron-driven trigger source, holding one registered background loop per
/// enabled schedule.
pub struct Scheduler<C: Clock> {
    store: Arc<Store>,
    clock: C,
    providers: HashMap<Provider, Arc<dyn RepoProvider>>,
    orchestrator: Arc<Orchestrator<C>>,
    config: SchedulerConfig,
    registrations: Mutex<HashMap<String, CancellationToken>>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(store: Arc<Store>, clock: C, providers: Vec<Arc<dyn RepoProvider>>, orchestrator: Arc<Orchestrator<C>>, config: SchedulerConfig) -> Self {
        let providers = providers.into_iter().map(|p| (p.name(), p)).collect();
        Self { store, clock, providers, orchestrator, config, registrations: Mutex::new(HashMap::new()) }
    }

    /// Loads every persisted schedule and registers the enabled ones,
    /// skipping (with a log warning, not an error) any with now-invalid
    /// expressions.
    pub fn load_and_register_all(self: &Arc<Self>) -> CoreResult<()> {
        for schedule in self.store.list_schedules()? {
            if !schedule.enabled {
                continue;
            }
            if let Err(e) = self.register(schedule.clone()) {
                tracing::warn!(schedule_id = %schedule.id, error = %e, "skipping schedule with invalid expression at load time");
            }
        }
        Ok(())
    }

    /// Validates the expression and scope, persists with fresh timestamps,
    /// and registers a background loop if `enabled`.
    pub fn add(self: &Arc<Self>, expr: String, scope: ScopeJson, enabled: bool) -> CoreResult<Schedule> {
        parse_expr(&expr)?;
        validate_scope(&scope)?;
        let now = self.clock.epoch_ms();
        let schedule = Schedule { id: ScheduleId::new(), expr, scope, enabled, last_run_at_ms: None, created_at_ms: now, updated_at_ms: now };
        self.store.upsert_schedule(schedule.clone())?;
        if enabled {
            self.register(schedule.clone())?;
        }
        Ok(schedule)
    }

    /// Loads the existing row for `created_at` preservation, validates,
    /// persists, unregisters any prior loop, then re-registers if enabled.
    pub fn update(self: &Arc<Self>, id: &str, expr: String, scope: ScopeJson, enabled: bool) -> CoreResult<Schedule> {
        parse_expr(&expr)?;
        validate_scope(&scope)?;
        let existing = self.store.get_schedule(id)?;
        let schedule = Schedule {
            id: existing.id,
            expr,
            scope,
            enabled,
            last_run_at_ms: existing.last_run_at_ms,
            created_at_ms: existing.created_at_ms,
            updated_at_ms: self.clock.epoch_ms(),
        };
        self.unregister(id);
        self.store.upsert_schedule(schedule.clone())?;
        if enabled {
            self.register(schedule.clone())?;
        }
        Ok(schedule)
    }

    pub fn delete(&self, id: &str) -> CoreResult<()> {
        self.unregister(id);
        self.store.delete_schedule(id)
    }

    /// Runs the same fire path as the cron entry, then records
    /// `last_run_at`.
    pub async fn trigger_now(&self, id: &str) -> CoreResult<()> {
        let schedule = self.store.get_schedule(id)?;
        self.fire(&schedule).await
    }

    fn register(self: &Arc<Self>, schedule: Schedule) -> CoreResult<()> {
        let fire_expr = parse_expr(&schedule.expr)?;
        let cancel = CancellationToken::new();
        self.registrations.lock().insert(schedule.id.to_string(), cancel.clone());

        let this = Arc::clone(self);
        let id = schedule.id.to_string();
        tokio::spawn(async move {
            let mut expr = fire_expr;
            loop {
                let now = this.clock.epoch_ms();
                let Some(next_ms) = next_fire_after(&expr, now) else {
                    tracing::warn!(schedule_id = %id, "cron expression has no further occurrences; unregistering");
                    break;
                };
                let delay = Duration::from_millis(next_ms.saturating_sub(now));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                let Ok(schedule) = this.store.get_schedule(&id) else { break };
                if !schedule.enabled {
                    break;
                }
                if let Err(e) = this.fire(&schedule).await {
                    tracing::error!(schedule_id = %id, error = %e, "scheduled fire failed");
                }
                // Re-derive the expression in case `update` changed it
                // without going through this loop's cancellation (it
                // always unregisters first, but a future scheduler variant
                // might not; re-parsing keeps this loop self-consistent).
                expr = match parse_expr(&schedule.expr) {
                    Ok(e) => e,
                    Err(_) => break,
                };
            }
        });
        Ok(())
    }

    fn unregister(&self, id: &str) {
        if let Some(cancel) = self.registrations.lock().remove(id) {
            cancel.cancel();
        }
    }

    async fn fire(&self, schedule: &Schedule) -> CoreResult<()> {
        let entries = self.resolve_scope(&schedule.scope).await?;
        let req = TriggerRequest { scoped: schedule.scope.is_scoped(), selected_repos: entries, mode: schedule.scope.mode, ..Default::default() };
        self.orchestrator.trigger_with_request(req)?;

        let mut updated = schedule.clone();
        updated.last_run_at_ms = Some(self.clock.epoch_ms());
        self.store.upsert_schedule(updated)?;
        Ok(())
    }

    /// Step 1/2 of spec.md §4.F's fire resolution. Returns an empty list
    /// (not an error) when the scope names neither explicit repos nor
    /// selectors, signaling the orchestrator's own default discovery
    /// should run instead.
    async fn resolve_scope(&self, scope: &ScopeJson) -> CoreResult<Vec<RepoQueueEntry>> {
        if scope.is_explicit_only() {
            return self.resolve_explicit(&scope.explicit_repos).await;
        }
        if !scope.has_selectors() {
            return Ok(Vec::new());
        }

        let mut by_key: HashMap<String, Repo> = HashMap::new();
        for selector in &scope.owner_selectors {
            self.collect_matching(selector.provider, &selector.host, |r| r.owner.eq_ignore_ascii_case(&selector.owner), &mut by_key).await?;
        }
        for selector in &scope.owner_prefix_selectors {
            let prefix = selector.owner_prefix.to_ascii_lowercase();
            self.collect_matching(selector.provider, &selector.host, |r| r.owner.to_ascii_lowercase().starts_with(&prefix), &mut by_key).await?;
        }
        for entry in self.resolve_explicit(&scope.explicit_repos).await? {
            by_key.entry(entry.key.dedup_key()).or_insert_with(|| Repo {
                provider: entry.key.provider,
                host: entry.key.host.clone(),
                owner: entry.key.owner.clone(),
                name: entry.key.name.clone(),
                full_name: format!("{}/{}", entry.key.owner, entry.key.name),
                private: false,
                language: None,
                stars: 0,
                html_url: String::new(),
                clone_url: entry.clone_url,
                default_branch: entry.default_branch,
            });
        }

        let now = self.clock.epoch_ms();
        Ok(by_key.into_values().map(|r| RepoQueueEntry::new(RepoKey::from(&r), r.clone_url, r.default_branch, now)).collect())
    }

    async fn collect_matching(
        &self,
        provider: Provider,
        host: &str,
        matches: impl Fn(&Repo) -> bool,
        out: &mut HashMap<String, Repo>,
    ) -> CoreResult<()> {
        let Some(client) = self.providers.get(&provider) else {
            tracing::warn!(%provider, "no registered RepoProvider for this selector's provider; skipping");
            return Ok(());
        };
        let mut page = 1;
        loop {
            if page > self.config.max_discovery_pages {
                break;
            }
            let opts = ListReposOptions { page, visibility: Visibility::All, ..Default::default() };
            let repos = client.list_repos(&opts).await.map_err(|e| CoreError::external(e.to_string()))?;
            if repos.is_empty() {
                break;
            }
            for repo in repos.iter().filter(|r| r.host.eq_ignore_ascii_case(host) && matches(r)) {
                out.insert(RepoKey::from(repo).dedup_key(), repo.clone());
            }
            page += 1;
        }
        Ok(())
    }

    async fn resolve_explicit(&self, explicit_repos: &[String]) -> CoreResult<Vec<RepoQueueEntry>> {
        let now = self.clock.epoch_ms();
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for spec in explicit_repos {
            let Some((owner, name)) = spec.split_once('/') else {
                tracing::warn!(spec, "explicit repo entry must be \"owner/name\"; skipping");
                continue;
            };
            let mut resolved = None;
            for provider in self.providers.values() {
                if let Ok(repo) = provider.get_repo(owner, name).await {
                    resolved = Some(repo);
                    break;
                }
            }
            let Some(repo) = resolved else {
                tracing::warn!(spec, "explicit repo could not be resolved by any registered provider; skipping");
                continue;
            };
            let key = RepoKey::from(&repo).dedup_key();
            if seen.insert(key) {
                entries.push(RepoQueueEntry::new(RepoKey::from(&repo), repo.clone_url, repo.default_branch, now));
            }
        }
        Ok(entries)
    }
}

fn validate_scope(scope: &ScopeJson) -> CoreResult<()> {
    for selector in &scope.owner_selectors {
        if selector.owner.is_empty() {
            return Err(CoreError::invalid("owner selector must not have an empty owner"));
        }
    }
    for selector in &scope.owner_prefix_selectors {
        if selector.owner_prefix.is_empty() {
            return Err(CoreError::invalid("owner prefix selector must not have an empty prefix"));
        }
    }
    Ok(())
}
