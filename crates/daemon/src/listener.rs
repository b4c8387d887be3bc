// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix socket listener: accepts connections and dispatches each framed
//! [`Request`] to the store/orchestrator/scheduler/remediation engine,
//! mirroring spec.md §6's "exposed to the HTTP layer" operation surface.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ctrlscan_adapters::RepoProvider;
use ctrlscan_core::clock::{Clock, SystemClock};
use ctrlscan_core::queue::RepoQueueEntry;
use ctrlscan_core::repo::RepoKey;
use ctrlscan_engine::{Orchestrator, RemediationEngine, Scheduler, TriggerRequest};
use ctrlscan_storage::Store;
use ctrlscan_wire::{self as wire, ProtocolError, Request, Response, WorkerStatusWire};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub struct ListenCtx {
    pub store: Arc<Store>,
    pub orchestrator: Arc<Orchestrator<SystemClock>>,
    pub scheduler: Arc<Scheduler<SystemClock>>,
    pub remediation: Arc<RemediationEngine<SystemClock>>,
    pub repo_provider: Arc<dyn RepoProvider>,
    pub clock: SystemClock,
    pub start_time: Instant,
    pub ipc_timeout: Duration,
}

pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
    shutdown: CancellationToken,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>, shutdown: CancellationToken) -> Self {
        Self { unix, ctx, shutdown }
    }

    pub async fn run(self) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("listener shutting down");
                    return;
                }
                accepted = self.unix.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let ctx = Arc::clone(&self.ctx);
                            tokio::spawn(async move {
                                let (mut reader, mut writer) = stream.into_split();
                                if let Err(e) = handle_connection(&mut reader, &mut writer, &ctx).await {
                                    log_connection_error(e);
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "unix accept error"),
                    }
                }
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => warn!("connection timed out"),
        other => error!(error = %other, "connection error"),
    }
}

async fn handle_connection<R, W>(reader: &mut R, writer: &mut W, ctx: &ListenCtx) -> Result<(), ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let request = wire::read_request(reader, ctx.ipc_timeout).await?;
    let response = dispatch(ctx, request).await;
    wire::write_response(writer, &response, ctx.ipc_timeout).await
}

async fn resolve_selected_repos(ctx: &ListenCtx, selected: &[String]) -> Vec<RepoQueueEntry> {
    let mut out = Vec::new();
    for spec in selected {
        let Some((owner, name)) = spec.split_once('/') else {
            warn!(spec, "skipping malformed repo selector, expected owner/name");
            continue;
        };
        match ctx.repo_provider.get_repo(owner, name).await {
            Ok(repo) => out.push(RepoQueueEntry::new(RepoKey::from(&repo), repo.clone_url.clone(), repo.default_branch.clone(), ctx.clock.epoch_ms())),
            Err(e) => warn!(owner, name, error = %e, "could not resolve selected repo; skipping"),
        }
    }
    out
}

async fn dispatch(ctx: &ListenCtx, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Status => {
            let workers = ctx
                .orchestrator
                .worker_statuses()
                .into_iter()
                .map(|w| WorkerStatusWire { name: w.name, repo: w.repo, status: w.status, since_ms: w.since_ms })
                .collect();
            Response::Status {
                uptime_secs: ctx.start_time.elapsed().as_secs(),
                health: ctx.orchestrator.health(),
                sweep_in_flight: ctx.orchestrator.is_sweep_in_flight(),
                workers,
            }
        }

        Request::Trigger { selected_repos, worker_count, mode, force } => {
            let scoped = !selected_repos.is_empty();
            let selected = resolve_selected_repos(ctx, &selected_repos).await;
            let req = TriggerRequest { worker_count, scoped, selected_repos: selected, force, mode, profile: None };
            match ctx.orchestrator.trigger_with_request(req) {
                Ok(()) => Response::Ok,
                Err(e) => err_response(e),
            }
        }

        Request::StopSweep => match ctx.orchestrator.stop_current_sweep() {
            Ok(_) => Response::Ok,
            Err(e) => err_response(e),
        },

        Request::Pause => {
            ctx.orchestrator.pause();
            Response::Ok
        }

        Request::Resume => {
            ctx.orchestrator.resume();
            Response::Ok
        }

        Request::ListScanJobs { limit } => match ctx.store.recent_scan_jobs(limit) {
            Ok(jobs) => Response::ScanJobs { jobs },
            Err(e) => err_response(e),
        },

        Request::GetScanJob { id } => match ctx.store.get_scan_job(&id) {
            Ok(job) => Response::ScanJob { job: Box::new(job) },
            Err(e) => err_response(e),
        },

        Request::DeleteScanJob { id } => match ctx.store.delete_scan_job(&id) {
            Ok(()) => Response::Ok,
            Err(e) => err_response(e),
        },

        Request::ListFindings { scan_job_id } => match ctx.store.findings_for_scan_job(&scan_job_id) {
            Ok(findings) => Response::Findings { findings },
            Err(e) => err_response(e),
        },

        Request::ListFixQueue => match ctx.store.list_fix_queue() {
            Ok(entries) => Response::FixQueue { entries },
            Err(e) => err_response(e),
        },

        Request::ApproveFix { id } => match ctx.remediation.approve_fix(&id) {
            Ok(entry) => Response::FixQueueEntry { entry: Box::new(entry) },
            Err(e) => err_response(e),
        },

        Request::RejectFix { id } => match ctx.remediation.reject_fix(&id) {
            Ok(entry) => Response::FixQueueEntry { entry: Box::new(entry) },
            Err(e) => err_response(e),
        },

        Request::ListSchedules => match ctx.store.list_schedules() {
            Ok(schedules) => Response::Schedules { schedules },
            Err(e) => err_response(e),
        },

        Request::GetSchedule { id } => match ctx.store.get_schedule(&id) {
            Ok(schedule) => Response::Schedule { schedule: Box::new(schedule) },
            Err(e) => err_response(e),
        },

        Request::CreateSchedule { expr, scope, enabled } => match ctx.scheduler.add(expr, scope, enabled) {
            Ok(schedule) => Response::Schedule { schedule: Box::new(schedule) },
            Err(e) => err_response(e),
        },

        Request::UpdateSchedule { id, expr, scope, enabled } => match ctx.scheduler.update(&id, expr, scope, enabled) {
            Ok(schedule) => Response::Schedule { schedule: Box::new(schedule) },
            Err(e) => err_response(e),
        },

        Request::DeleteSchedule { id } => match ctx.scheduler.delete(&id) {
            Ok(()) => Response::Ok,
            Err(e) => err_response(e),
        },

        Request::TriggerSchedule { id } => match ctx.scheduler.trigger_now(&id).await {
            Ok(()) => Response::Ok,
            Err(e) => err_response(e),
        },

        Request::ListCampaigns => match ctx.store.list_campaigns() {
            Ok(campaigns) => Response::Campaigns { campaigns },
            Err(e) => err_response(e),
        },

        Request::GetCampaign { id } => match ctx.store.get_campaign(&id) {
            Ok(campaign) => Response::Campaign { campaign: Box::new(campaign) },
            Err(e) => err_response(e),
        },

        Request::CreateCampaign { name, mode, auto_pr, filters, force } => match ctx.remediation.create_campaign(name, mode, auto_pr, filters, force) {
            Ok(campaign) => Response::Campaign { campaign: Box::new(campaign) },
            Err(e) => err_response(e),
        },

        Request::MaterializeCampaign { id } => match ctx.remediation.materialize_tasks(&id).await {
            Ok(counters) => Response::TaskCounters { counters },
            Err(e) => err_response(e),
        },

        Request::StartCampaign { id } => match ctx.remediation.start_campaign(&id) {
            Ok(()) => Response::Ok,
            Err(e) => err_response(e),
        },

        Request::StopCampaign { id } => match ctx.remediation.stop_campaign(&id) {
            Ok(counters) => Response::TaskCounters { counters },
            Err(e) => err_response(e),
        },

        Request::StopTask { scan_job_id } => {
            ctx.remediation.stop_task(&scan_job_id);
            Response::Ok
        }
    }
}

fn err_response(e: ctrlscan_core::CoreError) -> Response {
    Response::Error { message: e.to_string() }
}
