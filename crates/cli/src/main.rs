// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ctrlscan`: CLI front-end for `ctrlscand`, the scan orchestration daemon.

mod client;
mod output;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use ctrlscan_core::campaign::CampaignFilters;
use ctrlscan_core::schedule::ScopeJson;
use ctrlscan_wire::Request;

use client::DaemonClient;
use output::{print_value, OutputFormat};

#[derive(Parser)]
#[command(name = "ctrlscan", version, about = "Control plane for scheduled security sweeps")]
struct Cli {
    #[arg(long, value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Health check against the daemon
    Ping,
    /// Daemon uptime, health, and worker activity
    Status,
    /// Trigger a sweep
    Trigger {
        /// "owner/name" repos to scan; omit to let the daemon discover the pool
        #[arg(long = "repo")]
        repos: Vec<String>,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Cancel the in-flight sweep
    Stop,
    /// Pause the orchestrator after the current repo in each worker finishes
    Pause,
    /// Resume a paused orchestrator
    Resume,
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// List findings for a scan job
    Findings { scan_job_id: String },
    #[command(subcommand)]
    Fixes(FixesCommand),
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    #[command(subcommand)]
    Campaign(CampaignCommand),
    /// Cancel one in-flight remediation task
    StopTask { scan_job_id: String },
}

#[derive(Subcommand)]
enum JobsCommand {
    /// Most recent scan jobs, newest first
    List {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    Get { id: String },
    Rm { id: String },
}

#[derive(Subcommand)]
enum FixesCommand {
    List,
    Approve { id: String },
    Reject { id: String },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    List,
    Get { id: String },
    /// Create a schedule. `expr` is a cron expression or `@every <duration>`.
    Create {
        expr: String,
        #[arg(long, default_value_t = true)]
        enabled: bool,
    },
    Update {
        id: String,
        expr: String,
        #[arg(long)]
        enabled: bool,
    },
    Rm { id: String },
    /// Fire a schedule immediately, bypassing its cron expression
    Fire { id: String },
}

#[derive(Subcommand)]
enum CampaignCommand {
    List,
    Get { id: String },
    Create {
        name: String,
        /// Scan mode used for every task: triage, semi, or auto
        #[arg(long, default_value = "auto")]
        mode: String,
        #[arg(long)]
        auto_pr: bool,
        #[arg(long)]
        force: bool,
    },
    /// Scan the candidate pool and insert remediation tasks
    Materialize { id: String },
    /// Spawn workers to claim and execute pending tasks
    Start { id: String },
    Stop { id: String },
}

fn parse_scan_mode(s: &str) -> Result<ctrlscan_core::scan_job::ScanMode> {
    use ctrlscan_core::scan_job::ScanMode;
    match s.to_ascii_lowercase().as_str() {
        "triage" => Ok(ScanMode::Triage),
        "semi" => Ok(ScanMode::Semi),
        "auto" => Ok(ScanMode::Auto),
        other => Err(anyhow!("unknown scan mode '{other}', expected triage, semi, or auto")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.format;
    let mut client = DaemonClient::connect().await?;

    match cli.command {
        Command::Ping => {
            client.send(&Request::Ping).await?;
            println!("pong");
        }
        Command::Status => {
            let response = client.send(&Request::Status).await?;
            print_value(format, &response)?;
        }
        Command::Trigger { repos, workers, mode, force } => {
            let mode = mode.map(|m| parse_scan_mode(&m)).transpose()?;
            let response = client.send(&Request::Trigger { selected_repos: repos, worker_count: workers, mode, force }).await?;
            print_value(format, &response)?;
        }
        Command::Stop => {
            client.send(&Request::StopSweep).await?;
            println!("sweep stopped");
        }
        Command::Pause => {
            client.send(&Request::Pause).await?;
            println!("paused");
        }
        Command::Resume => {
            client.send(&Request::Resume).await?;
            println!("resumed");
        }
        Command::Jobs(JobsCommand::List { limit }) => {
            let response = client.send(&Request::ListScanJobs { limit }).await?;
            print_value(format, &response)?;
        }
        Command::Jobs(JobsCommand::Get { id }) => {
            let response = client.send(&Request::GetScanJob { id }).await?;
            print_value(format, &response)?;
        }
        Command::Jobs(JobsCommand::Rm { id }) => {
            client.send(&Request::DeleteScanJob { id }).await?;
            println!("deleted");
        }
        Command::Findings { scan_job_id } => {
            let response = client.send(&Request::ListFindings { scan_job_id }).await?;
            print_value(format, &response)?;
        }
        Command::Fixes(FixesCommand::List) => {
            let response = client.send(&Request::ListFixQueue).await?;
            print_value(format, &response)?;
        }
        Command::Fixes(FixesCommand::Approve { id }) => {
            let response = client.send(&Request::ApproveFix { id }).await?;
            print_value(format, &response)?;
        }
        Command::Fixes(FixesCommand::Reject { id }) => {
            let response = client.send(&Request::RejectFix { id }).await?;
            print_value(format, &response)?;
        }
        Command::Schedule(ScheduleCommand::List) => {
            let response = client.send(&Request::ListSchedules).await?;
            print_value(format, &response)?;
        }
        Command::Schedule(ScheduleCommand::Get { id }) => {
            let response = client.send(&Request::GetSchedule { id }).await?;
            print_value(format, &response)?;
        }
        Command::Schedule(ScheduleCommand::Create { expr, enabled }) => {
            let response = client.send(&Request::CreateSchedule { expr, scope: ScopeJson::default(), enabled }).await?;
            print_value(format, &response)?;
        }
        Command::Schedule(ScheduleCommand::Update { id, expr, enabled }) => {
            let response = client.send(&Request::UpdateSchedule { id, expr, scope: ScopeJson::default(), enabled }).await?;
            print_value(format, &response)?;
        }
        Command::Schedule(ScheduleCommand::Rm { id }) => {
            client.send(&Request::DeleteSchedule { id }).await?;
            println!("deleted");
        }
        Command::Schedule(ScheduleCommand::Fire { id }) => {
            client.send(&Request::TriggerSchedule { id }).await?;
            println!("fired");
        }
        Command::Campaign(CampaignCommand::List) => {
            let response = client.send(&Request::ListCampaigns).await?;
            print_value(format, &response)?;
        }
        Command::Campaign(CampaignCommand::Get { id }) => {
            let response = client.send(&Request::GetCampaign { id }).await?;
            print_value(format, &response)?;
        }
        Command::Campaign(CampaignCommand::Create { name, mode, auto_pr, force }) => {
            let mode = parse_scan_mode(&mode)?;
            let response = client.send(&Request::CreateCampaign { name, mode, auto_pr, filters: CampaignFilters::default(), force }).await?;
            print_value(format, &response)?;
        }
        Command::Campaign(CampaignCommand::Materialize { id }) => {
            let response = client.send(&Request::MaterializeCampaign { id }).await?;
            print_value(format, &response)?;
        }
        Command::Campaign(CampaignCommand::Start { id }) => {
            client.send(&Request::StartCampaign { id }).await?;
            println!("started");
        }
        Command::Campaign(CampaignCommand::Stop { id }) => {
            let response = client.send(&Request::StopCampaign { id }).await?;
            print_value(format, &response)?;
        }
        Command::StopTask { scan_job_id } => {
            client.send(&Request::StopTask { scan_job_id }).await?;
            println!("stopped");
        }
    }

    Ok(())
}
