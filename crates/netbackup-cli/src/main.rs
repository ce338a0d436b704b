//! NetBackup Orchestrator operator CLI.
//!
//! ## Commands
//!
//! - `backup`: trigger an ad-hoc backup run, optionally restricted to a site
//!   or a set of devices
//! - `job status` / `job list`: inspect `BackupJob` rows
//! - `results`: list `BackupResult` rows for a job
//! - `diff`: render the last Gitea commit's diff for a device's config
//! - `schedule add` / `schedule list` / `schedule remove`: manage recurring
//!   triggers

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use netbackup_core::{
    BackupJob, Config, CredentialKey, Engine, EngineConfig, GiteaClient, GlobalCredentials,
    ProgressBus,
};
use netbackup_state::SurrealHandle;

#[derive(Parser)]
#[command(name = "netbackup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the NetBackup Orchestrator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger an ad-hoc backup run
    Backup {
        /// Restrict to devices at this site code
        #[arg(long)]
        site: Option<String>,

        /// Restrict to specific device IDs (repeatable)
        #[arg(long = "device")]
        devices: Vec<String>,
    },

    /// Inspect backup jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// List device results for a job
    Results {
        /// Job ID
        job_id: String,
    },

    /// Render the diff between a device's last two backed-up configs
    Diff {
        /// Site code the device belongs to
        #[arg(long)]
        site: String,

        /// Device hostname
        #[arg(long)]
        hostname: String,
    },

    /// Manage recurring backup schedules
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Show one job's current status and counters
    Status {
        job_id: String,
    },
    /// List every job, most recent first
    List,
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Create a new recurring schedule
    Add {
        /// Human-readable schedule name, must be unique
        #[arg(long)]
        name: String,

        /// hourly | daily | weekly
        #[arg(long)]
        frequency: String,

        /// Hour of day, 0-23 UTC (ignored for hourly)
        #[arg(long, default_value_t = 0)]
        hour: u8,

        /// Day of week, 0=Monday..6=Sunday (only used for weekly)
        #[arg(long = "day-of-week", default_value_t = 0)]
        day_of_week: u8,

        /// Restrict to one site's devices; omit for all sites
        #[arg(long)]
        site: Option<String>,
    },
    /// List every schedule
    List,
    /// Delete a schedule and stop its future triggers
    Remove {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    netbackup_core::init_tracing(cli.json, level);

    let config = Config::from_env().context("failed to load configuration")?;
    let db = Arc::new(
        SurrealHandle::connect(&config.database_url)
            .await
            .context("failed to connect to the database")?,
    );

    match cli.command {
        Commands::Backup { site, devices } => cmd_backup(&db, &config, site, devices).await,
        Commands::Job { action } => match action {
            JobAction::Status { job_id } => cmd_job_status(&db, &job_id).await,
            JobAction::List => cmd_job_list(&db).await,
        },
        Commands::Results { job_id } => cmd_results(&db, &job_id).await,
        Commands::Diff { site, hostname } => cmd_diff(&db, &config, &site, &hostname).await,
        Commands::Schedule { action } => match action {
            ScheduleAction::Add {
                name,
                frequency,
                hour,
                day_of_week,
                site,
            } => cmd_schedule_add(&db, name, frequency, hour, day_of_week, site).await,
            ScheduleAction::List => cmd_schedule_list(&db).await,
            ScheduleAction::Remove { id } => cmd_schedule_remove(&db, &id).await,
        },
    }
}

async fn cmd_backup(
    db: &Arc<SurrealHandle>,
    config: &Config,
    site: Option<String>,
    devices: Vec<String>,
) -> Result<()> {
    let site_id = match &site {
        Some(code) => Some(
            db.get_site_by_code(code)
                .await?
                .with_context(|| format!("no site with code {code}"))?
                .id,
        ),
        None => None,
    };

    let device_ids = if !devices.is_empty() {
        devices
    } else {
        db.list_enabled_device_ids(site_id.as_deref()).await?
    };
    if device_ids.is_empty() {
        println!("No enabled devices matched; nothing to back up.");
        return Ok(());
    }

    let job = BackupJob::new("manual", device_ids.len() as u32);
    db.create_job(job.to_record()).await?;
    info!(job_id = %job.id, devices = device_ids.len(), "triggering backup");

    let gitea = Arc::new(GiteaClient::new(
        config.gitea_url.clone(),
        config.gitea_token.clone(),
        config.gitea_org.clone(),
    ));
    let bus = Arc::new(ProgressBus::new());
    let engine = Engine::new(
        Arc::clone(db),
        gitea,
        bus,
        EngineConfig {
            cli_workers: config.nornir_num_workers,
            api_concurrency: config.api_semaphore_limit,
        },
    );
    let key = CredentialKey::from_config_value(&config.fernet_key)?;
    let global = GlobalCredentials {
        username: config.net_user_global.clone(),
        password: config.net_pass_global.clone(),
    };

    engine
        .run(&job.id, Some(device_ids), &key, &global)
        .await?;

    let final_job = db
        .get_job(&job.id)
        .await?
        .context("job disappeared after running")?;
    println!(
        "job {} finished: status={} completed={} failed={} total={}",
        final_job.id,
        final_job.status,
        final_job.completed_devices,
        final_job.failed_devices,
        final_job.total_devices
    );
    Ok(())
}

async fn cmd_job_status(db: &SurrealHandle, job_id: &str) -> Result<()> {
    let job = db
        .get_job(job_id)
        .await?
        .with_context(|| format!("no job with id {job_id}"))?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

async fn cmd_job_list(db: &SurrealHandle) -> Result<()> {
    let jobs = db.list_jobs().await?;
    for job in jobs {
        println!(
            "{}  {:<10} {}/{} completed ({} failed)  triggered_by={}",
            job.id, job.status, job.completed_devices, job.total_devices, job.failed_devices, job.triggered_by
        );
    }
    Ok(())
}

async fn cmd_results(db: &SurrealHandle, job_id: &str) -> Result<()> {
    let results = db.list_results_for_job(job_id).await?;
    for result in results {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

async fn cmd_diff(db: &SurrealHandle, config: &Config, site: &str, hostname: &str) -> Result<()> {
    let site_row = db
        .get_site_by_code(site)
        .await?
        .with_context(|| format!("no site with code {site}"))?;
    let gitea = GiteaClient::new(
        config.gitea_url.clone(),
        config.gitea_token.clone(),
        config.gitea_org.clone(),
    );
    let repo = format!("{}/{}", config.gitea_org, site_row.gitea_repo_name);
    let diff = gitea.get_diff(&repo, hostname).await?;
    println!("{diff}");
    Ok(())
}

async fn cmd_schedule_add(
    db: &SurrealHandle,
    name: String,
    frequency: String,
    hour: u8,
    day_of_week: u8,
    site: Option<String>,
) -> Result<()> {
    let frequency = frequency
        .parse::<netbackup_core::ScheduleFrequency>()
        .map_err(anyhow::Error::msg)?;
    let site_id = match &site {
        Some(code) => Some(
            db.get_site_by_code(code)
                .await?
                .with_context(|| format!("no site with code {code}"))?
                .id,
        ),
        None => None,
    };

    let schedule = netbackup_core::BackupSchedule::new(name, frequency, hour, day_of_week, site_id);
    db.create_schedule(schedule.to_record()).await?;
    println!(
        "created schedule {} ({}); netbackupd will register its trigger on its next reconcile pass",
        schedule.id, schedule.name
    );
    Ok(())
}

async fn cmd_schedule_list(db: &SurrealHandle) -> Result<()> {
    let schedules = db.list_enabled_schedules().await?;
    for record in schedules {
        let schedule: netbackup_core::BackupSchedule = record.into();
        let cron = netbackup_scheduler::build_cron_expression(&schedule);
        println!(
            "{}  {:<20} {:<8} cron=\"{}\" site={}",
            schedule.id,
            schedule.name,
            schedule.frequency.as_str(),
            cron,
            schedule.site_id.as_deref().unwrap_or("*")
        );
    }
    Ok(())
}

async fn cmd_schedule_remove(db: &SurrealHandle, id: &str) -> Result<()> {
    db.delete_schedule(id).await?;
    println!(
        "removed schedule {id}; netbackupd will deregister its trigger on its next reconcile pass"
    );
    Ok(())
}
