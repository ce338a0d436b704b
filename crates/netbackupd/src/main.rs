//! NetBackup Orchestrator daemon.
//!
//! Composition root: loads configuration, connects to the database,
//! reconciles any job left `running` by a prior crash (invariant 5), starts
//! the recurring Scheduler, then loops reconciling it against the schedule
//! table so schedules added/edited/removed through the CLI (a separate
//! process) get registered or deregistered here without a restart.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use netbackup_core::{Config, CredentialKey, Engine, EngineConfig, GiteaClient, GlobalCredentials, ProgressBus};
use netbackup_scheduler::Scheduler;
use netbackup_state::SurrealHandle;

/// How often to re-read the schedule table for out-of-process changes.
const SCHEDULE_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    netbackup_core::init_tracing(false, config.log_level);
    info!("netbackupd starting");

    let db = Arc::new(
        SurrealHandle::connect(&config.database_url)
            .await
            .context("failed to connect to the database")?,
    );

    let reconciled = db
        .reconcile_orphan_jobs()
        .await
        .context("failed to reconcile orphaned jobs at startup")?;
    if reconciled > 0 {
        info!(count = reconciled, "reconciled orphaned jobs from a prior crash");
    }

    let gitea = Arc::new(GiteaClient::new(
        config.gitea_url.clone(),
        config.gitea_token.clone(),
        config.gitea_org.clone(),
    ));
    let bus = Arc::new(ProgressBus::new());
    let engine = Arc::new(Engine::new(
        Arc::clone(&db),
        gitea,
        bus,
        EngineConfig {
            cli_workers: config.nornir_num_workers,
            api_concurrency: config.api_semaphore_limit,
        },
    ));
    let key = Arc::new(
        CredentialKey::from_config_value(&config.fernet_key)
            .context("failed to parse fernet_key")?,
    );
    let global = GlobalCredentials {
        username: config.net_user_global.clone(),
        password: config.net_pass_global.clone(),
    };

    let mut scheduler = Scheduler::new(Arc::clone(&db), engine, key, global)
        .await
        .context("failed to initialize scheduler")?;
    scheduler
        .start()
        .await
        .context("failed to start scheduler")?;
    info!("scheduler started, netbackupd is idle");

    let mut ticker = tokio::time::interval(SCHEDULE_RECONCILE_INTERVAL);
    ticker.tick().await; // first tick fires immediately; start() already reconciled once
    loop {
        ticker.tick().await;
        if let Err(e) = scheduler.reconcile().await {
            warn!(error = %e, "schedule reconciliation pass failed");
        }
    }
}
