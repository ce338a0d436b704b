//! Recurring Scheduler (§4.I).
//!
//! Wraps a `tokio-cron-scheduler` [`JobScheduler`], registering one cron job
//! per enabled `BackupSchedule` row. Each fire reloads the schedule (so a
//! disable or delete racing with a pending fire is observed), creates a
//! fresh `BackupJob`, and hands off to the Engine.
//!
//! Schedule CRUD happens out of process, through the CLI's direct
//! `SurrealHandle` calls (spec.md: CRUD is externally managed). The only way
//! this long-lived daemon process learns of such a change is by asking the
//! database again, so [`Scheduler::reconcile`] re-reads every schedule row
//! and brings the live `JobScheduler` in line with it: newly enabled
//! schedules get registered, disabled or deleted ones get their cron job
//! removed. `netbackupd` calls it on an interval.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use netbackup_core::{BackupJob, CredentialKey, Engine, GlobalCredentials};
use netbackup_state::SurrealHandle;

use crate::cron::build_cron_expression;
use crate::error::{Result, SchedulerError};

/// Shared state each fired job needs; cheap to clone into a closure.
#[derive(Clone)]
struct FireContext {
    db: Arc<SurrealHandle>,
    engine: Arc<Engine>,
    key: Arc<CredentialKey>,
    global: GlobalCredentials,
}

pub struct Scheduler {
    job_scheduler: JobScheduler,
    ctx: FireContext,
    /// Schedule ID -> the cron job currently registered for it. The source
    /// of truth for "is this schedule live right now", checked against the
    /// database on each `reconcile` pass.
    active: HashMap<String, Uuid>,
}

impl Scheduler {
    pub async fn new(
        db: Arc<SurrealHandle>,
        engine: Arc<Engine>,
        key: Arc<CredentialKey>,
        global: GlobalCredentials,
    ) -> Result<Self> {
        let job_scheduler = JobScheduler::new().await?;
        Ok(Self {
            job_scheduler,
            ctx: FireContext {
                db,
                engine,
                key,
                global,
            },
            active: HashMap::new(),
        })
    }

    /// Start the underlying cron runtime and register every currently
    /// enabled schedule.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        self.job_scheduler.start().await?;
        self.reconcile().await
    }

    /// Re-read every schedule row and bring the live cron registrations in
    /// line with it: register schedules that are enabled but not yet
    /// tracked, and remove the cron job for any schedule that has been
    /// disabled or deleted since the last pass.
    #[instrument(skip(self))]
    pub async fn reconcile(&mut self) -> Result<()> {
        let schedules = self.ctx.db.list_schedules().await?;
        let mut seen = HashSet::with_capacity(schedules.len());

        for record in schedules {
            seen.insert(record.id.clone());
            let schedule: netbackup_core::BackupSchedule = record.into();
            let is_active = self.active.contains_key(&schedule.id);
            if schedule.enabled && !is_active {
                if let Err(e) = self.register(&schedule).await {
                    warn!(schedule = %schedule.name, error = %e, "failed to register schedule");
                }
            } else if !schedule.enabled && is_active {
                self.deregister(&schedule.id).await?;
            }
        }

        let deleted: Vec<String> = self
            .active
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in deleted {
            self.deregister(&id).await?;
        }
        Ok(())
    }

    async fn register(&mut self, schedule: &netbackup_core::BackupSchedule) -> Result<()> {
        let cron_expr = build_cron_expression(schedule);
        let ctx = self.ctx.clone();
        let schedule_id = schedule.id.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _scheduler| {
            let ctx = ctx.clone();
            let schedule_id = schedule_id.clone();
            Box::pin(async move {
                if let Err(e) = fire(&ctx, &schedule_id).await {
                    warn!(schedule_id = %schedule_id, error = %e, "scheduled backup trigger failed");
                }
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

        let job_uuid = self.job_scheduler.add(job).await?;
        self.ctx
            .db
            .set_schedule_scheduler_job_id(&schedule.id, Some(job_uuid.to_string()))
            .await?;
        self.active.insert(schedule.id.clone(), job_uuid);
        info!(schedule = %schedule.name, cron = %cron_expr, "registered schedule");
        Ok(())
    }

    async fn deregister(&mut self, schedule_id: &str) -> Result<()> {
        if let Some(job_uuid) = self.active.remove(schedule_id) {
            self.job_scheduler.remove(&job_uuid).await?;
            info!(%schedule_id, "deregistered schedule");
        }
        Ok(())
    }
}

/// The per-fire body: reload the schedule, skip if it's gone or disabled,
/// else create a job and run the Engine (spec §4.I).
async fn fire(ctx: &FireContext, schedule_id: &str) -> Result<()> {
    let Some(record) = ctx.db.get_schedule(schedule_id).await? else {
        return Ok(());
    };
    if !record.enabled {
        return Ok(());
    }
    let schedule: netbackup_core::BackupSchedule = record.into();

    let device_ids = ctx
        .db
        .list_enabled_device_ids(schedule.site_id.as_deref())
        .await?;
    if device_ids.is_empty() {
        return Ok(());
    }

    let job = BackupJob::new(format!("schedule:{}", schedule.name), device_ids.len() as u32);
    ctx.db.create_job(job.to_record()).await?;
    ctx.db.touch_schedule_last_run(&schedule.id).await?;

    ctx.engine
        .run(&job.id, Some(device_ids), &ctx.key, &ctx.global)
        .await?;
    Ok(())
}
