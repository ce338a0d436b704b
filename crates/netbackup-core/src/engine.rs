//! Backup Engine — the core of the core (§4.H).
//!
//! `Engine::run` materializes a device batch, fans it out across the CLI
//! thread-pool path and the API semaphore-bounded path, scrubs and commits
//! each success to Gitea, and streams progress. Per-device failures never
//! abort the job; only an orchestration-level error (the initial job load,
//! the snapshot query) flips the whole job to `failed`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, instrument, warn};

use netbackup_state::SurrealHandle;

use crate::api_worker::{run_api_backup, ApiBackupRequest};
use crate::cli_worker::{run_cli_backup, CliBackupRequest};
use crate::credential_resolver::GlobalCredentials;
use crate::crypto::CredentialKey;
use crate::domain::{truncated_message, BackupResult, DeviceSnapshot, JobStatus, NetBackupError};
use crate::gitea::GiteaClient;
use crate::progress::{ProgressBus, ProgressEvent};
use crate::scrubber::scrub;
use crate::snapshotter::snapshot_devices;

/// Tunables from spec §6 (`nornir_num_workers`, `api_semaphore_limit`).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub cli_workers: usize,
    pub api_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cli_workers: 50,
            api_concurrency: 30,
        }
    }
}

/// Shared counters a device completion bumps before publishing progress.
/// Updated only at the two serialization points named in spec §5: the CLI
/// coordinator loop, and each API task's own terminal write.
struct Counters {
    completed: AtomicU32,
    failed: AtomicU32,
    total: u32,
}

pub struct Engine {
    db: Arc<SurrealHandle>,
    gitea: Arc<GiteaClient>,
    bus: Arc<ProgressBus>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        db: Arc<SurrealHandle>,
        gitea: Arc<GiteaClient>,
        bus: Arc<ProgressBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            gitea,
            bus,
            config,
        }
    }

    /// Drive one job to completion. `device_ids` restricts the batch;
    /// `None` backs up every enabled device.
    #[instrument(skip(self, key, global), fields(job_id = %job_id))]
    pub async fn run(
        &self,
        job_id: &str,
        device_ids: Option<Vec<String>>,
        key: &CredentialKey,
        global: &GlobalCredentials,
    ) -> Result<(), NetBackupError> {
        let Some(job) = self.db.get_job(job_id).await? else {
            warn!(%job_id, "job not found, nothing to run");
            return Ok(());
        };

        self.db.mark_job_started(job_id).await?;

        let counters = Arc::new(Counters {
            completed: AtomicU32::new(0),
            failed: AtomicU32::new(0),
            total: job.total_devices.max(0) as u32,
        });

        let outcome = self
            .run_batch(job_id, device_ids, key, global, &counters)
            .await;

        let final_status = match &outcome {
            Ok(()) => JobStatus::Complete,
            Err(e) => {
                warn!(%job_id, error = %e, "orchestration error, marking job failed");
                JobStatus::Failed
            }
        };
        self.db.finalize_job(job_id, final_status.as_str()).await?;

        let terminal = ProgressEvent::terminal(
            job_id.to_string(),
            counters.completed.load(Ordering::SeqCst),
            counters.total,
            counters.failed.load(Ordering::SeqCst),
            final_status,
        );
        self.bus.publish(terminal);
        self.bus.reap_if_idle(job_id);

        outcome
    }

    async fn run_batch(
        &self,
        job_id: &str,
        device_ids: Option<Vec<String>>,
        key: &CredentialKey,
        global: &GlobalCredentials,
        counters: &Arc<Counters>,
    ) -> Result<(), NetBackupError> {
        let snapshots = snapshot_devices(&self.db, device_ids.as_deref(), key, global).await?;

        let mut cli = Vec::new();
        let mut api = Vec::new();
        for snapshot in snapshots {
            if snapshot.has_no_credentials() {
                let message = snapshot.credential_failure_message();
                self.record_failure(job_id, &snapshot, message, None, counters)
                    .await;
                continue;
            }
            if snapshot.is_api_device {
                api.push(snapshot);
            } else {
                cli.push(snapshot);
            }
        }

        let cli_fut = self.run_cli_batch(job_id, cli, counters);
        let api_fut = self.run_api_batch(job_id, api, counters);
        tokio::join!(cli_fut, api_fut);

        Ok(())
    }

    /// Bounded thread pool for blocking SSH sessions, drained by a single
    /// coordinator that serializes commit + DB writes (spec §4.H step 7).
    async fn run_cli_batch(&self, job_id: &str, devices: Vec<DeviceSnapshot>, counters: &Arc<Counters>) {
        if devices.is_empty() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(DeviceSnapshot, Instant, Result<crate::domain::RawBackup, NetBackupError>)>();
        let semaphore = Arc::new(Semaphore::new(self.config.cli_workers));

        let mut workers = Vec::with_capacity(devices.len());
        for snapshot in devices {
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            workers.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let started = Instant::now();
                let request = CliBackupRequest {
                    device_id: snapshot.device_id.clone(),
                    hostname: snapshot.hostname.clone(),
                    ip: snapshot.ip.clone(),
                    port: snapshot.port,
                    platform: snapshot.platform,
                    username: snapshot.username.clone().unwrap_or_default(),
                    password: snapshot.password.clone().unwrap_or_default(),
                };
                let outcome = tokio::task::spawn_blocking(move || run_cli_backup(&request))
                    .await
                    .unwrap_or_else(|e| {
                        Err(NetBackupError::Orchestration(format!(
                            "cli worker task panicked: {e}"
                        )))
                    });
                let _ = tx.send((snapshot, started, outcome));
            }));
        }
        drop(tx);

        let coordinator = async {
            while let Some((snapshot, started, outcome)) = rx.recv().await {
                self.complete_device(job_id, &snapshot, outcome, started.elapsed(), counters)
                    .await;
            }
        };

        let (_, ()) = tokio::join!(join_all(workers), coordinator);
    }

    /// Semaphore-bounded async fan-out; each permit wraps the full worker
    /// invocation plus its own serialized commit/record (spec §4.H step 8).
    async fn run_api_batch(&self, job_id: &str, devices: Vec<DeviceSnapshot>, counters: &Arc<Counters>) {
        if devices.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.api_concurrency));
        let mut tasks = Vec::with_capacity(devices.len());
        for snapshot in devices {
            let semaphore = Arc::clone(&semaphore);
            tasks.push(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let started = Instant::now();
                let request = ApiBackupRequest {
                    device_id: snapshot.device_id.clone(),
                    hostname: snapshot.hostname.clone(),
                    ip: snapshot.ip.clone(),
                    platform: snapshot.platform,
                    username: snapshot.username.clone().unwrap_or_default(),
                    password: snapshot.password.clone().unwrap_or_default(),
                };
                let outcome = run_api_backup(&request).await;
                self.complete_device(job_id, &snapshot, outcome, started.elapsed(), counters)
                    .await;
            });
        }
        futures::future::join_all(tasks).await;
    }

    /// Commit path (success) or failure path, followed by the counter bump
    /// and progress publish common to both (spec §4.H steps 10-11).
    async fn complete_device(
        &self,
        job_id: &str,
        snapshot: &DeviceSnapshot,
        outcome: Result<crate::domain::RawBackup, NetBackupError>,
        elapsed: std::time::Duration,
        counters: &Arc<Counters>,
    ) {
        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) => {
                self.record_failure(
                    job_id,
                    snapshot,
                    truncated_message(&e),
                    Some(elapsed.as_secs_f64()),
                    counters,
                )
                .await;
                return;
            }
        };

        let scrubbed = scrub(&raw.config_text, raw.platform);
        let config_hash = hex::encode(Sha256::digest(scrubbed.as_bytes()));

        let commit_result = async {
            let repo = self
                .gitea
                .ensure_repo(&snapshot.site_code, &snapshot.gitea_repo_name)
                .await?;
            let message = format!("Backup {}", raw.hostname);
            self.gitea
                .commit_config(&repo, &raw.hostname, &scrubbed, &message)
                .await
        }
        .await;

        match commit_result {
            Ok(commit_sha) => {
                let result = BackupResult::success(
                    job_id,
                    snapshot.device_id.clone(),
                    config_hash,
                    commit_sha,
                    elapsed.as_secs_f64(),
                );
                if let Err(e) = self.db.record_result(result.to_record(), false).await {
                    warn!(hostname = %raw.hostname, error = %e, "failed to persist successful result");
                }
                counters.completed.fetch_add(1, Ordering::SeqCst);
                info!(hostname = %raw.hostname, "device backed up");
                self.publish_running(job_id, counters);
            }
            Err(e) => {
                self.record_failure(
                    job_id,
                    snapshot,
                    truncated_message(&e),
                    Some(elapsed.as_secs_f64()),
                    counters,
                )
                .await;
            }
        }
    }

    async fn record_failure(
        &self,
        job_id: &str,
        snapshot: &DeviceSnapshot,
        error_message: String,
        duration_seconds: Option<f64>,
        counters: &Arc<Counters>,
    ) {
        let result = BackupResult::failed(
            job_id,
            snapshot.device_id.clone(),
            error_message.clone(),
            duration_seconds,
        );
        if let Err(e) = self.db.record_result(result.to_record(), true).await {
            warn!(hostname = %snapshot.hostname, error = %e, "failed to persist failed result");
        }
        warn!(hostname = %snapshot.hostname, error = %error_message, "device backup failed");
        counters.completed.fetch_add(1, Ordering::SeqCst);
        counters.failed.fetch_add(1, Ordering::SeqCst);
        self.publish_running(job_id, counters);
    }

    fn publish_running(&self, job_id: &str, counters: &Arc<Counters>) {
        self.bus.publish(ProgressEvent::running(
            job_id.to_string(),
            counters.completed.load(Ordering::SeqCst),
            counters.total,
            counters.failed.load(Ordering::SeqCst),
        ));
    }
}

async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "cli worker task join failed");
        }
    }
}
