//! SurrealDB connection handle and CRUD for the NetBackup data model (§3).

use chrono::Utc;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::Resource;
use surrealdb::Surreal;
use tracing::{debug, info, instrument, warn};

use crate::error::StateError;
use crate::schema::{
    BackupJobRecord, BackupResultRecord, BackupScheduleRecord, CredentialSetRecord, DeviceJoinRow,
    DeviceRecord, SiteRecord,
};
use crate::Result;

/// Connection handle wrapping a SurrealDB engine (embedded memory store for
/// tests/air-gapped single-node deployments, or a remote `ws://`/`http://`
/// endpoint in production — `surrealdb::engine::any` abstracts over both).
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to `database_url` (e.g. `mem://`, `ws://host:8000`,
    /// `rocksdb://path`) and ensure the schema exists.
    #[instrument(skip_all)]
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!(url = %database_url, "connecting to SurrealDB");
        let db = any::connect(database_url)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;
        db.use_ns("netbackup")
            .use_db("main")
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;
        Ok(handle)
    }

    /// In-memory handle for tests and single-process demos.
    pub async fn setup_db() -> Result<Self> {
        Self::connect("mem://").await
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("initializing netbackup schema");
        let schema = r#"
            DEFINE TABLE sites SCHEMAFULL;
            DEFINE FIELD id ON sites TYPE string;
            DEFINE FIELD code ON sites TYPE string;
            DEFINE FIELD name ON sites TYPE string;
            DEFINE FIELD gitea_repo_name ON sites TYPE string;
            DEFINE FIELD created_at ON sites TYPE datetime;
            DEFINE FIELD updated_at ON sites TYPE datetime;
            DEFINE INDEX idx_sites_id ON sites FIELDS id UNIQUE;
            DEFINE INDEX idx_sites_code ON sites FIELDS code UNIQUE;

            DEFINE TABLE credential_sets SCHEMAFULL;
            DEFINE FIELD id ON credential_sets TYPE string;
            DEFINE FIELD label ON credential_sets TYPE string;
            DEFINE FIELD username ON credential_sets TYPE string;
            DEFINE FIELD encrypted_password ON credential_sets TYPE string;
            DEFINE FIELD created_at ON credential_sets TYPE datetime;
            DEFINE FIELD updated_at ON credential_sets TYPE datetime;
            DEFINE INDEX idx_credsets_id ON credential_sets FIELDS id UNIQUE;
            DEFINE INDEX idx_credsets_label ON credential_sets FIELDS label UNIQUE;

            DEFINE TABLE devices SCHEMAFULL;
            DEFINE FIELD id ON devices TYPE string;
            DEFINE FIELD hostname ON devices TYPE string;
            DEFINE FIELD ip ON devices TYPE string;
            DEFINE FIELD platform ON devices TYPE string;
            DEFINE FIELD site_id ON devices TYPE string;
            DEFINE FIELD credential_id ON devices TYPE option<string>;
            DEFINE FIELD enabled ON devices TYPE bool;
            DEFINE FIELD created_at ON devices TYPE datetime;
            DEFINE FIELD updated_at ON devices TYPE datetime;
            DEFINE INDEX idx_devices_id ON devices FIELDS id UNIQUE;
            DEFINE INDEX idx_devices_hostname_site ON devices FIELDS hostname, site_id UNIQUE;

            DEFINE TABLE backup_jobs SCHEMAFULL;
            DEFINE FIELD id ON backup_jobs TYPE string;
            DEFINE FIELD triggered_by ON backup_jobs TYPE string;
            DEFINE FIELD status ON backup_jobs TYPE string;
            DEFINE FIELD total_devices ON backup_jobs TYPE int;
            DEFINE FIELD completed_devices ON backup_jobs TYPE int;
            DEFINE FIELD failed_devices ON backup_jobs TYPE int;
            DEFINE FIELD triggered_at ON backup_jobs TYPE datetime;
            DEFINE FIELD started_at ON backup_jobs TYPE option<datetime>;
            DEFINE FIELD completed_at ON backup_jobs TYPE option<datetime>;
            DEFINE INDEX idx_jobs_id ON backup_jobs FIELDS id UNIQUE;

            DEFINE TABLE backup_results SCHEMAFULL;
            DEFINE FIELD id ON backup_results TYPE string;
            DEFINE FIELD job_id ON backup_results TYPE string;
            DEFINE FIELD device_id ON backup_results TYPE string;
            DEFINE FIELD status ON backup_results TYPE string;
            DEFINE FIELD config_hash ON backup_results TYPE option<string>;
            DEFINE FIELD gitea_commit_sha ON backup_results TYPE option<string>;
            DEFINE FIELD error_message ON backup_results TYPE option<string>;
            DEFINE FIELD duration_seconds ON backup_results TYPE option<float>;
            DEFINE FIELD backed_up_at ON backup_results TYPE datetime;
            DEFINE INDEX idx_results_id ON backup_results FIELDS id UNIQUE;
            DEFINE INDEX idx_results_job ON backup_results FIELDS job_id;

            DEFINE TABLE backup_schedules SCHEMAFULL;
            DEFINE FIELD id ON backup_schedules TYPE string;
            DEFINE FIELD name ON backup_schedules TYPE string;
            DEFINE FIELD frequency ON backup_schedules TYPE string;
            DEFINE FIELD hour ON backup_schedules TYPE int;
            DEFINE FIELD day_of_week ON backup_schedules TYPE int;
            DEFINE FIELD site_id ON backup_schedules TYPE option<string>;
            DEFINE FIELD enabled ON backup_schedules TYPE bool;
            DEFINE FIELD last_run_at ON backup_schedules TYPE option<datetime>;
            DEFINE FIELD scheduler_job_id ON backup_schedules TYPE option<string>;
            DEFINE INDEX idx_schedules_id ON backup_schedules FIELDS id UNIQUE;
            DEFINE INDEX idx_schedules_name ON backup_schedules FIELDS name UNIQUE;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;
        debug!("schema ready");
        Ok(())
    }

    // ---------------------------------------------------------------- sites

    pub async fn create_site(&self, site: SiteRecord) -> Result<SiteRecord> {
        let created: Option<SiteRecord> = self
            .db
            .create(Resource::from(("sites", site.id.clone())))
            .content(site)
            .await?;
        created.ok_or_else(|| StateError::Transaction("failed to create site".to_string()))
    }

    pub async fn get_site(&self, id: &str) -> Result<Option<SiteRecord>> {
        Ok(self.db.select(("sites", id)).await?)
    }

    pub async fn get_site_by_code(&self, code: &str) -> Result<Option<SiteRecord>> {
        let mut response = self
            .db
            .query("SELECT * FROM sites WHERE code = $code LIMIT 1")
            .bind(("code", code.to_string()))
            .await?;
        let rows: Vec<SiteRecord> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    pub async fn list_sites(&self) -> Result<Vec<SiteRecord>> {
        Ok(self.db.select("sites").await?)
    }

    // --------------------------------------------------------- credentials

    pub async fn create_credential_set(
        &self,
        set: CredentialSetRecord,
    ) -> Result<CredentialSetRecord> {
        let created: Option<CredentialSetRecord> = self
            .db
            .create(Resource::from(("credential_sets", set.id.clone())))
            .content(set)
            .await?;
        created
            .ok_or_else(|| StateError::Transaction("failed to create credential set".to_string()))
    }

    pub async fn get_credential_set(&self, id: &str) -> Result<Option<CredentialSetRecord>> {
        Ok(self.db.select(("credential_sets", id)).await?)
    }

    // -------------------------------------------------------------- devices

    pub async fn create_device(&self, device: DeviceRecord) -> Result<DeviceRecord> {
        let created: Option<DeviceRecord> = self
            .db
            .create(Resource::from(("devices", device.id.clone())))
            .content(device)
            .await?;
        created.ok_or_else(|| StateError::Transaction("failed to create device".to_string()))
    }

    pub async fn get_device(&self, id: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.db.select(("devices", id)).await?)
    }

    /// Enabled devices, optionally restricted to `ids`, each joined with its
    /// site and (if present) credential set — the Inventory Snapshotter's
    /// single logical query (spec §4.C). Implemented as one devices query
    /// plus two batched lookups rather than a correlated subselect, since
    /// foreign keys here are plain string fields rather than record links.
    #[instrument(skip(self, ids))]
    pub async fn list_enabled_devices(&self, ids: Option<&[String]>) -> Result<Vec<DeviceJoinRow>> {
        let devices: Vec<DeviceRecord> = match ids {
            Some(ids) => {
                let mut response = self
                    .db
                    .query("SELECT * FROM devices WHERE enabled = true AND id IN $ids")
                    .bind(("ids", ids.to_vec()))
                    .await?;
                response.take(0)?
            }
            None => {
                let mut response = self
                    .db
                    .query("SELECT * FROM devices WHERE enabled = true")
                    .await?;
                response.take(0)?
            }
        };

        if devices.is_empty() {
            return Ok(Vec::new());
        }

        let site_ids: Vec<String> = devices
            .iter()
            .map(|d| d.site_id.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        let mut response = self
            .db
            .query("SELECT * FROM sites WHERE id IN $ids")
            .bind(("ids", site_ids))
            .await?;
        let sites: Vec<SiteRecord> = response.take(0)?;

        let credential_ids: Vec<String> = devices.iter().filter_map(|d| d.credential_id.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        let credentials: Vec<CredentialSetRecord> = if credential_ids.is_empty() {
            Vec::new()
        } else {
            let mut response = self
                .db
                .query("SELECT * FROM credential_sets WHERE id IN $ids")
                .bind(("ids", credential_ids))
                .await?;
            response.take(0)?
        };

        let mut rows = Vec::with_capacity(devices.len());
        for device in devices {
            let Some(site) = sites.iter().find(|s| s.id == device.site_id).cloned() else {
                warn!(device = %device.hostname, "device references missing site, skipping");
                continue;
            };
            let credential = device
                .credential_id
                .as_ref()
                .and_then(|cid| credentials.iter().find(|c| &c.id == cid).cloned());
            rows.push(DeviceJoinRow {
                device,
                site,
                credential,
            });
        }
        Ok(rows)
    }

    /// IDs of enabled devices, optionally restricted to one site — used by
    /// the Scheduler to size a triggered job before handing off to the
    /// Engine, which re-resolves the full snapshot itself.
    pub async fn list_enabled_device_ids(&self, site_id: Option<&str>) -> Result<Vec<String>> {
        let mut response = match site_id {
            Some(site_id) => {
                self.db
                    .query("SELECT id FROM devices WHERE enabled = true AND site_id = $site_id")
                    .bind(("site_id", site_id.to_string()))
                    .await?
            }
            None => {
                self.db
                    .query("SELECT id FROM devices WHERE enabled = true")
                    .await?
            }
        };
        #[derive(serde::Deserialize)]
        struct IdRow {
            id: String,
        }
        let rows: Vec<IdRow> = response.take(0)?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    // ---------------------------------------------------------------- jobs

    pub async fn create_job(&self, job: BackupJobRecord) -> Result<BackupJobRecord> {
        let created: Option<BackupJobRecord> = self
            .db
            .create(Resource::from(("backup_jobs", job.id.clone())))
            .content(job)
            .await?;
        created.ok_or_else(|| StateError::Transaction("failed to create job".to_string()))
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<BackupJobRecord>> {
        Ok(self.db.select(("backup_jobs", id)).await?)
    }

    /// Every job, most recently triggered first.
    pub async fn list_jobs(&self) -> Result<Vec<BackupJobRecord>> {
        let mut response = self
            .db
            .query("SELECT * FROM backup_jobs ORDER BY triggered_at DESC")
            .await?;
        Ok(response.take(0)?)
    }

    /// Set `started_at`/`status=running` at the start of `Engine::run`.
    pub async fn mark_job_started(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        self.db
            .query("UPDATE backup_jobs SET status = 'running', started_at = $now WHERE id = $id")
            .bind(("id", id.to_string()))
            .bind(("now", now))
            .await?;
        Ok(())
    }

    /// Flip a job to its terminal status (invariant 2: exactly once).
    pub async fn finalize_job(&self, id: &str, status: &str) -> Result<()> {
        let now = Utc::now();
        self.db
            .query("UPDATE backup_jobs SET status = $status, completed_at = $now WHERE id = $id")
            .bind(("id", id.to_string()))
            .bind(("status", status.to_string()))
            .bind(("now", now))
            .await?;
        Ok(())
    }

    /// Append a [`BackupResultRecord`] and atomically bump the parent job's
    /// counters in one statement (spec §5: counter increments must be
    /// serialized — a single SurrealQL statement is inherently atomic).
    #[instrument(skip(self, result))]
    pub async fn record_result(&self, result: BackupResultRecord, failed: bool) -> Result<()> {
        let job_id = result.job_id.clone();
        let failed_delta = if failed { 1 } else { 0 };
        self.db
            .query(
                "BEGIN TRANSACTION;
                 CREATE type::thing('backup_results', $id) CONTENT $result;
                 UPDATE type::thing('backup_jobs', $job_id) SET
                     completed_devices = completed_devices + 1,
                     failed_devices = failed_devices + $failed_delta;
                 COMMIT TRANSACTION;",
            )
            .bind(("id", result.id.clone()))
            .bind(("result", result))
            .bind(("job_id", job_id))
            .bind(("failed_delta", failed_delta))
            .await?;
        Ok(())
    }

    pub async fn list_results_for_job(&self, job_id: &str) -> Result<Vec<BackupResultRecord>> {
        let mut response = self
            .db
            .query("SELECT * FROM backup_results WHERE job_id = $job_id")
            .bind(("job_id", job_id.to_string()))
            .await?;
        Ok(response.take(0)?)
    }

    /// On process start, transition any job left `running` from a prior
    /// crash to `failed` (invariant 5). Returns the number reconciled.
    #[instrument(skip(self))]
    pub async fn reconcile_orphan_jobs(&self) -> Result<usize> {
        let now = Utc::now();
        let mut response = self
            .db
            .query(
                "UPDATE backup_jobs SET status = 'failed', completed_at = $now
                 WHERE status = 'running' RETURN BEFORE",
            )
            .bind(("now", now))
            .await?;
        let reconciled: Vec<BackupJobRecord> = response.take(0)?;
        if !reconciled.is_empty() {
            warn!(count = reconciled.len(), "reconciled orphaned running jobs to failed");
        }
        Ok(reconciled.len())
    }

    // ----------------------------------------------------------- schedules

    pub async fn create_schedule(
        &self,
        schedule: BackupScheduleRecord,
    ) -> Result<BackupScheduleRecord> {
        let created: Option<BackupScheduleRecord> = self
            .db
            .create(Resource::from(("backup_schedules", schedule.id.clone())))
            .content(schedule)
            .await?;
        created.ok_or_else(|| StateError::Transaction("failed to create schedule".to_string()))
    }

    pub async fn get_schedule(&self, id: &str) -> Result<Option<BackupScheduleRecord>> {
        Ok(self.db.select(("backup_schedules", id)).await?)
    }

    pub async fn list_enabled_schedules(&self) -> Result<Vec<BackupScheduleRecord>> {
        let mut response = self
            .db
            .query("SELECT * FROM backup_schedules WHERE enabled = true")
            .await?;
        Ok(response.take(0)?)
    }

    /// Every schedule row, enabled or not — used by the Scheduler's
    /// reconciliation pass to detect schedules disabled or deleted through
    /// another process (e.g. the CLI) since the last pass.
    pub async fn list_schedules(&self) -> Result<Vec<BackupScheduleRecord>> {
        let mut response = self.db.query("SELECT * FROM backup_schedules").await?;
        Ok(response.take(0)?)
    }

    pub async fn set_schedule_scheduler_job_id(
        &self,
        id: &str,
        scheduler_job_id: Option<String>,
    ) -> Result<()> {
        self.db
            .query("UPDATE backup_schedules SET scheduler_job_id = $job WHERE id = $id")
            .bind(("id", id.to_string()))
            .bind(("job", scheduler_job_id))
            .await?;
        Ok(())
    }

    pub async fn touch_schedule_last_run(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        self.db
            .query("UPDATE backup_schedules SET last_run_at = $now WHERE id = $id")
            .bind(("id", id.to_string()))
            .bind(("now", now))
            .await?;
        Ok(())
    }

    pub async fn delete_schedule(&self, id: &str) -> Result<()> {
        let _: Option<BackupScheduleRecord> = self.db.delete(("backup_schedules", id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DeviceRecord, SiteRecord};
    use chrono::Utc;

    fn site(id: &str, code: &str) -> SiteRecord {
        let now = Utc::now();
        SiteRecord {
            id: id.to_string(),
            code: code.to_string(),
            name: format!("Site {code}"),
            gitea_repo_name: format!("{code}-backups"),
            created_at: now,
            updated_at: now,
        }
    }

    fn device(id: &str, hostname: &str, site_id: &str) -> DeviceRecord {
        let now = Utc::now();
        DeviceRecord {
            id: id.to_string(),
            hostname: hostname.to_string(),
            ip: "10.0.0.1".to_string(),
            platform: "ios".to_string(),
            site_id: site_id.to_string(),
            credential_id: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn list_enabled_devices_joins_site() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        handle.create_site(site("site-1", "dc1")).await.unwrap();
        handle
            .create_device(device("dev-1", "r1", "site-1"))
            .await
            .unwrap();

        let rows = handle.list_enabled_devices(None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].site.code, "dc1");
        assert!(rows[0].credential.is_none());
    }

    #[tokio::test]
    async fn s6_orphan_reconciliation_flips_running_jobs_to_failed() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        let now = Utc::now();
        handle
            .create_job(BackupJobRecord {
                id: "job-1".to_string(),
                triggered_by: "manual".to_string(),
                status: "running".to_string(),
                total_devices: 1,
                completed_devices: 0,
                failed_devices: 0,
                triggered_at: now,
                started_at: Some(now),
                completed_at: None,
            })
            .await
            .unwrap();

        let reconciled = handle.reconcile_orphan_jobs().await.unwrap();
        assert_eq!(reconciled, 1);

        let job = handle.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, "failed");
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn s4_record_result_increments_job_counters() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        let now = Utc::now();
        handle
            .create_job(BackupJobRecord {
                id: "job-2".to_string(),
                triggered_by: "manual".to_string(),
                status: "running".to_string(),
                total_devices: 3,
                completed_devices: 0,
                failed_devices: 0,
                triggered_at: now,
                started_at: Some(now),
                completed_at: None,
            })
            .await
            .unwrap();

        handle
            .record_result(
                BackupResultRecord {
                    id: "res-1".to_string(),
                    job_id: "job-2".to_string(),
                    device_id: "dev-1".to_string(),
                    status: "success".to_string(),
                    config_hash: Some("abc".to_string()),
                    gitea_commit_sha: Some("sha1".to_string()),
                    error_message: None,
                    duration_seconds: Some(1.2),
                    backed_up_at: now,
                },
                false,
            )
            .await
            .unwrap();
        handle
            .record_result(
                BackupResultRecord {
                    id: "res-2".to_string(),
                    job_id: "job-2".to_string(),
                    device_id: "dev-2".to_string(),
                    status: "failed".to_string(),
                    config_hash: None,
                    gitea_commit_sha: None,
                    error_message: Some("no credentials available".to_string()),
                    duration_seconds: None,
                    backed_up_at: now,
                },
                true,
            )
            .await
            .unwrap();

        let job = handle.get_job("job-2").await.unwrap().unwrap();
        assert_eq!(job.completed_devices, 2);
        assert_eq!(job.failed_devices, 1);

        let results = handle.list_results_for_job("job-2").await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
