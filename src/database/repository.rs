/*!
 * Repository layer for job persistence.
 *
 * All SQL lives here. Callers work with `GenerationJob`, `StageOutputRecord`
 * and `ShotVersion` values; the repository maps them to rows.
 */

use anyhow::{Result, anyhow};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::production::{ShotArtifacts, ShotId, ShotVersion};

use super::connection::DatabaseConnection;
use super::models::{GenerationJob, JobStatus, StageOutputRecord};

const JOB_COLUMNS: &str = "id, user_id, brief, settings, settings_fingerprint, status, current_step, \
     completed_steps, total_cost, failed_step, error, created_at, updated_at, completed_at";

const SHOT_VERSION_COLUMNS: &str = "shot_id, version, prompts, image_url, start_frame_url, \
     end_frame_url, clip_url, status, error, cost";

/// Decode a JSON text column inside a row mapper
fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parsed_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: anyhow::Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn job_from_row(row: &Row) -> rusqlite::Result<GenerationJob> {
    Ok(GenerationJob {
        id: row.get(0)?,
        user_id: row.get(1)?,
        brief: row.get(2)?,
        settings: json_column(row, 3)?,
        settings_fingerprint: row.get(4)?,
        status: parsed_column(row, 5)?,
        current_step: row.get(6)?,
        completed_steps: json_column(row, 7)?,
        total_cost: row.get(8)?,
        failed_step: row.get(9)?,
        error: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

fn stage_output_from_row(row: &Row) -> rusqlite::Result<StageOutputRecord> {
    Ok(StageOutputRecord {
        job_id: row.get(0)?,
        step: row.get(1)?,
        stage_key: row.get(2)?,
        payload: row.get(3)?,
        cost: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn shot_version_from_row(row: &Row) -> rusqlite::Result<ShotVersion> {
    Ok(ShotVersion {
        shot_id: row.get(0)?,
        version: row.get(1)?,
        prompts: json_column(row, 2)?,
        artifacts: ShotArtifacts {
            image_url: row.get(3)?,
            start_frame_url: row.get(4)?,
            end_frame_url: row.get(5)?,
            clip_url: row.get(6)?,
        },
        status: parsed_column(row, 7)?,
        error: row.get(8)?,
        cost: row.get(9)?,
    })
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn new_default() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Repository over an in-memory database
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Hex SHA256 of `text`
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Insert a new job together with any outputs it starts with
    pub async fn create_job(&self, job: &GenerationJob, seed_outputs: Vec<StageOutputRecord>) -> Result<()> {
        let job = job.clone();
        let settings = serde_json::to_string(&job.settings)?;
        let completed_steps = serde_json::to_string(&job.completed_steps)?;

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    &format!(
                        "INSERT INTO jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                        JOB_COLUMNS
                    ),
                    params![
                        job.id,
                        job.user_id,
                        job.brief,
                        settings,
                        job.settings_fingerprint,
                        job.status.to_string(),
                        job.current_step,
                        completed_steps,
                        job.total_cost,
                        job.failed_step,
                        job.error,
                        job.created_at,
                        job.updated_at,
                        job.completed_at,
                    ],
                )?;

                for output in &seed_outputs {
                    Self::upsert_stage_output_sync(tx, output)?;
                }
                Ok(())
            })
            .await
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<GenerationJob>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| Self::get_job_sync(conn, &job_id))
            .await
    }

    fn get_job_sync(conn: &Connection, job_id: &str) -> Result<Option<GenerationJob>> {
        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                [job_id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    /// Persist the job's status, step bookkeeping and cost
    pub async fn update_job(&self, job: &GenerationJob) -> Result<()> {
        let job = job.clone();
        self.db
            .execute_async(move |conn| Self::update_job_sync(conn, &job))
            .await
    }

    fn update_job_sync(conn: &Connection, job: &GenerationJob) -> Result<()> {
        let completed_steps = serde_json::to_string(&job.completed_steps)?;
        let updated = conn.execute(
            r#"
            UPDATE jobs
            SET status = ?1, current_step = ?2, completed_steps = ?3, total_cost = ?4,
                failed_step = ?5, error = ?6, updated_at = ?7, completed_at = ?8
            WHERE id = ?9
            "#,
            params![
                job.status.to_string(),
                job.current_step,
                completed_steps,
                job.total_cost,
                job.failed_step,
                job.error,
                job.updated_at,
                job.completed_at,
                job.id,
            ],
        )?;

        if updated == 0 {
            return Err(anyhow!("Job not found: {}", job.id));
        }
        Ok(())
    }

    /// All jobs, most recently updated first
    pub async fn list_jobs(&self, status_filter: Option<JobStatus>) -> Result<Vec<GenerationJob>> {
        self.db
            .execute_async(move |conn| {
                let jobs = match status_filter {
                    Some(status) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {} FROM jobs WHERE status = ?1 ORDER BY updated_at DESC",
                            JOB_COLUMNS
                        ))?;
                        stmt.query_map([status.to_string()], job_from_row)?
                            .collect::<rusqlite::Result<Vec<_>>>()?
                    }
                    None => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {} FROM jobs ORDER BY updated_at DESC",
                            JOB_COLUMNS
                        ))?;
                        stmt.query_map([], job_from_row)?
                            .collect::<rusqlite::Result<Vec<_>>>()?
                    }
                };
                Ok(jobs)
            })
            .await
    }

    /// Delete a job; outputs and shot versions cascade
    pub async fn delete_job(&self, job_id: &str) -> Result<bool> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", [&job_id])?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Delete jobs created more than `days` days ago
    pub async fn delete_old_jobs(&self, days: i64) -> Result<usize> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM jobs WHERE created_at < ?1", [&cutoff])?;
                Ok(deleted)
            })
            .await
    }

    // =========================================================================
    // Stage Output Operations
    // =========================================================================

    fn upsert_stage_output_sync(conn: &Connection, output: &StageOutputRecord) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO stage_outputs (job_id, step, stage_key, payload, cost, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(job_id, step) DO UPDATE SET
                stage_key = excluded.stage_key,
                payload = excluded.payload,
                cost = excluded.cost,
                updated_at = excluded.updated_at
            "#,
            params![
                output.job_id,
                output.step,
                output.stage_key,
                output.payload,
                output.cost,
                output.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Write a stage's output and the advanced job record atomically
    pub async fn commit_stage(&self, job: &GenerationJob, output: StageOutputRecord) -> Result<()> {
        let job = job.clone();
        debug!(
            "Committing step {} ({}) for job {}",
            output.step, output.stage_key, job.id
        );

        self.db
            .transaction_async(move |tx| {
                Self::upsert_stage_output_sync(tx, &output)?;
                Self::update_job_sync(tx, &job)?;
                Ok(())
            })
            .await
    }

    pub async fn get_stage_output(&self, job_id: &str, step: u8) -> Result<Option<StageOutputRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let output = conn
                    .query_row(
                        r#"
                        SELECT job_id, step, stage_key, payload, cost, updated_at
                        FROM stage_outputs WHERE job_id = ?1 AND step = ?2
                        "#,
                        params![job_id, step],
                        stage_output_from_row,
                    )
                    .optional()?;
                Ok(output)
            })
            .await
    }

    pub async fn list_stage_outputs(&self, job_id: &str) -> Result<Vec<StageOutputRecord>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT job_id, step, stage_key, payload, cost, updated_at
                    FROM stage_outputs WHERE job_id = ?1 ORDER BY step
                    "#,
                )?;
                let outputs = stmt
                    .query_map([&job_id], stage_output_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(outputs)
            })
            .await
    }

    // =========================================================================
    // Shot Version Operations
    // =========================================================================

    /// Append a version for the shot, assigning the next version number
    pub async fn append_shot_version(&self, job_id: &str, version: ShotVersion) -> Result<ShotVersion> {
        let job_id = job_id.to_string();
        let prompts = serde_json::to_string(&version.prompts)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                let next: u32 = tx.query_row(
                    "SELECT COALESCE(MAX(version), 0) + 1 FROM shot_versions WHERE job_id = ?1 AND shot_id = ?2",
                    params![job_id, version.shot_id],
                    |row| row.get(0),
                )?;

                tx.execute(
                    r#"
                    INSERT INTO shot_versions (
                        job_id, shot_id, version, prompts, image_url, start_frame_url,
                        end_frame_url, clip_url, status, error, cost, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                    "#,
                    params![
                        job_id,
                        version.shot_id,
                        next,
                        prompts,
                        version.artifacts.image_url,
                        version.artifacts.start_frame_url,
                        version.artifacts.end_frame_url,
                        version.artifacts.clip_url,
                        version.status.to_string(),
                        version.error,
                        version.cost,
                        now,
                    ],
                )?;

                Ok(ShotVersion {
                    version: next,
                    ..version
                })
            })
            .await
    }

    /// The active (highest) version of every shot in the job
    pub async fn latest_shot_versions(&self, job_id: &str) -> Result<BTreeMap<ShotId, ShotVersion>> {
        let job_id = job_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"
                    SELECT {} FROM shot_versions sv
                    WHERE sv.job_id = ?1
                      AND sv.version = (
                          SELECT MAX(version) FROM shot_versions
                          WHERE job_id = sv.job_id AND shot_id = sv.shot_id
                      )
                    "#,
                    SHOT_VERSION_COLUMNS
                ))?;
                let versions = stmt
                    .query_map([&job_id], shot_version_from_row)?
                    .map(|r| r.map(|v| (v.shot_id.clone(), v)))
                    .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
                Ok(versions)
            })
            .await
    }

    /// Every version of one shot, oldest first
    pub async fn shot_history(&self, job_id: &str, shot_id: &str) -> Result<Vec<ShotVersion>> {
        let job_id = job_id.to_string();
        let shot_id = shot_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM shot_versions WHERE job_id = ?1 AND shot_id = ?2 ORDER BY version",
                    SHOT_VERSION_COLUMNS
                ))?;
                let versions = stmt
                    .query_map(params![job_id, shot_id], shot_version_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(versions)
            })
            .await
    }

    // =========================================================================
    // Lease Operations
    // =========================================================================

    /// Take the job's lease for `owner` unless another owner holds an unexpired one
    pub async fn acquire_lease(&self, job_id: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let job_id = job_id.to_string();
        let owner = owner.to_string();
        let now = chrono::Utc::now();
        let expires_at = (now + chrono::Duration::from_std(ttl)?).to_rfc3339();

        self.db
            .transaction_async(move |tx| {
                let current: Option<(Option<String>, Option<String>)> = tx
                    .query_row(
                        "SELECT lease_owner, lease_expires_at FROM jobs WHERE id = ?1",
                        [&job_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                let Some((holder, holder_expiry)) = current else {
                    return Err(anyhow!("Job not found: {}", job_id));
                };

                let held_by_other = match (holder, holder_expiry) {
                    (Some(holder), Some(expiry)) if holder != owner => {
                        chrono::DateTime::parse_from_rfc3339(&expiry)
                            .map(|expiry| expiry > now)
                            .unwrap_or(false)
                    }
                    _ => false,
                };

                if held_by_other {
                    debug!("Lease on job {} is held by another run", job_id);
                    return Ok(false);
                }

                tx.execute(
                    "UPDATE jobs SET lease_owner = ?1, lease_expires_at = ?2 WHERE id = ?3",
                    params![owner, expires_at, job_id],
                )?;
                Ok(true)
            })
            .await
    }

    /// Release the lease if `owner` still holds it
    pub async fn release_lease(&self, job_id: &str, owner: &str) -> Result<()> {
        let job_id = job_id.to_string();
        let owner = owner.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    UPDATE jobs SET lease_owner = NULL, lease_expires_at = NULL
                    WHERE id = ?1 AND lease_owner = ?2
                    "#,
                    params![job_id, owner],
                )?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::production::{GenerationSettings, ShotPrompts, ShotVersionStatus};

    fn job(id: &str) -> GenerationJob {
        GenerationJob::new(
            id.to_string(),
            "user-1".to_string(),
            "forest rain".to_string(),
            GenerationSettings::default(),
            "fingerprint".to_string(),
            1,
        )
    }

    fn version(shot_id: &str, clip: &str) -> ShotVersion {
        ShotVersion {
            shot_id: shot_id.to_string(),
            version: 0,
            prompts: ShotPrompts {
                clip: Some("drift".to_string()),
                ..Default::default()
            },
            artifacts: ShotArtifacts {
                clip_url: Some(clip.to_string()),
                ..Default::default()
            },
            status: ShotVersionStatus::Completed,
            error: None,
            cost: 0.25,
        }
    }

    #[tokio::test]
    async fn test_createJob_shouldRoundTripRecordAndSeedOutputs() {
        let repo = Repository::new_in_memory().unwrap();
        let job = job("job-1");
        let seed = StageOutputRecord::new("job-1", 2, "visual_world", "{}".to_string(), 0.0);

        repo.create_job(&job, vec![seed]).await.unwrap();

        let loaded = repo.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(loaded, job);
        assert!(repo.get_stage_output("job-1", 2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_getJob_withUnknownId_shouldReturnNone() {
        let repo = Repository::new_in_memory().unwrap();
        assert!(repo.get_job("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commitStage_shouldWriteOutputAndJobTogether() {
        let repo = Repository::new_in_memory().unwrap();
        let mut job = job("job-1");
        repo.create_job(&job, Vec::new()).await.unwrap();

        job.begin_run(1);
        job.complete_step(1, Some(3), 0.5);
        let output = StageOutputRecord::new("job-1", 1, "atmosphere", r#"{"a":1}"#.to_string(), 0.5);
        repo.commit_stage(&job, output).await.unwrap();

        let loaded = repo.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(loaded.completed_steps, vec![1]);
        assert_eq!(loaded.current_step, 3);
        let stored = repo.get_stage_output("job-1", 1).await.unwrap().unwrap();
        assert_eq!(stored.payload, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_commitStage_withMissingJob_shouldNotWriteOutput() {
        let repo = Repository::new_in_memory().unwrap();
        repo.create_job(&job("job-1"), Vec::new()).await.unwrap();

        let ghost = job("ghost");
        let output = StageOutputRecord::new("job-1", 1, "atmosphere", "{}".to_string(), 0.0);
        assert!(repo.commit_stage(&ghost, output).await.is_err());

        assert!(repo.get_stage_output("job-1", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_appendShotVersion_shouldIncrementAndKeepHistory() {
        let repo = Repository::new_in_memory().unwrap();
        repo.create_job(&job("job-1"), Vec::new()).await.unwrap();

        let first = repo.append_shot_version("job-1", version("shot-1", "clip-a")).await.unwrap();
        let second = repo.append_shot_version("job-1", version("shot-1", "clip-b")).await.unwrap();
        repo.append_shot_version("job-1", version("shot-2", "clip-c")).await.unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);

        let latest = repo.latest_shot_versions("job-1").await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["shot-1"].artifacts.clip_url.as_deref(), Some("clip-b"));
        assert_eq!(latest["shot-1"].prompts.clip.as_deref(), Some("drift"));

        let history = repo.shot_history("job-1", "shot-1").await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_listJobs_withStatusFilter_shouldFilter() {
        let repo = Repository::new_in_memory().unwrap();
        let mut failed = job("job-failed");
        failed.fail(5, "boom");
        repo.create_job(&failed, Vec::new()).await.unwrap();
        repo.create_job(&job("job-queued"), Vec::new()).await.unwrap();

        let all = repo.list_jobs(None).await.unwrap();
        let only_failed = repo.list_jobs(Some(JobStatus::Failed)).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(only_failed.len(), 1);
        assert_eq!(only_failed[0].id, "job-failed");
    }

    #[tokio::test]
    async fn test_deleteJob_shouldCascade() {
        let repo = Repository::new_in_memory().unwrap();
        let seed = StageOutputRecord::new("job-1", 2, "visual_world", "{}".to_string(), 0.0);
        repo.create_job(&job("job-1"), vec![seed]).await.unwrap();
        repo.append_shot_version("job-1", version("shot-1", "clip")).await.unwrap();

        assert!(repo.delete_job("job-1").await.unwrap());

        assert!(repo.list_stage_outputs("job-1").await.unwrap().is_empty());
        assert!(repo.latest_shot_versions("job-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acquireLease_heldByOther_shouldBeRefusedUntilReleased() {
        let repo = Repository::new_in_memory().unwrap();
        repo.create_job(&job("job-1"), Vec::new()).await.unwrap();
        let ttl = Duration::from_secs(60);

        assert!(repo.acquire_lease("job-1", "run-a", ttl).await.unwrap());
        assert!(!repo.acquire_lease("job-1", "run-b", ttl).await.unwrap());
        assert!(repo.acquire_lease("job-1", "run-a", ttl).await.unwrap());

        repo.release_lease("job-1", "run-a").await.unwrap();
        assert!(repo.acquire_lease("job-1", "run-b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_acquireLease_expired_shouldBeTakenOver() {
        let repo = Repository::new_in_memory().unwrap();
        repo.create_job(&job("job-1"), Vec::new()).await.unwrap();

        assert!(repo.acquire_lease("job-1", "run-a", Duration::ZERO).await.unwrap());
        assert!(repo.acquire_lease("job-1", "run-b", Duration::from_secs(60)).await.unwrap());
    }

    #[test]
    fn test_hashText_shouldProduceConsistentHash() {
        assert_eq!(Repository::hash_text("rain"), Repository::hash_text("rain"));
        assert_ne!(Repository::hash_text("rain"), Repository::hash_text("snow"));
        assert_eq!(Repository::hash_text("rain").len(), 64);
    }
}
