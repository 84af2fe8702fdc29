/*!
 * Job lifecycle management.
 *
 * This module handles:
 * - Creating jobs with a fingerprint of their brief and settings
 * - Deciding whether a failed job can be resumed from a given step
 * - Committing stage results and job transitions
 * - The per-job lease that keeps two runs off the same job
 * - Listing and cleanup
 */

use anyhow::Result;
use log::{debug, info, warn};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::database::models::{GenerationJob, JobStatus, StageOutputRecord};
use crate::database::repository::Repository;
use crate::production::GenerationSettings;

use super::models::{JobCreateParams, JobStatusView, ResumeCheck, short_id};

#[derive(Clone)]
pub struct JobManager {
    repo: Repository,
}

impl JobManager {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(Repository::new_in_memory()?))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// SHA256 over the canonical JSON of brief and settings
    pub fn fingerprint(brief: &str, settings: &GenerationSettings) -> Result<String> {
        // serde_json maps keep keys sorted, so this text is canonical
        let canonical = serde_json::to_string(&json!({
            "brief": brief,
            "settings": settings,
        }))?;
        Ok(Repository::hash_text(&canonical))
    }

    // =========================================================================
    // Job Creation
    // =========================================================================

    /// Create a job, persisting `seed_outputs` in the same transaction
    pub async fn create_job(
        &self,
        params: JobCreateParams,
        first_step: u8,
        seed_outputs: impl FnOnce(&str) -> Vec<StageOutputRecord>,
    ) -> Result<GenerationJob> {
        let job_id = Uuid::new_v4().to_string();
        let fingerprint = Self::fingerprint(&params.brief, &params.settings)?;

        let job = GenerationJob::new(
            job_id.clone(),
            params.user_id,
            params.brief,
            params.settings,
            fingerprint,
            first_step,
        );

        self.repo.create_job(&job, seed_outputs(&job_id)).await?;
        info!("Created job {} for user {}", short_id(&job_id), job.user_id);

        Ok(job)
    }

    // =========================================================================
    // Resume
    // =========================================================================

    /// Check whether `job_id` can be resumed at `from_step`.
    ///
    /// `prerequisites` are the executed steps that come before `from_step`;
    /// each of them must already be completed.
    pub async fn check_resume(
        &self,
        job_id: &str,
        brief: &str,
        settings: &GenerationSettings,
        prerequisites: &[u8],
    ) -> Result<ResumeCheck> {
        let Some(job) = self.repo.get_job(job_id).await? else {
            return Ok(ResumeCheck::NotFound);
        };

        let fingerprint = Self::fingerprint(brief, settings)?;
        if fingerprint != job.settings_fingerprint {
            warn!(
                "Refusing to resume job {}: inputs changed (old: {}, new: {})",
                short_id(job_id),
                &job.settings_fingerprint[..8.min(job.settings_fingerprint.len())],
                &fingerprint[..8]
            );
            return Ok(ResumeCheck::InputsChanged {
                job_id: job.id,
                old_fingerprint: job.settings_fingerprint,
                new_fingerprint: fingerprint,
            });
        }

        if job.status == JobStatus::Completed {
            return Ok(ResumeCheck::AlreadyCompleted { job_id: job.id });
        }

        let missing: Vec<u8> = prerequisites
            .iter()
            .copied()
            .filter(|step| !job.completed_steps.contains(step))
            .collect();
        if !missing.is_empty() {
            return Ok(ResumeCheck::MissingPrerequisites {
                job_id: job.id,
                missing,
            });
        }

        debug!("Job {} can resume", short_id(job_id));
        Ok(ResumeCheck::Ready { job: Box::new(job) })
    }

    // =========================================================================
    // Job State
    // =========================================================================

    pub async fn get_job(&self, job_id: &str) -> Result<Option<GenerationJob>> {
        self.repo.get_job(job_id).await
    }

    pub async fn save(&self, job: &GenerationJob) -> Result<()> {
        self.repo.update_job(job).await
    }

    /// Persist a stage's output with the job transition it caused
    pub async fn commit_stage(&self, job: &GenerationJob, output: StageOutputRecord) -> Result<()> {
        self.repo.commit_stage(job, output).await
    }

    pub async fn status(&self, job_id: &str) -> Result<Option<JobStatusView>> {
        let job = self.repo.get_job(job_id).await?;
        Ok(job.as_ref().map(JobStatusView::from_job))
    }

    // =========================================================================
    // Lease
    // =========================================================================

    pub async fn acquire_lease(&self, job_id: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let acquired = self.repo.acquire_lease(job_id, owner, ttl).await?;
        if !acquired {
            warn!("Job {} is already being run elsewhere", short_id(job_id));
        }
        Ok(acquired)
    }

    pub async fn release_lease(&self, job_id: &str, owner: &str) -> Result<()> {
        self.repo.release_lease(job_id, owner).await
    }

    // =========================================================================
    // Listing and Cleanup
    // =========================================================================

    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobStatusView>> {
        let jobs = self.repo.list_jobs(status).await?;
        Ok(jobs.iter().map(JobStatusView::from_job).collect())
    }

    pub async fn delete_job(&self, job_id: &str) -> Result<bool> {
        info!("Deleting job {}", job_id);
        self.repo.delete_job(job_id).await
    }

    /// Delete jobs older than `days`, returning how many were removed
    pub async fn cleanup_old_jobs(&self, days: i64) -> Result<usize> {
        info!("Cleaning up jobs older than {} days", days);
        let deleted = self.repo.delete_old_jobs(days).await?;
        if deleted > 0 {
            self.repo.connection().vacuum()?;
        }
        Ok(deleted)
    }
}
