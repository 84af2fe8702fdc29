/*!
 * Database entity models.
 *
 * `GenerationJob` is the only piece of state shared across stages. Its
 * transition methods are the single place where status, step bookkeeping and
 * cost change, so every stage boundary mutates it the same way.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::production::GenerationSettings;

/// Job status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, no stage started yet
    Queued,
    /// A stage is running or the run was interrupted
    InProgress,
    /// Every enabled stage finished
    Completed,
    /// A mandatory stage failed; resumable from `failed_step`
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Generation job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Unique job identifier (UUID)
    pub id: String,
    pub user_id: String,
    pub brief: String,
    pub settings: GenerationSettings,
    /// SHA256 of brief and settings, used to refuse mismatched resumes
    pub settings_fingerprint: String,
    pub status: JobStatus,
    pub current_step: u8,
    /// Ordered, no repeats
    pub completed_steps: Vec<u8>,
    pub total_cost: f64,
    pub failed_step: Option<u8>,
    pub error: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl GenerationJob {
    pub fn new(
        id: String,
        user_id: String,
        brief: String,
        settings: GenerationSettings,
        settings_fingerprint: String,
        first_step: u8,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            user_id,
            brief,
            settings,
            settings_fingerprint,
            status: JobStatus::Queued,
            current_step: first_step,
            completed_steps: Vec::new(),
            total_cost: 0.0,
            failed_step: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn is_resumable(&self) -> bool {
        self.status != JobStatus::Completed
    }

    /// Enter `in_progress` at `from_step`, forgetting completions at or after it
    pub fn begin_run(&mut self, from_step: u8) {
        self.completed_steps.retain(|step| *step < from_step);
        self.current_step = from_step;
        self.status = JobStatus::InProgress;
        self.failed_step = None;
        self.error = None;
        self.completed_at = None;
        self.touch();
    }

    /// Record a completed stage and move on to `next_step`
    pub fn complete_step(&mut self, step: u8, next_step: Option<u8>, cost: f64) {
        if !self.completed_steps.contains(&step) {
            self.completed_steps.push(step);
        }
        self.current_step = next_step.unwrap_or(step);
        self.total_cost += cost;
        self.touch();
    }

    pub fn fail(&mut self, step: u8, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.failed_step = Some(step);
        self.current_step = step;
        self.error = Some(error.into());
        self.touch();
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.touch();
        self.completed_at = Some(self.updated_at.clone());
    }
}

/// Persisted output of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutputRecord {
    pub job_id: String,
    pub step: u8,
    /// Stage-specific key, e.g. `flow_design`
    pub stage_key: String,
    /// JSON payload text, stored byte for byte
    pub payload: String,
    pub cost: f64,
    pub updated_at: String,
}

impl StageOutputRecord {
    pub fn new(job_id: &str, step: u8, stage_key: &str, payload: String, cost: f64) -> Self {
        Self {
            job_id: job_id.to_string(),
            step,
            stage_key: stage_key.to_string(),
            payload,
            cost,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Row counts across the database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub job_count: i64,
    pub stage_output_count: i64,
    pub shot_version_count: i64,
    pub file_size_bytes: u64,
}

impl fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Jobs: {}, Stage outputs: {}, Shot versions: {}, Size: {} KB",
            self.job_count,
            self.stage_output_count,
            self.shot_version_count,
            self.file_size_bytes / 1024
        )
    }
}
