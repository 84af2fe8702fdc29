/*!
 * Job-facing views and resume outcomes.
 */

use serde::{Deserialize, Serialize};

use crate::database::models::{GenerationJob, JobStatus};
use crate::production::GenerationSettings;

/// Parameters for creating a new job
#[derive(Debug, Clone)]
pub struct JobCreateParams {
    pub brief: String,
    pub settings: GenerationSettings,
    pub user_id: String,
}

impl JobCreateParams {
    pub fn new(brief: impl Into<String>, settings: GenerationSettings, user_id: impl Into<String>) -> Self {
        Self {
            brief: brief.into(),
            settings,
            user_id: user_id.into(),
        }
    }
}

/// The status surface exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub current_step: u8,
    pub completed_steps: Vec<u8>,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<u8>,
    pub updated_at: String,
}

impl JobStatusView {
    pub fn from_job(job: &GenerationJob) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            current_step: job.current_step,
            completed_steps: job.completed_steps.clone(),
            total_cost: job.total_cost,
            error: job.error.clone(),
            failed_step: job.failed_step,
            updated_at: job.updated_at.clone(),
        }
    }
}

/// First eight characters of an id, for log lines
pub fn short_id(id: &str) -> &str {
    &id[..8.min(id.len())]
}

impl std::fmt::Display for JobStatusView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", short_id(&self.job_id), self.status)?;
        match self.failed_step {
            Some(step) => write!(f, " at step {}", step)?,
            None => write!(f, ", step {}", self.current_step)?,
        }
        write!(f, " (cost {:.4})", self.total_cost)
    }
}

/// Outcome of checking whether a job can be resumed
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeCheck {
    /// Safe to resume
    Ready { job: Box<GenerationJob> },
    NotFound,
    /// Brief or settings differ from the ones the job was created with
    InputsChanged {
        job_id: String,
        old_fingerprint: String,
        new_fingerprint: String,
    },
    AlreadyCompleted { job_id: String },
    /// Steps before the resume point that never completed
    MissingPrerequisites { job_id: String, missing: Vec<u8> },
}

impl ResumeCheck {
    pub fn can_proceed(&self) -> bool {
        matches!(self, ResumeCheck::Ready { .. })
    }

    /// Why the resume was refused, if it was
    pub fn refusal(&self) -> Option<String> {
        match self {
            ResumeCheck::Ready { .. } => None,
            ResumeCheck::NotFound => Some("job not found".to_string()),
            ResumeCheck::InputsChanged { .. } => {
                Some("brief or settings differ from the original run".to_string())
            }
            ResumeCheck::AlreadyCompleted { .. } => Some("job already completed".to_string()),
            ResumeCheck::MissingPrerequisites { missing, .. } => {
                Some(format!("steps {:?} have not completed", missing))
            }
        }
    }
}
