/*!
 * The seam between the controller and individual stages.
 *
 * A stage reads the job and the persisted outputs of earlier steps, calls
 * collaborators, and returns a JSON payload plus what it spent. It never
 * writes the job record; the controller commits the payload and the job
 * transition together.
 */

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::database::models::GenerationJob;
use crate::database::repository::Repository;
use crate::errors::StageError;
use crate::production::GenerationSettings;
use crate::providers::Collaborators;

use super::orchestrator::PipelineConfig;
use super::steps::PipelineStep;

/// Everything a stage may read
pub struct StageContext<'a> {
    pub job: &'a GenerationJob,
    pub collaborators: &'a Collaborators,
    pub repository: &'a Repository,
    pub config: &'a PipelineConfig,
}

impl<'a> StageContext<'a> {
    pub fn job_id(&self) -> &str {
        &self.job.id
    }

    pub fn brief(&self) -> &str {
        &self.job.brief
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.job.settings
    }

    /// Load and decode the persisted output of an earlier step
    pub async fn input<T: DeserializeOwned>(&self, step: PipelineStep) -> Result<T, StageError> {
        let record = self
            .repository
            .get_stage_output(&self.job.id, step.number())
            .await?
            .ok_or(StageError::MissingInput { step: step.number() })?;
        Ok(serde_json::from_str(&record.payload)?)
    }
}

/// How a stage ended, as far as the job is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// The stage could not do its work but is allowed to fail
    BestEffortFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    pub payload: Value,
    pub cost: f64,
    pub outcome: StageOutcome,
}

impl StageOutput {
    pub fn completed<T: Serialize>(payload: &T, cost: f64) -> Result<Self, StageError> {
        Ok(Self {
            payload: serde_json::to_value(payload)?,
            cost,
            outcome: StageOutcome::Completed,
        })
    }

    pub fn best_effort_failed<T: Serialize>(
        payload: &T,
        cost: f64,
        reason: impl Into<String>,
    ) -> Result<Self, StageError> {
        Ok(Self {
            payload: serde_json::to_value(payload)?,
            cost,
            outcome: StageOutcome::BestEffortFailed {
                reason: reason.into(),
            },
        })
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn step(&self) -> PipelineStep;

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::StageOutputRecord;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Mood {
        mood_description: String,
    }

    async fn setup() -> (Repository, GenerationJob) {
        let repo = Repository::new_in_memory().unwrap();
        let job = GenerationJob::new(
            "job-1".to_string(),
            "user".to_string(),
            "forest rain".to_string(),
            GenerationSettings::default(),
            "fp".to_string(),
            1,
        );
        let seed = StageOutputRecord::new(
            "job-1",
            1,
            "atmosphere",
            json!({"mood_description": "misty"}).to_string(),
            0.0,
        );
        repo.create_job(&job, vec![seed]).await.unwrap();
        (repo, job)
    }

    #[tokio::test]
    async fn test_input_withPersistedOutput_shouldDecode() {
        let (repo, job) = setup().await;
        let collaborators = Collaborators::from_studio(std::sync::Arc::new(
            crate::providers::mock::MockStudio::new(),
        ));
        let config = PipelineConfig::default();
        let ctx = StageContext {
            job: &job,
            collaborators: &collaborators,
            repository: &repo,
            config: &config,
        };

        let mood: Mood = ctx.input(PipelineStep::Atmosphere).await.unwrap();
        assert_eq!(mood.mood_description, "misty");

        let missing = ctx.input::<Mood>(PipelineStep::FlowDesign).await;
        assert!(matches!(missing, Err(StageError::MissingInput { step: 3 })));
    }

    #[test]
    fn test_bestEffortFailed_shouldKeepReason() {
        let output = StageOutput::best_effort_failed(&json!({}), 0.0, "no publisher").unwrap();
        assert_eq!(
            output.outcome,
            StageOutcome::BestEffortFailed {
                reason: "no publisher".to_string()
            }
        );
    }
}
