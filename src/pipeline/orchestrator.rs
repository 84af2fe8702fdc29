/*!
 * Pipeline controller for generation jobs.
 *
 * The controller owns the fixed step sequence:
 * 1. Atmosphere
 * 2. Visual World (taken from the settings, never executed)
 * 3. Flow Design
 * 4. Composition
 * 5. Soundscape
 * 6. Preview
 * 7. Export
 * 8. Publish (optional, best effort)
 *
 * After every stage the stage output and the job transition are committed
 * together. A failing stage marks the job failed at that step; the caller
 * may resume from it later without replaying the steps before it.
 */

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::database::models::{GenerationJob, StageOutputRecord};
use crate::errors::StageError;
use crate::jobs::models::short_id;
use crate::jobs::{JobCreateParams, JobManager, ResumeCheck};
use crate::production::GenerationSettings;
use crate::providers::Collaborators;

use super::stage::{StageContext, StageOutcome, StageOutput};
use super::stages;
use super::steps::{ExecutionPlan, PipelineStep};

/// Tuning for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Wait between render status polls
    pub render_poll_interval: Duration,

    /// Polls before a render counts as timed out
    pub render_max_poll_attempts: u32,

    /// Scenes composed into shots at the same time
    pub shot_composition_concurrency: usize,

    /// How long a run holds the job lease
    pub lease_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            render_poll_interval: Duration::from_millis(5000),
            render_max_poll_attempts: 120,
            shot_composition_concurrency: 4,
            lease_ttl: Duration::from_secs(3600),
        }
    }
}

impl PipelineConfig {
    pub fn with_render_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.render_poll_interval = interval;
        self.render_max_poll_attempts = max_attempts;
        self
    }

    pub fn with_shot_composition_concurrency(mut self, concurrency: usize) -> Self {
        self.shot_composition_concurrency = concurrency;
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }
}

/// Where to pick a failed job back up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeRequest {
    pub job_id: String,
    pub from_step: u8,
}

impl ResumeRequest {
    pub fn new(job_id: impl Into<String>, from_step: u8) -> Self {
        Self {
            job_id: job_id.into(),
            from_step,
        }
    }
}

/// Outcome of one `run` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    /// Absent when the run was rejected before a job existed
    pub job_id: Option<String>,
    pub total_cost: f64,
    pub error: Option<String>,
    pub failed_step: Option<u8>,
    /// Whether running again (or resuming) may succeed
    pub retryable: bool,
    pub completed_steps: Vec<u8>,
}

impl GenerationResult {
    fn rejected(job_id: Option<String>, error: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            job_id,
            total_cost: 0.0,
            error: Some(error.into()),
            failed_step: None,
            retryable,
            completed_steps: Vec::new(),
        }
    }
}

type StepProgress = Arc<dyn Fn(PipelineStep, usize, usize) + Send + Sync>;

pub struct PipelineController {
    jobs: JobManager,
    collaborators: Collaborators,
    config: PipelineConfig,
    /// Lease owner id of this controller
    owner: String,
    progress: Option<StepProgress>,
}

impl PipelineController {
    pub fn new(jobs: JobManager, collaborators: Collaborators, config: PipelineConfig) -> Self {
        Self {
            jobs,
            collaborators,
            config,
            owner: format!("run-{}", Uuid::new_v4()),
            progress: None,
        }
    }

    /// Called with `(step, index, total)` as each stage starts
    pub fn with_progress(
        mut self,
        callback: impl Fn(PipelineStep, usize, usize) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Run a job from the start, or resume one from a given step
    pub async fn run(
        &self,
        brief: &str,
        settings: &GenerationSettings,
        user_id: &str,
        resume: Option<ResumeRequest>,
    ) -> GenerationResult {
        if let Err(e) = settings.validate() {
            error!("Invalid settings: {}", e);
            let job_id = resume.map(|r| r.job_id);
            return GenerationResult::rejected(job_id, e.to_string(), false);
        }

        let plan = ExecutionPlan::for_settings(settings);
        let (job, from) = match resume {
            None => match self.create(brief, settings, user_id, &plan).await {
                Ok(job) => {
                    if let Err(rejection) = self.take_lease(&job.id).await {
                        return *rejection;
                    }
                    (job, plan.first())
                }
                Err(e) => {
                    error!("Failed to create job: {}", e);
                    return GenerationResult::rejected(None, e.to_string(), true);
                }
            },
            Some(request) => match self.prepare_resume(brief, settings, &request, &plan).await {
                Ok(prepared) => prepared,
                Err(rejection) => return *rejection,
            },
        };

        let job_id = job.id.clone();
        let result = self.execute(job, from, &plan).await;
        self.release_lease(&job_id).await;
        result
    }

    /// Resume a job with the brief and settings it was created with
    pub async fn resume(&self, job_id: &str, from_step: u8) -> GenerationResult {
        let job = match self.jobs.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                return GenerationResult::rejected(Some(job_id.to_string()), "job not found", false);
            }
            Err(e) => return GenerationResult::rejected(Some(job_id.to_string()), e.to_string(), true),
        };

        self.run(
            &job.brief,
            &job.settings,
            &job.user_id,
            Some(ResumeRequest::new(job_id, from_step)),
        )
        .await
    }

    async fn create(
        &self,
        brief: &str,
        settings: &GenerationSettings,
        user_id: &str,
        plan: &ExecutionPlan,
    ) -> anyhow::Result<GenerationJob> {
        let visual_world = serde_json::to_string(&settings.visual_world)?;
        let step = PipelineStep::VisualWorld;

        self.jobs
            .create_job(
                JobCreateParams::new(brief, settings.clone(), user_id),
                plan.first().number(),
                |job_id| {
                    vec![StageOutputRecord::new(job_id, step.number(), step.key(), visual_world, 0.0)]
                },
            )
            .await
    }

    async fn prepare_resume(
        &self,
        brief: &str,
        settings: &GenerationSettings,
        request: &ResumeRequest,
        plan: &ExecutionPlan,
    ) -> Result<(GenerationJob, PipelineStep), Box<GenerationResult>> {
        let job_id = Some(request.job_id.clone());
        let from = plan
            .resume_point(request.from_step)
            .map_err(|e| Box::new(GenerationResult::rejected(job_id.clone(), e.to_string(), false)))?;

        // The job is only read once the lease is held, so a run that finished
        // in the meantime is seen as finished
        self.take_lease(&request.job_id).await?;

        let check = match self
            .jobs
            .check_resume(&request.job_id, brief, settings, &plan.prerequisites(from))
            .await
        {
            Ok(check) => check,
            Err(e) => {
                self.release_lease(&request.job_id).await;
                return Err(Box::new(GenerationResult::rejected(job_id, e.to_string(), true)));
            }
        };

        match check {
            ResumeCheck::Ready { job } => {
                info!(
                    "Resuming job {} from step {} ({})",
                    short_id(&job.id),
                    from.number(),
                    from
                );
                Ok((*job, from))
            }
            refused => {
                self.release_lease(&request.job_id).await;
                let reason = refused.refusal().unwrap_or_default();
                warn!("Cannot resume job {}: {}", request.job_id, reason);
                Err(Box::new(GenerationResult::rejected(job_id, reason, false)))
            }
        }
    }

    async fn take_lease(&self, job_id: &str) -> Result<(), Box<GenerationResult>> {
        let id = Some(job_id.to_string());
        match self.jobs.acquire_lease(job_id, &self.owner, self.config.lease_ttl).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Box::new(GenerationResult::rejected(
                id,
                "job is already being run elsewhere",
                true,
            ))),
            Err(e) => {
                // Leasing an unknown job fails; report it as missing, not as retryable
                if let Ok(None) = self.jobs.get_job(job_id).await {
                    return Err(Box::new(GenerationResult::rejected(id, "job not found", false)));
                }
                error!("Failed to acquire lease on job {}: {}", job_id, e);
                Err(Box::new(GenerationResult::rejected(id, e.to_string(), true)))
            }
        }
    }

    async fn release_lease(&self, job_id: &str) {
        if let Err(e) = self.jobs.release_lease(job_id, &self.owner).await {
            warn!("Failed to release lease on job {}: {}", short_id(job_id), e);
        }
    }

    async fn execute(
        &self,
        mut job: GenerationJob,
        from: PipelineStep,
        plan: &ExecutionPlan,
    ) -> GenerationResult {
        let run_start = Instant::now();
        job.begin_run(from.number());
        if let Err(e) = self.jobs.save(&job).await {
            return self.fail(job, from, StageError::Storage(e)).await;
        }

        let steps = plan.from_step(from);
        let total = steps.len();
        for (index, step) in steps.into_iter().enumerate() {
            let Some(stage) = stages::stage_for(step) else {
                continue;
            };
            if let Some(progress) = &self.progress {
                progress(step, index, total);
            }

            info!(
                "[{}] Step {} ({}) starting",
                short_id(&job.id),
                step.number(),
                step
            );
            let step_start = Instant::now();

            let ctx = StageContext {
                job: &job,
                collaborators: &self.collaborators,
                repository: self.jobs.repository(),
                config: &self.config,
            };
            let output = match absorb_best_effort(step, stage.execute(&ctx).await) {
                Ok(output) => output,
                Err(e) => return self.fail(job, step, e).await,
            };

            if let StageOutcome::BestEffortFailed { reason } = &output.outcome {
                warn!("Step {} ({}) did not complete its work: {}", step.number(), step, reason);
            }

            let payload = match serde_json::to_string(&output.payload) {
                Ok(payload) => payload,
                Err(e) => return self.fail(job, step, e.into()).await,
            };
            let record = StageOutputRecord::new(&job.id, step.number(), step.key(), payload, output.cost);

            let mut next = job.clone();
            next.complete_step(
                step.number(),
                plan.next_after(step).map(|s| s.number()),
                output.cost,
            );
            if let Err(e) = self.jobs.commit_stage(&next, record).await {
                return self.fail(job, step, StageError::Storage(e)).await;
            }
            job = next;

            info!(
                "[{}] Step {} ({}) finished in {:.1}s, cost {:.4} (total {:.4})",
                short_id(&job.id),
                step.number(),
                step,
                step_start.elapsed().as_secs_f64(),
                output.cost,
                job.total_cost
            );
        }

        job.complete();
        if let Err(e) = self.jobs.save(&job).await {
            let last = plan.steps().last().copied().unwrap_or(from);
            return self.fail(job, last, StageError::Storage(e)).await;
        }

        info!(
            "[{}] Job completed in {:.1}s, total cost {:.4}",
            short_id(&job.id),
            run_start.elapsed().as_secs_f64(),
            job.total_cost
        );

        GenerationResult {
            success: true,
            job_id: Some(job.id),
            total_cost: job.total_cost,
            error: None,
            failed_step: None,
            retryable: false,
            completed_steps: job.completed_steps,
        }
    }

    async fn fail(&self, mut job: GenerationJob, step: PipelineStep, error: StageError) -> GenerationResult {
        let message = error.to_string();
        error!(
            "[{}] Job failed at step {} ({}): {}",
            short_id(&job.id),
            step.number(),
            step,
            message
        );

        job.fail(step.number(), message.clone());
        if let Err(e) = self.jobs.save(&job).await {
            error!("Failed to record failure of job {}: {}", job.id, e);
        }

        GenerationResult {
            success: false,
            job_id: Some(job.id),
            total_cost: job.total_cost,
            error: Some(message),
            failed_step: Some(step.number()),
            retryable: true,
            completed_steps: job.completed_steps,
        }
    }
}

/// A best-effort step that errors is recorded as not having done its work
fn absorb_best_effort(
    step: PipelineStep,
    result: Result<StageOutput, StageError>,
) -> Result<StageOutput, StageError> {
    match result {
        Err(e) if step.is_best_effort() => {
            let reason = e.to_string();
            StageOutput::best_effort_failed(&serde_json::json!({ "error": reason }), 0.0, reason)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::JobStatus;
    use crate::providers::mock::{MockBehavior, MockOperation, MockStudio};

    fn controller(studio: MockStudio) -> PipelineController {
        PipelineController::new(
            JobManager::new_in_memory().unwrap(),
            Collaborators::from_studio(Arc::new(studio)),
            PipelineConfig::default().with_render_polling(Duration::from_millis(1), 5),
        )
    }

    #[tokio::test]
    async fn test_run_withWorkingStudio_shouldCompleteEveryExecutedStep() {
        let controller = controller(MockStudio::new());

        let result = controller
            .run("forest rain", &GenerationSettings::default(), "user-1", None)
            .await;

        assert!(result.success, "run failed: {:?}", result.error);
        assert_eq!(result.completed_steps, vec![1, 3, 4, 5, 6, 7]);
        assert!(result.total_cost > 0.0);

        let job = controller
            .jobs()
            .get_job(result.job_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_run_withFailingMusic_shouldFailAtSoundscape() {
        let controller =
            controller(MockStudio::new().with_behavior(MockOperation::Music, MockBehavior::Failing));

        let result = controller
            .run("forest rain", &GenerationSettings::default(), "user-1", None)
            .await;

        assert!(!result.success);
        assert!(result.retryable);
        assert_eq!(result.failed_step, Some(5));
        assert_eq!(result.completed_steps, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_run_withInvalidSettings_shouldRejectWithoutJob() {
        let controller = controller(MockStudio::new());
        let mut settings = GenerationSettings::default();
        settings.pacing = 150;

        let result = controller.run("forest rain", &settings, "user-1", None).await;

        assert!(!result.success);
        assert!(!result.retryable);
        assert!(result.job_id.is_none());
        assert!(controller.jobs().list_jobs(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_fromVisualWorld_shouldBeRejected() {
        let controller = controller(MockStudio::new());
        let first = controller
            .run("forest rain", &GenerationSettings::default(), "user-1", None)
            .await;

        let result = controller.resume(first.job_id.as_deref().unwrap(), 2).await;

        assert!(!result.success);
        assert!(!result.retryable);
    }

    #[test]
    fn test_absorbBestEffort_publishError_shouldBecomeBestEffortFailure() {
        let output = absorb_best_effort(
            PipelineStep::Publish,
            Err(StageError::InvalidOutput("no post id".to_string())),
        )
        .unwrap();

        assert!(matches!(output.outcome, StageOutcome::BestEffortFailed { .. }));
        let payload: crate::pipeline::stages::PublishOutput = serde_json::from_value(output.payload).unwrap();
        assert!(payload.receipt.is_none());
        assert!(payload.error.unwrap().contains("no post id"));
    }

    #[test]
    fn test_absorbBestEffort_exportError_shouldStayAnError() {
        let result = absorb_best_effort(
            PipelineStep::Export,
            Err(StageError::InvalidOutput("bad render".to_string())),
        );

        assert!(result.is_err());
    }
}
