use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::database::{DatabaseConnection, JobStatus, Repository};
use crate::errors::AppError;
use crate::jobs::{JobManager, JobStatusView};
use crate::pipeline::{GenerationResult, PipelineController, PipelineStep};
use crate::production::GenerationSettings;
use crate::providers::gateway::StudioGateway;
use crate::providers::mock::MockStudio;
use crate::providers::Collaborators;

// @module: Application controller for generation runs

/// Main application controller wiring config, storage and collaborators
pub struct Controller {
    // @field: App configuration
    config: Config,
    pipeline: PipelineController,
    /// Kept for the pre-run reachability check; absent in dry runs
    gateway: Option<Arc<StudioGateway>>,
    progress: ProgressBar,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config, dry_run: bool) -> Result<Self> {
        config
            .validate(dry_run)
            .context("Configuration validation failed")?;

        let db_path = config.database_path()?;
        let db = DatabaseConnection::new(&db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        let jobs = JobManager::new(Repository::new(db));

        if dry_run {
            info!("Dry run: using the built-in mock studio");
            let collaborators = Collaborators::from_studio(Arc::new(MockStudio::new()));
            return Ok(Self::assemble(config, jobs, collaborators, None));
        }

        let gateway = Arc::new(StudioGateway::new(
            &config.gateway.endpoint,
            config.gateway.api_key.clone(),
            config.gateway.timeout(),
        )?);
        let mut collaborators = Collaborators::from_studio(gateway.clone());
        if !config.gateway.publishing {
            collaborators = collaborators.without_publisher();
        }

        Ok(Self::assemble(config, jobs, collaborators, Some(gateway)))
    }

    /// Create a controller over explicit storage and collaborators
    pub fn with_collaborators(config: Config, jobs: JobManager, collaborators: Collaborators) -> Self {
        Self::assemble(config, jobs, collaborators, None)
    }

    fn assemble(
        config: Config,
        jobs: JobManager,
        collaborators: Collaborators,
        gateway: Option<Arc<StudioGateway>>,
    ) -> Self {
        let progress = Self::step_progress_bar();
        let bar = progress.clone();
        let pipeline = PipelineController::new(jobs, collaborators, config.pipeline.to_pipeline_config())
            .with_progress(move |step: PipelineStep, index: usize, total: usize| {
                bar.set_length(total as u64);
                bar.set_position(index as u64);
                bar.set_message(step.to_string());
            });

        Self {
            config,
            pipeline,
            gateway,
            progress,
        }
    }

    fn step_progress_bar() -> ProgressBar {
        let progress_bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} steps {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("=>-"));
        progress_bar
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn jobs(&self) -> &JobManager {
        self.pipeline.jobs()
    }

    /// Run a new job. `settings` falls back to the configured defaults.
    pub async fn run(
        &self,
        brief: &str,
        settings: Option<GenerationSettings>,
        user_id: &str,
    ) -> GenerationResult {
        self.check_gateway().await;

        let settings = settings.unwrap_or_else(|| self.config.defaults.clone());
        let start_time = Instant::now();
        let result = self.pipeline.run(brief, &settings, user_id, None).await;
        self.finish(&result, start_time.elapsed());
        result
    }

    /// Resume an existing job from `from_step`
    pub async fn resume(&self, job_id: &str, from_step: u8) -> GenerationResult {
        self.check_gateway().await;

        let start_time = Instant::now();
        let result = self.pipeline.resume(job_id, from_step).await;
        self.finish(&result, start_time.elapsed());
        result
    }

    pub async fn status(&self, job_id: &str) -> Result<Option<JobStatusView>> {
        self.jobs().status(job_id).await
    }

    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<JobStatusView>> {
        self.jobs().list_jobs(status).await
    }

    /// Delete jobs older than `days`
    pub async fn cleanup(&self, days: i64) -> Result<usize> {
        let deleted = self.jobs().cleanup_old_jobs(days).await?;
        info!("Removed {} job(s) older than {} days", deleted, days);
        Ok(deleted)
    }

    /// Load per-run settings from a JSON file; missing fields take their defaults
    pub fn load_settings(path: &Path) -> Result<GenerationSettings, AppError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!("invalid settings file {}: {}", path.display(), e))
        })
    }

    async fn check_gateway(&self) {
        if let Some(gateway) = &self.gateway {
            if let Err(e) = gateway.test_connection().await {
                warn!("Generation service health check failed: {}", e);
            }
        }
    }

    fn finish(&self, result: &GenerationResult, elapsed: Duration) {
        self.progress.finish_and_clear();

        let job = result.job_id.as_deref().unwrap_or("-");
        if result.success {
            info!(
                "Job {} completed in {} (cost {:.4})",
                job,
                Self::format_duration(elapsed),
                result.total_cost
            );
        } else {
            error!(
                "Job {} failed after {}: {}",
                job,
                Self::format_duration(elapsed),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    /// Format duration in a human-readable format
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:01}s", seconds, duration.subsec_millis() / 100)
        }
    }
}
