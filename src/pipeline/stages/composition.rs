/*!
 * Step 4: resolve continuity and generate the media of every shot.
 *
 * The stage itself only fails on persistence errors. Individual shot
 * failures are recorded on their results and as failed shot versions.
 */

use async_trait::async_trait;
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::continuity::{ContinuityGroup, ContinuityResolver, DroppedGroup, Inheritance};
use crate::database::repository::Repository;
use crate::errors::{ProviderError, ShotFailure, StageError};
use crate::generation::{BatchGenerationScheduler, ShotAttempt, ShotGenerator, ShotResult, ShotWorkItem};
use crate::pipeline::prompts;
use crate::pipeline::stage::{Stage, StageContext, StageOutput};
use crate::pipeline::steps::PipelineStep;
use crate::production::{
    AnimationMode, FrameMode, GenerationSettings, Scene, SceneId, ShotArtifacts, ShotId,
    ShotPrompts, ShotVersion, ShotVersionStatus, VisualWorld,
};
use crate::providers::{ClipRequest, Collaborators, ImageRequest};

use super::atmosphere::AtmosphereOutput;
use super::flow_design::FlowDesignOutput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionOutput {
    pub groups: Vec<ContinuityGroup>,
    pub dropped: Vec<DroppedGroup>,
    pub inheritance: BTreeMap<ShotId, Inheritance>,
    pub results: Vec<ShotResult>,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Generates shot media through the studio collaborators and records every
/// attempt as a new shot version
pub struct StudioShotGenerator {
    collaborators: Collaborators,
    repository: Repository,
    job_id: String,
    settings: GenerationSettings,
    world: VisualWorld,
    atmosphere: String,
    scenes: HashMap<SceneId, Scene>,
    storage_error: Mutex<Option<String>>,
}

impl StudioShotGenerator {
    pub fn new(
        collaborators: Collaborators,
        repository: Repository,
        job_id: &str,
        settings: GenerationSettings,
        world: VisualWorld,
        atmosphere: &str,
        scenes: &[Scene],
    ) -> Self {
        Self {
            collaborators,
            repository,
            job_id: job_id.to_string(),
            settings,
            world,
            atmosphere: atmosphere.to_string(),
            scenes: scenes.iter().map(|s| (s.id.clone(), s.clone())).collect(),
            storage_error: Mutex::new(None),
        }
    }

    /// First persistence error hit while recording versions, if any
    pub fn take_storage_error(&self) -> Option<String> {
        self.storage_error.lock().take()
    }

    async fn still(
        &self,
        prompt: Option<&String>,
        reference: Option<&str>,
        cost: &mut f64,
    ) -> Result<String, ProviderError> {
        let prompt = prompt
            .cloned()
            .ok_or_else(|| ProviderError::RequestFailed("missing frame prompt".to_string()))?;
        let generated = self
            .collaborators
            .image
            .generate_image(ImageRequest {
                prompt,
                reference_image: reference.map(str::to_string),
                model: self.settings.models.image.clone(),
            })
            .await?;
        *cost += generated.cost;
        Ok(generated.value)
    }

    async fn clip(
        &self,
        item: &ShotWorkItem,
        prompts: &ShotPrompts,
        start_frame: String,
        end_frame: Option<String>,
        cost: &mut f64,
    ) -> Result<String, ProviderError> {
        let generated = self
            .collaborators
            .clip
            .generate_clip(ClipRequest {
                start_frame,
                end_frame,
                prompt: prompts.clip.clone().unwrap_or_else(|| item.shot.description.clone()),
                duration: item.shot.duration,
                model: self.settings.models.video.clone(),
            })
            .await?;
        *cost += generated.cost;
        Ok(generated.value)
    }

    /// Produce the media the frame and animation modes call for, filling
    /// `artifacts` as each piece arrives
    async fn produce(
        &self,
        item: &ShotWorkItem,
        prompts: &ShotPrompts,
        inherited_start: Option<&str>,
        artifacts: &mut ShotArtifacts,
        cost: &mut f64,
    ) -> Result<(), ProviderError> {
        let animate = self.settings.animation_mode == AnimationMode::VideoAnimation;
        let reference = self.world.reference_image_url.as_deref();

        match self.settings.frame_mode {
            FrameMode::ImageReference => {
                let image = self.still(prompts.image.as_ref(), reference, cost).await?;
                artifacts.image_url = Some(image.clone());
                if animate {
                    artifacts.clip_url = Some(self.clip(item, prompts, image, None, cost).await?);
                }
            }
            FrameMode::StartEndFrame => {
                let start = match inherited_start {
                    Some(url) => url.to_string(),
                    None => self.still(prompts.start_frame.as_ref(), reference, cost).await?,
                };
                artifacts.start_frame_url = Some(start.clone());

                let end = self.still(prompts.end_frame.as_ref(), Some(&start), cost).await?;
                artifacts.end_frame_url = Some(end.clone());

                if animate {
                    artifacts.clip_url =
                        Some(self.clip(item, prompts, start, Some(end), cost).await?);
                } else {
                    artifacts.image_url = Some(start);
                }
            }
        }
        Ok(())
    }

    async fn record(&self, version: ShotVersion) {
        if let Err(e) = self.repository.append_shot_version(&self.job_id, version).await {
            warn!("Failed to record shot version: {}", e);
            let mut slot = self.storage_error.lock();
            if slot.is_none() {
                *slot = Some(e.to_string());
            }
        }
    }
}

#[async_trait]
impl ShotGenerator for StudioShotGenerator {
    async fn generate(
        &self,
        item: &ShotWorkItem,
        inherited_start: Option<&str>,
    ) -> Result<ShotAttempt, ShotFailure> {
        let scene = self
            .scenes
            .get(&item.shot.scene_id)
            .ok_or_else(|| ShotFailure::new(format!("unknown scene {}", item.shot.scene_id), 0.0))?;
        let prompts = prompts::shot_prompts(scene, &item.shot, &self.world, &self.atmosphere, &self.settings);

        let mut artifacts = ShotArtifacts::default();
        let mut cost = 0.0;
        let outcome = self
            .produce(item, &prompts, inherited_start, &mut artifacts, &mut cost)
            .await;

        let (status, error) = match &outcome {
            Ok(()) => (ShotVersionStatus::Completed, None),
            Err(e) => (ShotVersionStatus::Failed, Some(e.to_string())),
        };
        self.record(ShotVersion {
            shot_id: item.shot.id.clone(),
            version: 0,
            prompts,
            artifacts: artifacts.clone(),
            status,
            error,
            cost,
        })
        .await;

        match outcome {
            Ok(()) => Ok(ShotAttempt { artifacts, cost }),
            Err(e) => Err(ShotFailure::new(e.to_string(), cost)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompositionStage;

#[async_trait]
impl Stage for CompositionStage {
    fn step(&self) -> PipelineStep {
        PipelineStep::Composition
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let settings = ctx.settings();
        let flow: FlowDesignOutput = ctx.input(PipelineStep::FlowDesign).await?;
        let world: VisualWorld = ctx.input(PipelineStep::VisualWorld).await?;
        let atmosphere: AtmosphereOutput = ctx.input(PipelineStep::Atmosphere).await?;
        let board = &flow.board;

        let resolver = ContinuityResolver::new();
        let resolution = if settings.uses_frame_inheritance() {
            resolver.resolve(&board.shots_by_scene, &flow.groups)
        } else {
            info!(
                "Frame inheritance off (continuity {}, frame mode {}), every shot is independent",
                if settings.continuity.enabled { "on" } else { "off" },
                settings.frame_mode
            );
            resolver.resolve(&board.shots_by_scene, &[])
        };
        info!(
            "Continuity: {} groups kept, {} dropped, {} shots inherit",
            resolution.groups.len(),
            resolution.dropped.len(),
            resolution.inheriting_count()
        );

        let existing_end_frames: Vec<(ShotId, String)> = ctx
            .repository
            .latest_shot_versions(ctx.job_id())
            .await?
            .into_iter()
            .filter_map(|(shot_id, version)| version.artifacts.end_frame_url.map(|url| (shot_id, url)))
            .collect();

        let items: Vec<ShotWorkItem> = board
            .playback_order()
            .into_iter()
            .map(|(scene_sequence, shot)| ShotWorkItem::new(scene_sequence, shot.clone()))
            .collect();

        let generator = StudioShotGenerator::new(
            ctx.collaborators.clone(),
            ctx.repository.clone(),
            ctx.job_id(),
            settings.clone(),
            world,
            &atmosphere.mood_description,
            &board.scenes,
        );
        let report = BatchGenerationScheduler::new()
            .process_all(items, &resolution.inheritance, existing_end_frames, &generator)
            .await;

        if let Some(error) = generator.take_storage_error() {
            return Err(StageError::Storage(anyhow::anyhow!(
                "failed to record shot versions: {}",
                error
            )));
        }

        StageOutput::completed(
            &CompositionOutput {
                groups: resolution.groups,
                dropped: resolution.dropped,
                inheritance: resolution.inheritance,
                success_count: report.success_count,
                failure_count: report.failure_count,
                results: report.results,
            },
            report.total_cost,
        )
    }
}
