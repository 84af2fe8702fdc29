/*!
 * Step 3: scene breakdown and shot composition.
 *
 * The scene count is bounded by the pacing rules; scene durations are then
 * normalized to sum exactly to the duration bucket. Each scene is composed
 * into shots independently, so scenes are composed concurrently and the
 * results put back in scene order.
 */

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::continuity::{GroupStatus, ProposedGroup};
use crate::errors::StageError;
use crate::pipeline::prompts;
use crate::pipeline::stage::{Stage, StageContext, StageOutput};
use crate::pipeline::steps::PipelineStep;
use crate::production::pacing::{normalize_tenths, normalize_whole_seconds, scene_bounds, shot_bounds};
use crate::production::{CountBounds, GenerationSettings, Scene, Shot, StoryBoard};
use crate::providers::TextGenerator;

use super::atmosphere::AtmosphereOutput;

pub fn scene_id(sequence_number: u32) -> String {
    format!("scene-{:02}", sequence_number)
}

pub fn shot_id(scene_id: &str, sequence_number: u32) -> String {
    format!("{}-shot-{:02}", scene_id, sequence_number)
}

#[derive(Debug, Deserialize)]
struct SceneBreakdown {
    scenes: Vec<ProposedScene>,
}

#[derive(Debug, Deserialize)]
struct ProposedScene {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct ShotComposition {
    shots: Vec<ProposedShot>,
    #[serde(default)]
    continuity_groups: Vec<ProposedContinuity>,
}

#[derive(Debug, Deserialize)]
struct ProposedShot {
    description: String,
    #[serde(default = "default_camera_movement")]
    camera_movement: String,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct ProposedContinuity {
    shot_numbers: Vec<u32>,
    #[serde(default)]
    transition: String,
}

fn default_camera_movement() -> String {
    "static".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDesignOutput {
    pub board: StoryBoard,
    /// Continuity groups as proposed, keyed to shot ids
    pub groups: Vec<ProposedGroup>,
    pub scene_bounds: CountBounds,
}

/// Shots and groups composed for one scene
struct ComposedScene {
    shots: Vec<Shot>,
    groups: Vec<ProposedGroup>,
    cost: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FlowDesignStage;

impl FlowDesignStage {
    async fn break_down_scenes(
        &self,
        ctx: &StageContext<'_>,
        atmosphere: &str,
        bounds: &CountBounds,
    ) -> Result<(Vec<Scene>, f64), StageError> {
        let settings = ctx.settings();
        let request = prompts::scene_breakdown_request(ctx.brief(), atmosphere, settings, bounds);
        let generated = ctx
            .collaborators
            .text
            .generate_text(request)
            .await?
            .parse::<SceneBreakdown>()?;

        let mut proposed = generated.value.scenes;
        if (proposed.len() as u32) < bounds.min {
            return Err(StageError::InvalidOutput(format!(
                "scene breakdown returned {} scenes, at least {} required",
                proposed.len(),
                bounds.min
            )));
        }
        if proposed.len() as u32 > bounds.max {
            debug!(
                "Truncating scene breakdown from {} to {} scenes",
                proposed.len(),
                bounds.max
            );
            proposed.truncate(bounds.max as usize);
        }

        let weights: Vec<f64> = proposed.iter().map(|s| s.duration).collect();
        let durations = normalize_whole_seconds(&weights, settings.duration.seconds());
        let scene_loops = settings.loops.scene_loops();

        let scenes = proposed
            .into_iter()
            .zip(durations)
            .enumerate()
            .map(|(index, (scene, duration))| {
                let sequence_number = index as u32 + 1;
                Scene {
                    id: scene_id(sequence_number),
                    sequence_number,
                    title: scene.title,
                    description: scene.description,
                    duration,
                    loop_count: scene_loops,
                }
            })
            .collect();

        Ok((scenes, generated.cost))
    }
}

async fn compose_scene(
    text: Arc<dyn TextGenerator>,
    scene: Scene,
    scene_total: usize,
    atmosphere: String,
    settings: GenerationSettings,
) -> Result<ComposedScene, StageError> {
    let bounds = shot_bounds(scene.duration, settings.pacing, settings.shots_per_scene.fixed());
    let request = prompts::shot_composition_request(&scene, scene_total, &atmosphere, &settings, &bounds);
    let generated = text.generate_text(request).await?.parse::<ShotComposition>()?;

    let mut proposed = generated.value.shots;
    if (proposed.len() as u32) < bounds.min {
        return Err(StageError::InvalidOutput(format!(
            "scene {} was composed into {} shots, at least {} required",
            scene.sequence_number,
            proposed.len(),
            bounds.min
        )));
    }
    proposed.truncate(bounds.max as usize);

    let weights: Vec<f64> = proposed.iter().map(|s| s.duration).collect();
    let durations = normalize_tenths(&weights, scene.duration);
    let shot_loops = settings.loops.shot_loops();

    let shots: Vec<Shot> = proposed
        .into_iter()
        .zip(durations)
        .enumerate()
        .map(|(index, (shot, duration))| {
            let sequence_number = index as u32 + 1;
            Shot {
                id: shot_id(&scene.id, sequence_number),
                scene_id: scene.id.clone(),
                sequence_number,
                duration,
                camera_movement: shot.camera_movement,
                description: shot.description,
                loop_count: shot_loops,
            }
        })
        .collect();

    let status = if settings.continuity.auto_approve {
        GroupStatus::Approved
    } else {
        GroupStatus::Proposed
    };
    // Numbers past the truncated shot list map to ids that do not exist,
    // which the resolver drops
    let groups = generated
        .value
        .continuity_groups
        .into_iter()
        .enumerate()
        .map(|(index, group)| ProposedGroup {
            id: format!("{}-group-{}", scene.id, index + 1),
            scene_id: scene.id.clone(),
            shot_ids: group
                .shot_numbers
                .iter()
                .map(|n| shot_id(&scene.id, *n))
                .collect(),
            transition: group.transition,
            status,
        })
        .collect();

    Ok(ComposedScene {
        shots,
        groups,
        cost: generated.cost,
    })
}

#[async_trait]
impl Stage for FlowDesignStage {
    fn step(&self) -> PipelineStep {
        PipelineStep::FlowDesign
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let settings = ctx.settings();
        let atmosphere: AtmosphereOutput = ctx.input(PipelineStep::Atmosphere).await?;

        let bounds = scene_bounds(
            f64::from(settings.duration.seconds()),
            settings.pacing,
            settings.scene_count.fixed(),
        );
        let (scenes, breakdown_cost) = self
            .break_down_scenes(ctx, &atmosphere.mood_description, &bounds)
            .await?;
        info!(
            "Scene breakdown: {} scenes (bounds {}-{})",
            scenes.len(),
            bounds.min,
            bounds.max
        );

        let scene_total = scenes.len();
        let concurrency = ctx.config.shot_composition_concurrency.max(1);
        let mut composed = stream::iter(scenes.iter().cloned().enumerate())
            .map(|(index, scene)| {
                let text = ctx.collaborators.text.clone();
                let atmosphere = atmosphere.mood_description.clone();
                let settings = settings.clone();
                async move {
                    let result = compose_scene(text, scene, scene_total, atmosphere, settings).await;
                    (index, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;
        composed.sort_by_key(|(index, _)| *index);

        let mut cost = breakdown_cost;
        let mut shots_by_scene = BTreeMap::new();
        let mut groups = Vec::new();
        for ((_, result), scene) in composed.into_iter().zip(&scenes) {
            let composed = result?;
            debug!(
                "Scene {} composed into {} shots with {} proposed groups",
                scene.sequence_number,
                composed.shots.len(),
                composed.groups.len()
            );
            cost += composed.cost;
            groups.extend(composed.groups);
            shots_by_scene.insert(scene.id.clone(), composed.shots);
        }

        let board = StoryBoard {
            scenes,
            shots_by_scene,
        };
        info!(
            "Flow design: {} scenes, {} shots, {:.1}s total",
            board.scenes.len(),
            board.shot_count(),
            board.total_duration()
        );

        StageOutput::completed(
            &FlowDesignOutput {
                board,
                groups,
                scene_bounds: bounds,
            },
            cost,
        )
    }
}
