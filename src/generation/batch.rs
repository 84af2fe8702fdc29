/*!
 * Dependency-ordered batch generation of shots.
 *
 * Shots are processed strictly one at a time in (scene, shot) order, because
 * an inheriting shot needs the end frame its predecessor has just produced.
 * Each shot gets one retry; a shot that still fails is recorded and the batch
 * moves on.
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::continuity::Inheritance;
use crate::errors::ShotFailure;
use crate::production::{Shot, ShotArtifacts, ShotId};

use super::frames::FrameIndex;

/// A shot queued for generation, with its scene's sequence number for ordering
#[derive(Debug, Clone, PartialEq)]
pub struct ShotWorkItem {
    pub scene_sequence: u32,
    pub shot: Shot,
}

impl ShotWorkItem {
    pub fn new(scene_sequence: u32, shot: Shot) -> Self {
        Self {
            scene_sequence,
            shot,
        }
    }

    fn order_key(&self) -> (u32, u32) {
        (self.scene_sequence, self.shot.sequence_number)
    }
}

/// A successful generation attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ShotAttempt {
    pub artifacts: ShotArtifacts,
    pub cost: f64,
}

/// Produces the media for one shot.
///
/// `inherited_start` carries the predecessor's end frame when the shot is
/// chained; implementations must use it instead of generating a start frame.
#[async_trait]
pub trait ShotGenerator: Send + Sync {
    async fn generate(
        &self,
        item: &ShotWorkItem,
        inherited_start: Option<&str>,
    ) -> Result<ShotAttempt, ShotFailure>;

    /// Second attempt after a failure; defaults to generating again
    async fn retry(
        &self,
        item: &ShotWorkItem,
        inherited_start: Option<&str>,
    ) -> Result<ShotAttempt, ShotFailure> {
        self.generate(item, inherited_start).await
    }
}

/// Final outcome for one shot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotResult {
    pub shot_id: ShotId,
    pub scene_sequence: u32,
    pub shot_sequence: u32,
    /// Whether the start frame came from the previous shot
    pub inherit_start_frame: bool,
    #[serde(default)]
    pub inherited_from: Option<ShotId>,
    #[serde(default)]
    pub artifacts: Option<ShotArtifacts>,
    pub attempts: u32,
    pub cost: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl ShotResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate of a whole batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<ShotResult>,
    pub total_cost: f64,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchReport {
    pub fn result_for(&self, shot_id: &str) -> Option<&ShotResult> {
        self.results.iter().find(|r| r.shot_id == shot_id)
    }
}

type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Sequential scheduler honoring frame inheritance
#[derive(Default)]
pub struct BatchGenerationScheduler {
    progress_callback: Option<ProgressCallback>,
}

impl BatchGenerationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `(processed, total)` after every shot
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Generate every shot in (scene, shot) order.
    ///
    /// `existing_end_frames` seeds the frame index with end frames recorded by
    /// an earlier partial run so a resumed batch can still chain off them.
    pub async fn process_all<I>(
        &self,
        mut shots: Vec<ShotWorkItem>,
        inheritance: &BTreeMap<ShotId, Inheritance>,
        existing_end_frames: I,
        generator: &dyn ShotGenerator,
    ) -> BatchReport
    where
        I: IntoIterator<Item = (ShotId, String)>,
    {
        shots.sort_by_key(ShotWorkItem::order_key);

        let mut frames = FrameIndex::seeded(existing_end_frames);
        let total = shots.len();
        let mut report = BatchReport::default();

        info!(
            "Generating {} shots ({} end frames carried over)",
            total,
            frames.len()
        );

        for (index, item) in shots.iter().enumerate() {
            let start_time = Instant::now();
            let shot_id = item.shot.id.clone();

            let predecessor = inheritance
                .get(&shot_id)
                .filter(|i| !i.is_first)
                .and_then(|i| i.previous_shot_id.clone());
            let inherited_start = predecessor
                .as_deref()
                .and_then(|prev| frames.end_frame(prev))
                .map(str::to_string);

            if predecessor.is_some() && inherited_start.is_none() {
                debug!(
                    "Shot {} should inherit but no end frame is available, generating its own start",
                    shot_id
                );
            }

            let mut cost = 0.0;
            let mut attempts = 1;
            let outcome = match generator.generate(item, inherited_start.as_deref()).await {
                Ok(attempt) => Ok(attempt),
                Err(failure) => {
                    cost += failure.cost;
                    attempts += 1;
                    warn!(
                        "Shot {} (scene {}, shot {}) failed: {}. Retrying once",
                        shot_id, item.scene_sequence, item.shot.sequence_number, failure.message
                    );
                    generator.retry(item, inherited_start.as_deref()).await
                }
            };

            let result = match outcome {
                Ok(attempt) => {
                    cost += attempt.cost;
                    if let Some(end_frame) = attempt.artifacts.end_frame_url.as_deref() {
                        frames.record(&shot_id, end_frame);
                    }
                    report.success_count += 1;
                    ShotResult {
                        shot_id: shot_id.clone(),
                        scene_sequence: item.scene_sequence,
                        shot_sequence: item.shot.sequence_number,
                        inherit_start_frame: inherited_start.is_some(),
                        inherited_from: inherited_start.as_ref().and(predecessor.clone()),
                        artifacts: Some(attempt.artifacts),
                        attempts,
                        cost,
                        error: None,
                    }
                }
                Err(failure) => {
                    cost += failure.cost;
                    warn!("Shot {} failed after {} attempts: {}", shot_id, attempts, failure.message);
                    report.failure_count += 1;
                    ShotResult {
                        shot_id: shot_id.clone(),
                        scene_sequence: item.scene_sequence,
                        shot_sequence: item.shot.sequence_number,
                        inherit_start_frame: inherited_start.is_some(),
                        inherited_from: inherited_start.as_ref().and(predecessor.clone()),
                        artifacts: None,
                        attempts,
                        cost,
                        error: Some(failure.message),
                    }
                }
            };

            debug!("Shot {} done in {:?}", shot_id, start_time.elapsed());

            report.total_cost += result.cost;
            report.results.push(result);

            if let Some(callback) = &self.progress_callback {
                callback(index + 1, total);
            }
        }

        info!(
            "Shot generation finished: {} succeeded, {} failed, cost {:.4}",
            report.success_count, report.failure_count, report.total_cost
        );

        report
    }
}
