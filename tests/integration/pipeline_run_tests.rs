/*!
 * End-to-end pipeline runs against the mock studio
 */

use std::sync::Arc;

use reelsmith::database::JobStatus;
use reelsmith::jobs::JobManager;
use reelsmith::pipeline::stages::{
    CompositionOutput, ExportOutput, FlowDesignOutput, PublishOutput, SoundscapeOutput,
};
use reelsmith::pipeline::{PipelineController, PipelineStep};
use reelsmith::production::{GenerationSettings, ShotVersionStatus};
use reelsmith::providers::mock::{MockBehavior, MockOperation, MockStudio, RenderBehavior};
use reelsmith::providers::Collaborators;
use reelsmith::timeline::TimelineDocument;
use serde::de::DeserializeOwned;
use crate::common;

async fn stage_payload<T: DeserializeOwned>(
    controller: &PipelineController,
    job_id: &str,
    step: PipelineStep,
) -> T {
    let record = controller
        .jobs()
        .repository()
        .get_stage_output(job_id, step.number())
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("no output for step {}", step.number()));
    serde_json::from_str(&record.payload).unwrap()
}

fn publishing_settings() -> GenerationSettings {
    let mut settings = common::forest_rain_settings();
    settings.publish.enabled = true;
    settings.publish.platforms = vec!["youtube".to_string()];
    settings
}

#[tokio::test]
async fn test_run_fullLifecycle_shouldCompleteAndPersistEveryStage() {
    let (controller, studio) = common::controller_with(MockStudio::new());

    let result = controller
        .run("forest rain", &common::forest_rain_settings(), "user-1", None)
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.completed_steps, vec![1, 3, 4, 5, 6, 7]);
    assert!(result.failed_step.is_none());

    let job_id = result.job_id.unwrap();
    let job = controller.jobs().get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!((job.total_cost - result.total_cost).abs() < 1e-9);

    let outputs = controller
        .jobs()
        .repository()
        .list_stage_outputs(&job_id)
        .await
        .unwrap();
    let steps: Vec<u8> = outputs.iter().map(|o| o.step).collect();
    assert_eq!(steps, vec![1, 2, 3, 4, 5, 6, 7]);

    assert_eq!(studio.calls(MockOperation::SubmitRender), 1);
    assert_eq!(studio.calls(MockOperation::Publish), 0);
}

#[tokio::test]
async fn test_run_forestRain_shouldSplitTwoMinutesAcrossBoundedScenes() {
    let (controller, _) = common::controller_with(MockStudio::new());

    let result = controller
        .run("forest rain", &common::forest_rain_settings(), "user-1", None)
        .await;
    assert!(result.success, "run failed: {:?}", result.error);

    let flow: FlowDesignOutput =
        stage_payload(&controller, result.job_id.as_deref().unwrap(), PipelineStep::FlowDesign).await;

    let scene_count = flow.board.scenes.len();
    assert!((4..=8).contains(&scene_count), "{} scenes", scene_count);
    let total: f64 = flow.board.scenes.iter().map(|s| s.duration).sum();
    assert_eq!(total, 120.0);

    for scene in &flow.board.scenes {
        let shots = &flow.board.shots_by_scene[&scene.id];
        let shot_total: f64 = shots.iter().map(|s| s.duration).sum();
        assert!((shot_total - scene.duration).abs() < 1e-6, "scene {}", scene.id);
    }
}

#[tokio::test]
async fn test_run_middleShotFails_shouldContinueBatchAndFinish() {
    let studio = MockStudio::new().fail_when(MockOperation::Clip, "Shot 2 framing");
    let (controller, _) = common::controller_with(studio);

    let result = controller
        .run("forest rain", &GenerationSettings::default(), "user-1", None)
        .await;
    assert!(result.success, "run failed: {:?}", result.error);

    let job_id = result.job_id.unwrap();
    let composition: CompositionOutput =
        stage_payload(&controller, &job_id, PipelineStep::Composition).await;
    let flow: FlowDesignOutput = stage_payload(&controller, &job_id, PipelineStep::FlowDesign).await;

    assert_eq!(composition.failure_count, flow.board.scenes.len());
    assert_eq!(
        composition.success_count,
        flow.board.shot_count() - flow.board.scenes.len()
    );

    let failed = composition
        .results
        .iter()
        .find(|r| r.shot_id == "scene-01-shot-02")
        .unwrap();
    assert!(!failed.is_success());
    assert_eq!(failed.attempts, 2);
    assert!(composition
        .results
        .iter()
        .find(|r| r.shot_id == "scene-01-shot-03")
        .unwrap()
        .is_success());

    let history = controller
        .jobs()
        .repository()
        .shot_history(&job_id, "scene-01-shot-02")
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|v| v.status == ShotVersionStatus::Failed));
    assert_eq!(history[1].version, 2);
}

#[tokio::test]
async fn test_run_chainedShots_shouldStartFromPredecessorEndFrame() {
    let (controller, _) = common::controller_with(MockStudio::new());

    let result = controller
        .run("forest rain", &GenerationSettings::default(), "user-1", None)
        .await;
    assert!(result.success, "run failed: {:?}", result.error);

    let latest = controller
        .jobs()
        .repository()
        .latest_shot_versions(result.job_id.as_deref().unwrap())
        .await
        .unwrap();
    let first = &latest["scene-01-shot-01"].artifacts;
    let second = &latest["scene-01-shot-02"].artifacts;

    assert!(first.end_frame_url.is_some());
    assert_eq!(second.start_frame_url, first.end_frame_url);
}

#[tokio::test]
async fn test_run_failingPublisher_shouldStillComplete() {
    let studio = MockStudio::new().with_behavior(MockOperation::Publish, MockBehavior::Failing);
    let (controller, studio) = common::controller_with(studio);

    let result = controller
        .run("forest rain", &publishing_settings(), "user-1", None)
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.completed_steps, vec![1, 3, 4, 5, 6, 7, 8]);
    assert_eq!(studio.calls(MockOperation::Publish), 1);

    let publish: PublishOutput =
        stage_payload(&controller, result.job_id.as_deref().unwrap(), PipelineStep::Publish).await;
    assert!(publish.receipt.is_none());
    assert!(publish.error.is_some());
}

#[tokio::test]
async fn test_run_withoutPublisher_shouldSkipPublishingGracefully() {
    let controller = PipelineController::new(
        JobManager::new_in_memory().unwrap(),
        Collaborators::from_studio(Arc::new(MockStudio::new())).without_publisher(),
        common::fast_config(),
    );

    let result = controller
        .run("forest rain", &publishing_settings(), "user-1", None)
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    let publish: PublishOutput =
        stage_payload(&controller, result.job_id.as_deref().unwrap(), PipelineStep::Publish).await;
    assert!(publish.receipt.is_none());
    assert!(publish.error.is_some());
}

#[tokio::test]
async fn test_run_workingPublisher_shouldStoreReceipt() {
    let (controller, _) = common::controller_with(MockStudio::new());

    let result = controller
        .run("forest rain", &publishing_settings(), "user-1", None)
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    let publish: PublishOutput =
        stage_payload(&controller, result.job_id.as_deref().unwrap(), PipelineStep::Publish).await;
    assert!(publish.receipt.is_some());
    assert!(publish.error.is_none());
}

#[tokio::test]
async fn test_run_renderNeverFinishes_shouldFailAtExport() {
    let studio = MockStudio::new().with_render(RenderBehavior::NeverFinishes);
    let (controller, studio) = common::controller_with(studio);

    let result = controller
        .run("forest rain", &GenerationSettings::default(), "user-1", None)
        .await;

    assert!(!result.success);
    assert!(result.retryable);
    assert_eq!(result.failed_step, Some(7));
    assert_eq!(result.completed_steps, vec![1, 3, 4, 5, 6]);
    assert_eq!(studio.calls(MockOperation::PollRender), 5);

    let job = controller
        .jobs()
        .get_job(result.job_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failed_step, Some(7));
}

#[tokio::test]
async fn test_run_renderFails_shouldReportRenderError() {
    let studio = MockStudio::new().with_render(RenderBehavior::Fails);
    let (controller, _) = common::controller_with(studio);

    let result = controller
        .run("forest rain", &GenerationSettings::default(), "user-1", None)
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_step, Some(7));
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_run_imageReferenceStills_shouldSkipClipGeneration() {
    let mut settings = GenerationSettings::default();
    settings.animation_mode = reelsmith::production::AnimationMode::ImageTransitions;
    settings.frame_mode = reelsmith::production::FrameMode::ImageReference;
    let (controller, studio) = common::controller_with(MockStudio::new());

    let result = controller.run("forest rain", &settings, "user-1", None).await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(studio.calls(MockOperation::Clip), 0);
    assert!(studio.calls(MockOperation::Image) > 0);
}

#[tokio::test]
async fn test_run_firstSoundEffectFails_shouldSkipItAndComplete() {
    let studio = MockStudio::new().with_behavior(MockOperation::SoundEffect, MockBehavior::FailTimes(1));
    let (controller, studio) = common::controller_with(studio);
    let mut settings = common::forest_rain_settings();
    settings.sound_effects.enabled = true;

    let result = controller.run("forest rain", &settings, "user-1", None).await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.completed_steps, vec![1, 3, 4, 5, 6, 7]);

    let job_id = result.job_id.unwrap();
    let flow: FlowDesignOutput = stage_payload(&controller, &job_id, PipelineStep::FlowDesign).await;
    let soundscape: SoundscapeOutput = stage_payload(&controller, &job_id, PipelineStep::Soundscape).await;
    assert_eq!(soundscape.skipped_sound_effects, vec!["scene-01-shot-01".to_string()]);
    assert_eq!(soundscape.audio.sound_effects.len(), flow.board.shot_count() - 1);
    assert!(!soundscape.audio.sound_effects.contains_key("scene-01-shot-01"));
    assert_eq!(studio.calls(MockOperation::SoundEffect), flow.board.shot_count());
}

#[tokio::test]
async fn test_run_voiceoverFails_shouldFailAtSoundscape() {
    let studio = MockStudio::new().with_behavior(MockOperation::Speech, MockBehavior::Failing);
    let (controller, _) = common::controller_with(studio);
    let mut settings = common::forest_rain_settings();
    settings.voiceover.enabled = true;

    let result = controller.run("forest rain", &settings, "user-1", None).await;

    assert!(!result.success);
    assert!(result.retryable);
    assert_eq!(result.failed_step, Some(5));
    assert_eq!(result.completed_steps, vec![1, 3, 4]);

    let job = controller
        .jobs()
        .get_job(result.job_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failed_step, Some(5));
}

#[tokio::test]
async fn test_run_export_shouldStoreTheSubmittedTimeline() {
    let (controller, studio) = common::controller_with(MockStudio::new());

    let result = controller
        .run("forest rain", &common::forest_rain_settings(), "user-1", None)
        .await;
    assert!(result.success, "run failed: {:?}", result.error);

    let job_id = result.job_id.unwrap();
    let export: ExportOutput = stage_payload(&controller, &job_id, PipelineStep::Export).await;
    let path = export.manifest_url.trim_start_matches("mock://store/");
    assert!(path.starts_with(&format!("timelines/{}/", job_id)));

    let stored = studio.stored_object(path).expect("timeline was stored");
    let document: TimelineDocument = serde_json::from_slice(&stored).unwrap();
    assert!((document.total_duration - 120.0).abs() < 1e-6);
    assert!(!document.scenes.is_empty());
}
