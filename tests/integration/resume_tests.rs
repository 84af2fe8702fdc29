/*!
 * Resume and lease behavior of the pipeline controller
 */

use std::time::Duration;

use reelsmith::database::JobStatus;
use reelsmith::pipeline::{PipelineController, ResumeRequest};
use reelsmith::providers::mock::{MockBehavior, MockOperation, MockStudio};
use reelsmith::providers::Collaborators;
use crate::common;

/// Run once with music failing on its first call, so the job stops at step 5
async fn failed_at_soundscape() -> (PipelineController, std::sync::Arc<MockStudio>, String) {
    let studio = MockStudio::new().with_behavior(MockOperation::Music, MockBehavior::FailTimes(1));
    let (controller, studio) = common::controller_with(studio);

    let result = controller
        .run("forest rain", &common::forest_rain_settings(), "user-1", None)
        .await;
    assert!(!result.success);
    assert_eq!(result.failed_step, Some(5));

    (controller, studio, result.job_id.unwrap())
}

async fn payloads(controller: &PipelineController, job_id: &str, steps: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for step in steps {
        let record = controller
            .jobs()
            .repository()
            .get_stage_output(job_id, *step)
            .await
            .unwrap()
            .unwrap();
        out.push(record.payload);
    }
    out
}

#[tokio::test]
async fn test_resume_fromSoundscape_shouldKeepEarlierOutputsByteIdentical() {
    let (controller, studio, job_id) = failed_at_soundscape().await;
    let before = payloads(&controller, &job_id, &[1, 2, 3, 4]).await;
    let text_calls = studio.calls(MockOperation::Text);
    let clip_calls = studio.calls(MockOperation::Clip);

    let result = controller.resume(&job_id, 5).await;

    assert!(result.success, "resume failed: {:?}", result.error);
    assert_eq!(result.completed_steps, vec![1, 3, 4, 5, 6, 7]);
    assert_eq!(payloads(&controller, &job_id, &[1, 2, 3, 4]).await, before);

    // Nothing before step 5 was generated again
    assert_eq!(studio.calls(MockOperation::Text), text_calls);
    assert_eq!(studio.calls(MockOperation::Clip), clip_calls);

    let job = controller.jobs().get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.failed_step.is_none());
}

#[tokio::test]
async fn test_resume_withChangedSettings_shouldRefuse() {
    let (controller, _, job_id) = failed_at_soundscape().await;
    let mut settings = common::forest_rain_settings();
    settings.pacing = 90;

    let result = controller
        .run("forest rain", &settings, "user-1", Some(ResumeRequest::new(job_id.as_str(), 5)))
        .await;

    assert!(!result.success);
    assert!(!result.retryable);
    let job = controller.jobs().get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_resume_pastMissingPrerequisites_shouldRefuse() {
    let (controller, _, job_id) = failed_at_soundscape().await;

    let result = controller.resume(&job_id, 7).await;

    assert!(!result.success);
    assert!(!result.retryable);
    assert_eq!(result.job_id.as_deref(), Some(job_id.as_str()));
}

#[tokio::test]
async fn test_resume_completedJob_shouldRefuse() {
    let (controller, _) = common::controller_with(MockStudio::new());
    let first = controller
        .run("forest rain", &common::forest_rain_settings(), "user-1", None)
        .await;
    assert!(first.success);

    let result = controller.resume(first.job_id.as_deref().unwrap(), 5).await;

    assert!(!result.success);
    assert!(!result.retryable);
}

#[tokio::test]
async fn test_resume_unknownJob_shouldRejectWithoutRetry() {
    let (controller, _) = common::controller_with(MockStudio::new());

    let result = controller.resume("no-such-job", 3).await;

    assert!(!result.success);
    assert!(!result.retryable);
}

#[tokio::test]
async fn test_resume_whileLeasedElsewhere_shouldRefuseAndLeaveJobUntouched() {
    let (controller, studio, job_id) = failed_at_soundscape().await;
    let before = controller.jobs().get_job(&job_id).await.unwrap().unwrap();
    let music_calls = studio.calls(MockOperation::Music);

    let held = controller
        .jobs()
        .acquire_lease(&job_id, "run-elsewhere", Duration::from_secs(600))
        .await
        .unwrap();
    assert!(held);

    let result = controller.resume(&job_id, 5).await;

    assert!(!result.success);
    assert!(result.retryable);
    assert_eq!(studio.calls(MockOperation::Music), music_calls);
    let after = controller.jobs().get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(after, before);

    controller
        .jobs()
        .release_lease(&job_id, "run-elsewhere")
        .await
        .unwrap();
    let retried = controller.resume(&job_id, 5).await;
    assert!(retried.success, "resume failed: {:?}", retried.error);
}

#[tokio::test]
async fn test_resume_fromFlowDesign_shouldRerunLaterStagesAndAddCost() {
    let (controller, studio, job_id) = failed_at_soundscape().await;
    let cost_before = controller
        .jobs()
        .get_job(&job_id)
        .await
        .unwrap()
        .unwrap()
        .total_cost;
    let text_calls = studio.calls(MockOperation::Text);

    let result = controller.resume(&job_id, 3).await;

    assert!(result.success, "resume failed: {:?}", result.error);
    assert_eq!(result.completed_steps, vec![1, 3, 4, 5, 6, 7]);
    assert!(studio.calls(MockOperation::Text) > text_calls);
    assert!(result.total_cost > cost_before);
}

#[tokio::test]
async fn test_resume_ofJobFinishedByAnotherController_shouldKeepItCompletedAndCostUnchanged() {
    let (first, studio, job_id) = failed_at_soundscape().await;
    let second = PipelineController::new(
        first.jobs().clone(),
        Collaborators::from_studio(studio.clone()),
        common::fast_config(),
    );

    let finished = first.resume(&job_id, 5).await;
    assert!(finished.success, "resume failed: {:?}", finished.error);
    let completed = first.jobs().get_job(&job_id).await.unwrap().unwrap();
    let music_calls = studio.calls(MockOperation::Music);

    let result = second.resume(&job_id, 5).await;

    assert!(!result.success);
    assert!(!result.retryable);
    assert_eq!(studio.calls(MockOperation::Music), music_calls);
    let after = second.jobs().get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.total_cost, completed.total_cost);
    assert_eq!(after.completed_steps, completed.completed_steps);
}

#[tokio::test]
async fn test_resume_whileLeasedElsewhere_shouldReportBusyBeforeInspectingJob() {
    let (controller, _, job_id) = failed_at_soundscape().await;
    let mut settings = common::forest_rain_settings();
    settings.pacing = 90;
    controller
        .jobs()
        .acquire_lease(&job_id, "run-elsewhere", Duration::from_secs(600))
        .await
        .unwrap();

    // Changed settings would be refused outright, but the lease is checked first
    let result = controller
        .run("forest rain", &settings, "user-1", Some(ResumeRequest::new(job_id.as_str(), 5)))
        .await;

    assert!(!result.success);
    assert!(result.retryable);
}

#[tokio::test]
async fn test_resume_whenRefused_shouldReleaseLease() {
    let (controller, _, job_id) = failed_at_soundscape().await;
    let mut settings = common::forest_rain_settings();
    settings.pacing = 90;

    let refused = controller
        .run("forest rain", &settings, "user-1", Some(ResumeRequest::new(job_id.as_str(), 5)))
        .await;
    assert!(!refused.success);
    assert!(!refused.retryable);

    let missing_prerequisites = controller.resume(&job_id, 7).await;
    assert!(!missing_prerequisites.success);

    let acquired = controller
        .jobs()
        .acquire_lease(&job_id, "run-elsewhere", Duration::from_secs(600))
        .await
        .unwrap();
    assert!(acquired);
}
