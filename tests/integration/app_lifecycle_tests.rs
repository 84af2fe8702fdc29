/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use tempfile::TempDir;

use reelsmith::app_config::Config;
use reelsmith::app_controller::Controller;
use reelsmith::database::JobStatus;

use crate::common;

fn dry_run_config(dir: &TempDir) -> Config {
    common::init_logging();
    let mut config = Config::default();
    config.database_path = Some(dir.path().join("reelsmith.db"));
    config.pipeline.render_poll_interval_ms = 1;
    config.pipeline.render_max_poll_attempts = 5;
    config
}

/// Test the controller initialization with a fresh config file
#[test]
fn test_controller_initialization_withCreatedConfig_shouldSucceed() -> Result<()> {
    let dir = TempDir::new()?;
    let config_path = dir.path().join("conf.json");

    let mut config = Config::load_or_create(&config_path)?;
    assert!(config_path.exists());
    config.database_path = Some(dir.path().join("reelsmith.db"));

    let controller = Controller::with_config(config, true)?;
    assert_eq!(controller.config().pipeline.render_max_poll_attempts, 120);

    let jobs = tokio_test::block_on(controller.list_jobs(None))?;
    assert!(jobs.is_empty());

    Ok(())
}

#[test]
fn test_controller_withInvalidDefaults_shouldFailValidation() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = dry_run_config(&dir);
    config.defaults.pacing = 120;

    assert!(Controller::with_config(config, true).is_err());
    Ok(())
}

#[tokio::test]
async fn test_dryRun_fullRun_shouldPersistAcrossControllers() -> Result<()> {
    let dir = TempDir::new()?;

    let job_id = {
        let controller = Controller::with_config(dry_run_config(&dir), true)?;
        let result = controller.run("forest rain", None, "tester").await;
        assert!(result.success, "run failed: {:?}", result.error);
        result.job_id.unwrap()
    };

    // A second controller over the same database sees the finished job
    let controller = Controller::with_config(dry_run_config(&dir), true)?;
    let status = controller.status(&job_id).await?.unwrap();
    assert_eq!(status.status, JobStatus::Completed);
    assert_eq!(status.completed_steps, vec![1, 3, 4, 5, 6, 7]);

    let json = serde_json::to_value(&status)?;
    assert_eq!(json["status"], "completed");
    assert!(json.get("failed_step").is_none());

    let listed = controller.list_jobs(None).await?;
    assert_eq!(listed.len(), 1);

    assert_eq!(controller.cleanup(30).await?, 0);
    assert!(controller.status(&job_id).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_dryRun_resumeOfUnknownJob_shouldReportFailure() -> Result<()> {
    let dir = TempDir::new()?;
    let controller = Controller::with_config(dry_run_config(&dir), true)?;

    let result = controller.resume("missing-job", 5).await;

    assert!(!result.success);
    assert!(result.error.is_some());
    Ok(())
}
