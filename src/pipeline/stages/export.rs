/*!
 * Step 7: store the timeline manifest, submit it for rendering and wait for
 * the result.
 *
 * Polling uses a fixed interval and a fixed attempt budget. Running out of
 * attempts is a terminal failure of the stage.
 */

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::database::repository::Repository;
use crate::errors::{RenderError, StageError};
use crate::pipeline::stage::{Stage, StageContext, StageOutput};
use crate::pipeline::steps::PipelineStep;
use crate::providers::RenderState;

use super::assemble_timeline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutput {
    pub render_id: String,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub manifest_url: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportStage;

impl ExportStage {
    /// Poll until the render is done, failed, or out of attempts
    async fn await_render(
        &self,
        ctx: &StageContext<'_>,
        render_id: &str,
    ) -> Result<(String, Option<String>), StageError> {
        let max_attempts = ctx.config.render_max_poll_attempts;

        for attempt in 1..=max_attempts {
            let status = ctx
                .collaborators
                .render
                .poll_render(render_id)
                .await
                .map_err(RenderError::from)?;
            debug!(
                "Render {} poll {}/{}: {:?}",
                render_id, attempt, max_attempts, status.state
            );

            match status.state {
                RenderState::Done => {
                    let url = status.url.ok_or_else(|| {
                        StageError::InvalidOutput(format!("render {} finished without a URL", render_id))
                    })?;
                    return Ok((url, status.thumbnail_url));
                }
                RenderState::Failed => {
                    return Err(RenderError::Failed {
                        render_id: render_id.to_string(),
                        message: status.error.unwrap_or_else(|| "unknown error".to_string()),
                    }
                    .into());
                }
                RenderState::Queued | RenderState::Rendering => {
                    if attempt < max_attempts {
                        tokio::time::sleep(ctx.config.render_poll_interval).await;
                    }
                }
            }
        }

        Err(RenderError::TimedOut {
            render_id: render_id.to_string(),
            attempts: max_attempts,
        }
        .into())
    }
}

#[async_trait]
impl Stage for ExportStage {
    fn step(&self) -> PipelineStep {
        PipelineStep::Export
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let document = assemble_timeline(ctx).await?;
        let manifest = serde_json::to_string(&document)?;
        let path = format!(
            "timelines/{}/{}.json",
            ctx.job_id(),
            Repository::hash_text(&manifest)
        );

        let manifest_url = ctx
            .collaborators
            .store
            .store_object(&path, Bytes::from(manifest), "application/json")
            .await?;
        debug!("Stored timeline manifest at {}", manifest_url);

        let render_id = ctx
            .collaborators
            .render
            .submit_render(&document, &manifest_url)
            .await
            .map_err(RenderError::from)?;
        info!("Submitted render {} ({:.1}s)", render_id, document.total_duration);

        let (video_url, thumbnail_url) = self.await_render(ctx, &render_id).await?;
        info!("Render {} finished: {}", render_id, video_url);

        StageOutput::completed(
            &ExportOutput {
                render_id,
                video_url,
                thumbnail_url,
                manifest_url,
            },
            0.0,
        )
    }
}
