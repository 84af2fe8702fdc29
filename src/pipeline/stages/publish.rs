/*!
 * Step 8: publish the rendered video.
 *
 * Best effort: any failure, including a missing publisher, is logged and
 * reported as `BestEffortFailed`. This stage never returns an error.
 */

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{PublishError, StageError};
use crate::pipeline::stage::{Stage, StageContext, StageOutput};
use crate::pipeline::steps::PipelineStep;
use crate::providers::{PublishReceipt, PublishRequest};

use super::atmosphere::AtmosphereOutput;
use super::export::ExportOutput;

const TITLE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishOutput {
    #[serde(default)]
    pub receipt: Option<PublishReceipt>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishStage;

impl PublishStage {
    async fn publish(&self, ctx: &StageContext<'_>) -> Result<PublishReceipt, PublishError> {
        let publisher = ctx
            .collaborators
            .publisher
            .as_ref()
            .ok_or(PublishError::NotConfigured)?;

        let export: ExportOutput = ctx
            .input(PipelineStep::Export)
            .await
            .map_err(|_| PublishError::NothingToPublish)?;
        let description = ctx
            .input::<AtmosphereOutput>(PipelineStep::Atmosphere)
            .await
            .map(|a| a.mood_description)
            .unwrap_or_default();

        let settings = ctx.settings();
        let request = PublishRequest {
            video_url: export.video_url,
            platforms: settings.publish.platforms.clone(),
            title: ctx.brief().chars().take(TITLE_LIMIT).collect(),
            description,
            schedule: settings.publish.schedule.clone(),
        };
        Ok(publisher.publish(request).await?)
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn step(&self) -> PipelineStep {
        PipelineStep::Publish
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        match self.publish(ctx).await {
            Ok(receipt) => {
                info!("Published as {} ({})", receipt.post_id, receipt.status);
                StageOutput::completed(
                    &PublishOutput {
                        receipt: Some(receipt),
                        error: None,
                    },
                    0.0,
                )
            }
            Err(e) => {
                warn!("Publishing failed, continuing without it: {}", e);
                let reason = e.to_string();
                StageOutput::best_effort_failed(
                    &PublishOutput {
                        receipt: None,
                        error: Some(reason.clone()),
                    },
                    0.0,
                    reason,
                )
            }
        }
    }
}
