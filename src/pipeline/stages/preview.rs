/*!
 * Step 6: assemble the timeline and persist its summary.
 */

use async_trait::async_trait;
use log::{info, warn};

use crate::errors::StageError;
use crate::pipeline::stage::{Stage, StageContext, StageOutput};
use crate::pipeline::steps::PipelineStep;

use super::assemble_timeline;

#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewStage;

#[async_trait]
impl Stage for PreviewStage {
    fn step(&self) -> PipelineStep {
        PipelineStep::Preview
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let document = assemble_timeline(ctx).await?;
        let summary = document.summary();

        if !summary.shots_without_media.is_empty() {
            warn!(
                "{} of {} shots have no media: {:?}",
                summary.shots_without_media.len(),
                summary.shot_count,
                summary.shots_without_media
            );
        }
        info!(
            "Preview: {} scenes, {} shots, {:.1}s",
            summary.scene_count, summary.shot_count, summary.total_duration
        );

        StageOutput::completed(&summary, 0.0)
    }
}
