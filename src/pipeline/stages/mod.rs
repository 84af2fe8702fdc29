/*!
 * The executed pipeline stages.
 */

pub mod atmosphere;
pub mod composition;
pub mod export;
pub mod flow_design;
pub mod preview;
pub mod publish;
pub mod soundscape;

use crate::errors::StageError;
use crate::timeline::{TimelineAssembler, TimelineDocument};

use super::stage::{Stage, StageContext};
use super::steps::PipelineStep;

pub use atmosphere::{AtmosphereOutput, AtmosphereStage};
pub use composition::{CompositionOutput, CompositionStage, StudioShotGenerator};
pub use export::{ExportOutput, ExportStage};
pub use flow_design::{FlowDesignOutput, FlowDesignStage};
pub use preview::PreviewStage;
pub use publish::{PublishOutput, PublishStage};
pub use soundscape::{SoundscapeOutput, SoundscapeStage};

/// The stage that executes `step`; `None` for the pre-populated visual world
pub fn stage_for(step: PipelineStep) -> Option<Box<dyn Stage>> {
    match step {
        PipelineStep::Atmosphere => Some(Box::new(AtmosphereStage)),
        PipelineStep::VisualWorld => None,
        PipelineStep::FlowDesign => Some(Box::new(FlowDesignStage)),
        PipelineStep::Composition => Some(Box::new(CompositionStage)),
        PipelineStep::Soundscape => Some(Box::new(SoundscapeStage)),
        PipelineStep::Preview => Some(Box::new(PreviewStage)),
        PipelineStep::Export => Some(Box::new(ExportStage)),
        PipelineStep::Publish => Some(Box::new(PublishStage)),
    }
}

/// Assemble a fresh timeline from the persisted storyboard, the latest shot
/// versions and the soundscape
pub(crate) async fn assemble_timeline(ctx: &StageContext<'_>) -> Result<TimelineDocument, StageError> {
    let flow: FlowDesignOutput = ctx.input(PipelineStep::FlowDesign).await?;
    let soundscape: SoundscapeOutput = ctx.input(PipelineStep::Soundscape).await?;
    let latest = ctx.repository.latest_shot_versions(ctx.job_id()).await?;

    Ok(TimelineAssembler::new().assemble_board(&flow.board, &latest, &soundscape.audio))
}
