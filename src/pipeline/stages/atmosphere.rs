/*!
 * Step 1: turn the brief, mood and theme into an atmosphere description.
 */

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::StageError;
use crate::pipeline::prompts;
use crate::pipeline::stage::{Stage, StageContext, StageOutput};
use crate::pipeline::steps::PipelineStep;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtmosphereOutput {
    pub mood_description: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AtmosphereStage;

#[async_trait]
impl Stage for AtmosphereStage {
    fn step(&self) -> PipelineStep {
        PipelineStep::Atmosphere
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let request = prompts::atmosphere_request(ctx.brief(), ctx.settings());
        let generated = ctx.collaborators.text.generate_text(request).await?.into_text();

        let mood_description = generated.value.trim().to_string();
        if mood_description.is_empty() {
            return Err(StageError::InvalidOutput(
                "atmosphere description is empty".to_string(),
            ));
        }

        info!("Atmosphere: {}", mood_description);
        StageOutput::completed(&AtmosphereOutput { mood_description }, generated.cost)
    }
}
