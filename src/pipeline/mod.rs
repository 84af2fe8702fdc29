/*!
 * Generation pipeline.
 *
 * The pipeline turns a brief and a settings bundle into a rendered video by
 * running a fixed sequence of stages:
 * - Atmosphere: mood description from the brief
 * - Flow Design: scenes and shots sized by the pacing rules
 * - Composition: continuity resolution and sequential shot generation
 * - Soundscape: voiceover, music and sound effects
 * - Preview: timeline assembly and summary
 * - Export: manifest upload, render submission and polling
 * - Publish: optional, best effort
 */

pub mod orchestrator;
pub mod prompts;
pub mod stage;
pub mod stages;
pub mod steps;

pub use orchestrator::{GenerationResult, PipelineConfig, PipelineController, ResumeRequest};
pub use stage::{Stage, StageContext, StageOutcome, StageOutput};
pub use steps::{ExecutionPlan, PipelineStep};
