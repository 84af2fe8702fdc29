/*!
 * # Reelsmith - brief-to-video generation pipeline
 *
 * A Rust library that turns a short creative brief into a rendered video.
 *
 * ## Features
 *
 * - Resumable, persisted pipeline of generation steps
 * - Pacing rules that size scenes and shots from the target duration
 * - Continuity groups that chain the end frame of one shot into the next
 * - Sequential shot generation with per-shot failure isolation
 * - Deterministic timeline assembly for rendering
 * - Optional, best-effort publishing
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `production`: Settings bundle, scenes, shots and pacing rules
 * - `continuity`: Continuity group resolution
 * - `generation`: Batch shot generation scheduler
 * - `timeline`: Timeline assembly
 * - `pipeline`: Stages and the pipeline controller:
 *   - `pipeline::steps`: Step numbering and execution plans
 *   - `pipeline::stages`: One module per stage
 *   - `pipeline::orchestrator`: Job lifecycle, leases and resume
 * - `jobs`: Job creation, resume checks and listing
 * - `database`: SQLite persistence for jobs, stage outputs and shot versions
 * - `providers`: Generation service contracts:
 *   - `providers::gateway`: HTTP client for the generation service
 *   - `providers::mock`: Scriptable in-process studio
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod continuity;
pub mod database;
pub mod errors;
pub mod generation;
pub mod jobs;
pub mod pipeline;
pub mod production;
pub mod providers;
pub mod timeline;

// Re-export main types for easier usage
pub use app_config::Config;
pub use continuity::ContinuityResolver;
pub use errors::{AppError, ProviderError, RenderError, StageError};
pub use generation::BatchGenerationScheduler;
pub use pipeline::{GenerationResult, PipelineController, PipelineStep};
pub use production::GenerationSettings;
pub use timeline::TimelineAssembler;
