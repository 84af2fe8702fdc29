/*!
 * Error types for the reelsmith pipeline.
 *
 * Each layer gets its own error enum, defined with thiserror:
 * - `ProviderError`: a collaborator call (text, image, clip, audio, storage, render, publish) failed
 * - `ContinuityIssue`: why a proposed continuity group was dropped (never propagated)
 * - `ShotFailure`: one failed generation attempt for a shot, with the cost it still incurred
 * - `RenderError` / `PublishError`: export and publish failures
 * - `StageError`: what a pipeline stage hands back to the controller
 * - `AppError`: top-level wrapper used by the binary
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when calling an external collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Reasons a proposed continuity group is rejected during validation
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContinuityIssue {
    /// Fewer than two of the group's shots exist in the owning scene
    #[error("only {found} of the group's shots exist in scene {scene_id}")]
    TooFewShots { scene_id: String, found: usize },

    /// Surviving shot numbers are not strictly consecutive ascending
    #[error("shot numbers {numbers:?} are not consecutive")]
    NotConsecutive { numbers: Vec<u32> },

    /// The group references a scene that does not exist
    #[error("unknown scene {scene_id}")]
    UnknownScene { scene_id: String },
}

/// A failed generation attempt for one shot.
///
/// The cost is whatever the collaborators charged before the failure, so the
/// scheduler can still account for it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ShotFailure {
    /// What went wrong
    pub message: String,
    /// Cost already spent on this attempt
    pub cost: f64,
}

impl ShotFailure {
    pub fn new(message: impl Into<String>, cost: f64) -> Self {
        Self {
            message: message.into(),
            cost,
        }
    }
}

/// Errors from render submission and polling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The renderer reported a failed render
    #[error("render {render_id} failed: {message}")]
    Failed { render_id: String, message: String },

    /// The render did not finish within the polling budget
    #[error("render {render_id} did not finish after {attempts} status checks")]
    TimedOut { render_id: String, attempts: u32 },

    /// Submission or polling call failed
    #[error("render service error: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors from the best-effort publishing stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    /// No publishing integration is configured
    #[error("no publisher configured")]
    NotConfigured,

    /// Nothing rendered to publish
    #[error("no rendered video to publish")]
    NothingToPublish,

    /// The publishing call failed
    #[error("publish failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors a pipeline stage can return to the controller
#[derive(Error, Debug)]
pub enum StageError {
    /// A collaborator call failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Rendering failed or timed out
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// A collaborator returned output the stage cannot use
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// A prior stage's persisted output is missing
    #[error("Missing output of step {step}")]
    MissingInput { step: u8 },

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<serde_json::Error> for StageError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidOutput(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a stage
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
