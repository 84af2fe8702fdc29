/*!
 * Collaborator contracts for the generation pipeline.
 *
 * Every external service the pipeline talks to is reached through one of the
 * traits below:
 * - `TextGenerator`: free text or schema-constrained structured output
 * - `ImageGenerator` / `ClipGenerator`: stills, frames and video clips
 * - `AudioGenerator`: speech, music and sound effects
 * - `ObjectStore`: permanent storage for generated documents
 * - `RenderService`: render submission and status polling
 * - `Publisher`: optional social publishing
 *
 * Two implementations ship with the crate: `mock::MockStudio`, a deterministic
 * in-process studio, and `gateway::StudioGateway`, a JSON-over-HTTP client.
 */

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::production::AudioClip;
use crate::timeline::TimelineDocument;

pub mod gateway;
pub mod mock;

/// A value produced by a collaborator together with what it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    pub cost: f64,
}

impl<T> Generated<T> {
    pub fn new(value: T, cost: f64) -> Self {
        Self { value, cost }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Generated<U> {
        Generated {
            value: f(self.value),
            cost: self.cost,
        }
    }
}

impl Generated<Value> {
    /// Interpret the output as plain text
    pub fn into_text(self) -> Generated<String> {
        self.map(|value| match value {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    /// Deserialize structured output into `T`
    pub fn parse<T: DeserializeOwned>(self) -> Result<Generated<T>, ProviderError> {
        let cost = self.cost;
        let value = match self.value {
            // Some models return the JSON object as a string
            Value::String(text) => serde_json::from_str(&text),
            other => serde_json::from_value(other),
        }
        .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(Generated { value, cost })
    }
}

/// Request for a text generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRequest {
    /// Short task label, e.g. `scene_breakdown`
    pub task: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON schema the output must satisfy; free text when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRequest {
    pub start_frame: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_frame: Option<String>,
    pub prompt: String,
    /// Seconds
    pub duration: f64,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub script: String,
    pub voice_id: String,
    pub language: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicRequest {
    pub prompt: String,
    /// Seconds
    pub duration: f64,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundEffectRequest {
    /// Clip or still the effect is scored against
    pub video_url: String,
    pub prompt: String,
    pub model: String,
}

/// Lifecycle state reported by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    Queued,
    Rendering,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderStatus {
    pub state: RenderState,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub video_url: String,
    pub platforms: Vec<String>,
    pub title: String,
    pub description: String,
    /// RFC 3339; publish immediately when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub post_id: String,
    pub status: String,
}

#[async_trait]
pub trait TextGenerator: Send + Sync + Debug {
    /// Returns a JSON string for free text, or the structured object
    async fn generate_text(&self, request: TextRequest) -> Result<Generated<Value>, ProviderError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync + Debug {
    /// Returns the image URL
    async fn generate_image(&self, request: ImageRequest) -> Result<Generated<String>, ProviderError>;
}

#[async_trait]
pub trait ClipGenerator: Send + Sync + Debug {
    /// Returns the clip URL
    async fn generate_clip(&self, request: ClipRequest) -> Result<Generated<String>, ProviderError>;
}

#[async_trait]
pub trait AudioGenerator: Send + Sync + Debug {
    async fn generate_speech(&self, request: SpeechRequest) -> Result<Generated<AudioClip>, ProviderError>;

    async fn generate_music(&self, request: MusicRequest) -> Result<Generated<AudioClip>, ProviderError>;

    async fn generate_sound_effect(
        &self,
        request: SoundEffectRequest,
    ) -> Result<Generated<AudioClip>, ProviderError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    /// Store `bytes` at `path` and return its permanent URL
    async fn store_object(&self, path: &str, bytes: Bytes, mime_type: &str) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait RenderService: Send + Sync + Debug {
    /// Submit a timeline for rendering and return the render id
    async fn submit_render(
        &self,
        document: &TimelineDocument,
        manifest_url: &str,
    ) -> Result<String, ProviderError>;

    async fn poll_render(&self, render_id: &str) -> Result<RenderStatus, ProviderError>;
}

#[async_trait]
pub trait Publisher: Send + Sync + Debug {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, ProviderError>;
}

/// Every collaborator a pipeline run needs
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub clip: Arc<dyn ClipGenerator>,
    pub audio: Arc<dyn AudioGenerator>,
    pub store: Arc<dyn ObjectStore>,
    pub render: Arc<dyn RenderService>,
    /// Publishing is optional; the publish stage degrades without it
    pub publisher: Option<Arc<dyn Publisher>>,
}

impl Collaborators {
    /// Use one service for every contract, including publishing
    pub fn from_studio<S>(studio: Arc<S>) -> Self
    where
        S: TextGenerator
            + ImageGenerator
            + ClipGenerator
            + AudioGenerator
            + ObjectStore
            + RenderService
            + Publisher
            + 'static,
    {
        Self {
            text: studio.clone(),
            image: studio.clone(),
            clip: studio.clone(),
            audio: studio.clone(),
            store: studio.clone(),
            render: studio.clone(),
            publisher: Some(studio),
        }
    }

    pub fn without_publisher(mut self) -> Self {
        self.publisher = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_generated_parse_withObject_shouldDeserialize() {
        let generated = Generated::new(json!({"name": "rain"}), 0.25);
        let parsed: Generated<Sample> = generated.parse().unwrap();
        assert_eq!(parsed.value.name, "rain");
        assert_eq!(parsed.cost, 0.25);
    }

    #[test]
    fn test_generated_parse_withJsonString_shouldDeserialize() {
        let generated = Generated::new(Value::String(r#"{"name":"mist"}"#.to_string()), 0.0);
        let parsed: Generated<Sample> = generated.parse().unwrap();
        assert_eq!(parsed.value.name, "mist");
    }

    #[test]
    fn test_generated_parse_withWrongShape_shouldReturnParseError() {
        let generated = Generated::new(json!([1, 2]), 0.0);
        let result: Result<Generated<Sample>, _> = generated.parse();
        assert!(matches!(result, Err(ProviderError::ParseError(_))));
    }

    #[test]
    fn test_generated_intoText_shouldUnwrapStrings() {
        let text = Generated::new(Value::String("calm".to_string()), 0.1).into_text();
        assert_eq!(text.value, "calm");
    }
}
