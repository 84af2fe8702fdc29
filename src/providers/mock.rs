/*!
 * Deterministic in-process studio for tests and dry runs.
 *
 * `MockStudio` implements every collaborator contract. Outputs are derived
 * from a hash of the request, so identical requests always yield identical
 * URLs. Structured text tasks read their item bounds from the output schema
 * and answer with the midpoint count.
 *
 * Failures are injected per operation:
 * - `MockBehavior::FailTimes(n)` - the first `n` calls fail, later ones succeed
 * - `MockBehavior::Failing` - every call fails
 * - `fail_when(operation, needle)` - calls whose prompt contains `needle` fail
 * - `RenderBehavior` - renders complete, fail, or never finish
 */

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use parking_lot::Mutex;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use crate::errors::ProviderError;
use crate::pipeline::prompts::tasks;
use crate::production::AudioClip;
use crate::timeline::TimelineDocument;

use super::{
    AudioGenerator, ClipGenerator, ClipRequest, Generated, ImageGenerator, ImageRequest,
    MusicRequest, ObjectStore, PublishReceipt, PublishRequest, Publisher, RenderService,
    RenderState, RenderStatus, SoundEffectRequest, SpeechRequest, TextGenerator, TextRequest,
};

pub const TEXT_COST: f64 = 0.002;
pub const IMAGE_COST: f64 = 0.04;
pub const CLIP_COST: f64 = 0.25;
pub const SPEECH_COST: f64 = 0.03;
pub const MUSIC_COST: f64 = 0.05;
pub const SOUND_EFFECT_COST: f64 = 0.01;

/// Operations a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Text,
    Image,
    Clip,
    Speech,
    Music,
    SoundEffect,
    Store,
    SubmitRender,
    PollRender,
    Publish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    #[default]
    Working,
    /// The first `n` calls fail
    FailTimes(usize),
    Failing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderBehavior {
    /// Report done on the given poll (1-based)
    CompletesAfter(u32),
    Fails,
    NeverFinishes,
}

impl Default for RenderBehavior {
    fn default() -> Self {
        RenderBehavior::CompletesAfter(1)
    }
}

#[derive(Debug, Default)]
pub struct MockStudio {
    behaviors: HashMap<MockOperation, MockBehavior>,
    needles: Vec<(MockOperation, String)>,
    render_behavior: RenderBehavior,
    calls: Mutex<HashMap<MockOperation, usize>>,
    polls: Mutex<HashMap<String, u32>>,
    stored: Mutex<BTreeMap<String, Bytes>>,
}

fn short_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())[..12].to_string()
}

fn schema_bounds(schema: Option<&Value>, array: &str) -> (u64, u64) {
    let read = |key: &str| {
        schema
            .and_then(|s| s.pointer(&format!("/properties/{}/{}", array, key)))
            .and_then(Value::as_u64)
    };
    let min = read("minItems").unwrap_or(1).max(1);
    let max = read("maxItems").unwrap_or(min).max(min);
    (min, max)
}

const CAMERA_MOVES: [&str; 4] = ["slow push-in", "static", "pan left", "crane up"];

impl MockStudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(mut self, operation: MockOperation, behavior: MockBehavior) -> Self {
        self.behaviors.insert(operation, behavior);
        self
    }

    /// Fail every call of `operation` whose prompt or task contains `needle`
    pub fn fail_when(mut self, operation: MockOperation, needle: impl Into<String>) -> Self {
        self.needles.push((operation, needle.into()));
        self
    }

    pub fn with_render(mut self, behavior: RenderBehavior) -> Self {
        self.render_behavior = behavior;
        self
    }

    /// Number of calls made to `operation`, failed ones included
    pub fn calls(&self, operation: MockOperation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    pub fn stored_object(&self, path: &str) -> Option<Bytes> {
        self.stored.lock().get(path).cloned()
    }

    fn check(&self, operation: MockOperation, subject: &str) -> Result<usize, ProviderError> {
        let index = {
            let mut calls = self.calls.lock();
            let count = calls.entry(operation).or_insert(0);
            *count += 1;
            *count - 1
        };

        let behavior = self.behaviors.get(&operation).copied().unwrap_or_default();
        let scheduled = match behavior {
            MockBehavior::Working => false,
            MockBehavior::FailTimes(n) => index < n,
            MockBehavior::Failing => true,
        };
        let targeted = self
            .needles
            .iter()
            .any(|(op, needle)| *op == operation && subject.contains(needle.as_str()));

        if scheduled || targeted {
            debug!("Mock {:?} call #{} failing", operation, index + 1);
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("Simulated {:?} failure", operation),
            });
        }
        Ok(index)
    }

    fn scene_breakdown(&self, request: &TextRequest) -> Value {
        let (min, max) = schema_bounds(request.output_schema.as_ref(), "scenes");
        let count = (min + max) / 2;
        let scenes: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "title": format!("Scene {}", i + 1),
                    "description": format!("Movement {} of {}", i + 1, short_hash(&[&request.user_prompt])),
                    "duration": 8.0 + 3.0 * (i % 4) as f64,
                })
            })
            .collect();
        json!({ "scenes": scenes })
    }

    fn shot_composition(&self, request: &TextRequest) -> Value {
        let (min, max) = schema_bounds(request.output_schema.as_ref(), "shots");
        let count = (min + max) / 2;
        let shots: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "description": format!("Shot {} framing", i + 1),
                    "camera_movement": CAMERA_MOVES[i as usize % CAMERA_MOVES.len()],
                    "duration": 2.0 + (i % 3) as f64,
                })
            })
            .collect();

        let mut groups = Vec::new();
        if count >= 3 {
            groups.push(json!({ "shot_numbers": [1, 2, 3], "transition": "seamless" }));
        }
        if count >= 5 {
            groups.push(json!({ "shot_numbers": [4, 5], "transition": "match-cut" }));
        }
        json!({ "shots": shots, "continuity_groups": groups })
    }
}

#[async_trait]
impl TextGenerator for MockStudio {
    async fn generate_text(&self, request: TextRequest) -> Result<Generated<Value>, ProviderError> {
        let subject = format!("{} {}", request.task, request.user_prompt);
        self.check(MockOperation::Text, &subject)?;

        let value = match request.task.as_str() {
            tasks::SCENE_BREAKDOWN => self.scene_breakdown(&request),
            tasks::SHOT_COMPOSITION => self.shot_composition(&request),
            tasks::ATMOSPHERE => Value::String(format!(
                "A hushed, enveloping atmosphere ({})",
                short_hash(&[&request.user_prompt])
            )),
            _ => Value::String(format!(
                "Generated {} text ({})",
                request.task,
                short_hash(&[&request.user_prompt])
            )),
        };
        Ok(Generated::new(value, TEXT_COST))
    }
}

#[async_trait]
impl ImageGenerator for MockStudio {
    async fn generate_image(&self, request: ImageRequest) -> Result<Generated<String>, ProviderError> {
        self.check(MockOperation::Image, &request.prompt)?;
        let reference = request.reference_image.as_deref().unwrap_or("");
        Ok(Generated::new(
            format!("mock://image/{}.png", short_hash(&[&request.prompt, reference])),
            IMAGE_COST,
        ))
    }
}

#[async_trait]
impl ClipGenerator for MockStudio {
    async fn generate_clip(&self, request: ClipRequest) -> Result<Generated<String>, ProviderError> {
        self.check(MockOperation::Clip, &request.prompt)?;
        let end = request.end_frame.as_deref().unwrap_or("");
        Ok(Generated::new(
            format!(
                "mock://clip/{}.mp4",
                short_hash(&[&request.prompt, &request.start_frame, end])
            ),
            CLIP_COST,
        ))
    }
}

#[async_trait]
impl AudioGenerator for MockStudio {
    async fn generate_speech(&self, request: SpeechRequest) -> Result<Generated<AudioClip>, ProviderError> {
        self.check(MockOperation::Speech, &request.script)?;
        let words = request.script.split_whitespace().count().max(1);
        Ok(Generated::new(
            AudioClip {
                url: format!("mock://speech/{}.mp3", short_hash(&[&request.script, &request.voice_id])),
                duration: words as f64 * 0.4,
            },
            SPEECH_COST,
        ))
    }

    async fn generate_music(&self, request: MusicRequest) -> Result<Generated<AudioClip>, ProviderError> {
        self.check(MockOperation::Music, &request.prompt)?;
        Ok(Generated::new(
            AudioClip {
                url: format!("mock://music/{}.mp3", short_hash(&[&request.prompt])),
                duration: request.duration,
            },
            MUSIC_COST,
        ))
    }

    async fn generate_sound_effect(
        &self,
        request: SoundEffectRequest,
    ) -> Result<Generated<AudioClip>, ProviderError> {
        let subject = format!("{} {}", request.video_url, request.prompt);
        self.check(MockOperation::SoundEffect, &subject)?;
        Ok(Generated::new(
            AudioClip {
                url: format!("mock://sfx/{}.mp3", short_hash(&[&request.video_url, &request.prompt])),
                duration: 2.0,
            },
            SOUND_EFFECT_COST,
        ))
    }
}

#[async_trait]
impl ObjectStore for MockStudio {
    async fn store_object(&self, path: &str, bytes: Bytes, _mime_type: &str) -> Result<String, ProviderError> {
        self.check(MockOperation::Store, path)?;
        self.stored.lock().insert(path.to_string(), bytes);
        Ok(format!("mock://store/{}", path))
    }
}

#[async_trait]
impl RenderService for MockStudio {
    async fn submit_render(
        &self,
        document: &TimelineDocument,
        manifest_url: &str,
    ) -> Result<String, ProviderError> {
        let index = self.check(MockOperation::SubmitRender, manifest_url)?;
        debug!(
            "Mock render accepted {} scenes from {}",
            document.scenes.len(),
            manifest_url
        );
        Ok(format!("render-{}", index + 1))
    }

    async fn poll_render(&self, render_id: &str) -> Result<RenderStatus, ProviderError> {
        self.check(MockOperation::PollRender, render_id)?;
        let polls = {
            let mut polls = self.polls.lock();
            let count = polls.entry(render_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let status = match self.render_behavior {
            RenderBehavior::CompletesAfter(n) if polls >= n => RenderStatus {
                state: RenderState::Done,
                url: Some(format!("mock://video/{}.mp4", render_id)),
                thumbnail_url: Some(format!("mock://video/{}.jpg", render_id)),
                error: None,
            },
            RenderBehavior::Fails => RenderStatus {
                state: RenderState::Failed,
                url: None,
                thumbnail_url: None,
                error: Some("Simulated render failure".to_string()),
            },
            _ => RenderStatus {
                state: if polls == 1 {
                    RenderState::Queued
                } else {
                    RenderState::Rendering
                },
                url: None,
                thumbnail_url: None,
                error: None,
            },
        };
        Ok(status)
    }
}

#[async_trait]
impl Publisher for MockStudio {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, ProviderError> {
        let index = self.check(MockOperation::Publish, &request.video_url)?;
        Ok(PublishReceipt {
            post_id: format!("post-{}", index + 1),
            status: if request.schedule.is_some() {
                "scheduled".to_string()
            } else {
                "published".to_string()
            },
        })
    }
}
