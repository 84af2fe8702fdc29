/*!
 * The settings bundle that accompanies a creative brief.
 *
 * Everything here is plain data deserialized from the config file or a
 * settings JSON supplied on the command line.
 */

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Target duration bucket for the finished video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DurationBucket {
    #[serde(rename = "30s")]
    Seconds30,
    #[serde(rename = "1m")]
    #[default]
    Minute1,
    #[serde(rename = "2m")]
    Minutes2,
    #[serde(rename = "3m")]
    Minutes3,
    #[serde(rename = "5m")]
    Minutes5,
}

impl DurationBucket {
    /// Total duration in whole seconds
    pub fn seconds(&self) -> u32 {
        match self {
            Self::Seconds30 => 30,
            Self::Minute1 => 60,
            Self::Minutes2 => 120,
            Self::Minutes3 => 180,
            Self::Minutes5 => 300,
        }
    }
}

impl std::str::FromStr for DurationBucket {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "30s" => Ok(Self::Seconds30),
            "1m" | "60s" => Ok(Self::Minute1),
            "2m" | "120s" => Ok(Self::Minutes2),
            "3m" | "180s" => Ok(Self::Minutes3),
            "5m" | "300s" => Ok(Self::Minutes5),
            _ => Err(anyhow!("Invalid duration bucket: {}", s)),
        }
    }
}

/// A count that is either chosen by the pipeline or fixed by the user.
///
/// Serialized as the string `"auto"` or a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum CountSetting {
    #[default]
    Auto,
    Fixed(u32),
}

impl CountSetting {
    pub fn fixed(&self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Fixed(n) => Some(*n),
        }
    }
}

impl TryFrom<Value> for CountSetting {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::String(s) if s.eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            Value::String(s) => s
                .parse::<u32>()
                .map(Self::Fixed)
                .map_err(|_| format!("expected \"auto\" or an integer, got \"{}\"", s)),
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Self::Fixed)
                .ok_or_else(|| format!("count out of range: {}", n)),
            other => Err(format!("expected \"auto\" or an integer, got {}", other)),
        }
    }
}

impl From<CountSetting> for Value {
    fn from(count: CountSetting) -> Self {
        match count {
            CountSetting::Auto => Value::String("auto".to_string()),
            CountSetting::Fixed(n) => Value::from(n),
        }
    }
}

/// Whether visual units are stills with transitions or generated clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationMode {
    ImageTransitions,
    #[default]
    VideoAnimation,
}

/// Whether clips are driven by one reference image or a start/end frame pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FrameMode {
    ImageReference,
    #[default]
    StartEndFrame,
}

impl fmt::Display for FrameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageReference => write!(f, "image-reference"),
            Self::StartEndFrame => write!(f, "start-end-frame"),
        }
    }
}

/// Loop toggles for scenes and shots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LoopSettings {
    #[serde(default)]
    pub scene_loops_enabled: bool,
    #[serde(default)]
    pub scene_loop_count: Option<u32>,
    #[serde(default)]
    pub shot_loops_enabled: bool,
    #[serde(default)]
    pub shot_loop_count: Option<u32>,
}

impl LoopSettings {
    pub fn scene_loops(&self) -> Option<u32> {
        self.scene_loops_enabled
            .then(|| self.scene_loop_count.unwrap_or(1).max(1))
    }

    pub fn shot_loops(&self) -> Option<u32> {
        self.shot_loops_enabled
            .then(|| self.shot_loop_count.unwrap_or(1).max(1))
    }
}

/// Model identifiers for each kind of generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    #[serde(default = "default_text_model")]
    pub text: String,
    #[serde(default = "default_image_model")]
    pub image: String,
    #[serde(default = "default_video_model")]
    pub video: String,
    #[serde(default = "default_voice_model")]
    pub voice: String,
    #[serde(default = "default_music_model")]
    pub music: String,
    #[serde(default = "default_sound_effect_model")]
    pub sound_effect: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            text: default_text_model(),
            image: default_image_model(),
            video: default_video_model(),
            voice: default_voice_model(),
            music: default_music_model(),
            sound_effect: default_sound_effect_model(),
        }
    }
}

/// The pre-populated "visual world" step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualWorld {
    #[serde(default = "default_art_style")]
    pub art_style: String,
    #[serde(default)]
    pub color_palette: Vec<String>,
    #[serde(default)]
    pub reference_image_url: Option<String>,
}

impl Default for VisualWorld {
    fn default() -> Self {
        Self {
            art_style: default_art_style(),
            color_palette: Vec::new(),
            reference_image_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceoverSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for VoiceoverSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            voice_id: default_voice_id(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub style: Option<String>,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            style: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundEffectSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SoundEffectSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuitySettings {
    /// Whether frame inheritance between consecutive shots is used at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Proposed groups are stored as approved without a review step
    #[serde(default = "default_true")]
    pub auto_approve: bool,
}

impl Default for ContinuitySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_approve: true,
        }
    }
}

/// Optional publishing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PublishSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub platforms: Vec<String>,
    /// RFC 3339 timestamp; publish immediately when absent
    #[serde(default)]
    pub schedule: Option<String>,
}

/// The settings bundle supplied with a brief
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_mood")]
    pub mood: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub duration: DurationBucket,
    /// 0 = few long scenes, 100 = many short ones
    #[serde(default = "default_pacing")]
    pub pacing: u8,
    #[serde(default)]
    pub scene_count: CountSetting,
    #[serde(default)]
    pub shots_per_scene: CountSetting,
    #[serde(default)]
    pub animation_mode: AnimationMode,
    #[serde(default)]
    pub frame_mode: FrameMode,
    #[serde(default)]
    pub loops: LoopSettings,
    #[serde(default)]
    pub models: ModelSelection,
    #[serde(default)]
    pub visual_world: VisualWorld,
    #[serde(default)]
    pub voiceover: VoiceoverSettings,
    #[serde(default)]
    pub music: MusicSettings,
    #[serde(default)]
    pub sound_effects: SoundEffectSettings,
    #[serde(default)]
    pub continuity: ContinuitySettings,
    #[serde(default)]
    pub publish: PublishSettings,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            mood: default_mood(),
            theme: default_theme(),
            duration: DurationBucket::default(),
            pacing: default_pacing(),
            scene_count: CountSetting::Auto,
            shots_per_scene: CountSetting::Auto,
            animation_mode: AnimationMode::default(),
            frame_mode: FrameMode::default(),
            loops: LoopSettings::default(),
            models: ModelSelection::default(),
            visual_world: VisualWorld::default(),
            voiceover: VoiceoverSettings::default(),
            music: MusicSettings::default(),
            sound_effects: SoundEffectSettings::default(),
            continuity: ContinuitySettings::default(),
            publish: PublishSettings::default(),
        }
    }
}

impl GenerationSettings {
    /// Check the bundle for values no stage can work with
    pub fn validate(&self) -> Result<()> {
        if self.pacing > 100 {
            return Err(anyhow!("Pacing must be between 0 and 100, got {}", self.pacing));
        }
        if self.scene_count == CountSetting::Fixed(0) {
            return Err(anyhow!("Scene count must be at least 1"));
        }
        if self.shots_per_scene == CountSetting::Fixed(0) {
            return Err(anyhow!("Shots per scene must be at least 1"));
        }
        if self.publish.enabled && self.publish.platforms.is_empty() {
            return Err(anyhow!("Publishing is enabled but no platforms are configured"));
        }
        if let Some(schedule) = &self.publish.schedule {
            chrono::DateTime::parse_from_rfc3339(schedule)
                .map_err(|e| anyhow!("Invalid publish schedule '{}': {}", schedule, e))?;
        }
        Ok(())
    }

    /// Whether shots may inherit their start frame from the previous shot
    pub fn uses_frame_inheritance(&self) -> bool {
        self.continuity.enabled && self.frame_mode == FrameMode::StartEndFrame
    }
}

fn default_mood() -> String {
    "calm".to_string()
}

fn default_theme() -> String {
    "nature".to_string()
}

fn default_pacing() -> u8 {
    50
}

fn default_true() -> bool {
    true
}

fn default_art_style() -> String {
    "cinematic, soft natural light".to_string()
}

fn default_voice_id() -> String {
    "narrator".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_text_model() -> String {
    "text-default".to_string()
}

fn default_image_model() -> String {
    "image-default".to_string()
}

fn default_video_model() -> String {
    "video-default".to_string()
}

fn default_voice_model() -> String {
    "voice-default".to_string()
}

fn default_music_model() -> String {
    "music-default".to_string()
}

fn default_sound_effect_model() -> String {
    "sfx-default".to_string()
}
