/*!
 * Production domain: the settings bundle, scenes, shots, shot versions,
 * audio assets and pacing rules.
 */

pub mod model;
pub mod pacing;
pub mod settings;

pub use model::{
    AudioAsset, AudioClip, MediaKind, Scene, SceneId, Shot, ShotArtifacts, ShotId, ShotPrompts,
    ShotVersion, ShotVersionStatus, StoryBoard,
};
pub use pacing::{CountBounds, PacingCategory};
pub use settings::{
    AnimationMode, ContinuitySettings, CountSetting, DurationBucket, FrameMode,
    GenerationSettings, LoopSettings, ModelSelection, MusicSettings, PublishSettings,
    SoundEffectSettings, VisualWorld, VoiceoverSettings,
};
