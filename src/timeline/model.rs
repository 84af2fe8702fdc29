/*!
 * Renderer-ready timeline document.
 */

use serde::{Deserialize, Serialize};

use crate::production::{MediaKind, SceneId, ShotId};

/// Media a timeline shot plays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineShot {
    pub shot_id: ShotId,
    pub sequence_number: u32,
    /// Seconds from the start of the video
    pub start_offset: f64,
    pub duration: f64,
    /// None when no attempt produced playable media
    pub media: Option<MediaRef>,
    pub camera_movement: String,
    #[serde(default)]
    pub loop_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineScene {
    pub scene_id: SceneId,
    pub sequence_number: u32,
    pub title: String,
    pub start_offset: f64,
    /// Sum of the scene's shot durations
    pub duration: f64,
    #[serde(default)]
    pub loop_count: Option<u32>,
    pub shots: Vec<TimelineShot>,
}

/// A clip placed on an audio track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackClip {
    pub url: String,
    pub start_offset: f64,
    pub duration: f64,
    /// Shot the clip belongs to, for sound effects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_id: Option<ShotId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioTracks {
    pub voiceover: Vec<TrackClip>,
    pub music: Vec<TrackClip>,
    pub sound_effects: Vec<TrackClip>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineDocument {
    pub scenes: Vec<TimelineScene>,
    pub tracks: AudioTracks,
    pub total_duration: f64,
}

/// Condensed view of a document, persisted by the preview stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSummary {
    pub total_duration: f64,
    pub scene_count: usize,
    pub shot_count: usize,
    pub shots_without_media: Vec<ShotId>,
    pub voiceover_clips: usize,
    pub music_clips: usize,
    pub sound_effect_clips: usize,
}

impl TimelineDocument {
    pub fn shots(&self) -> impl Iterator<Item = &TimelineShot> {
        self.scenes.iter().flat_map(|scene| scene.shots.iter())
    }

    pub fn shot_count(&self) -> usize {
        self.scenes.iter().map(|scene| scene.shots.len()).sum()
    }

    pub fn summary(&self) -> TimelineSummary {
        TimelineSummary {
            total_duration: self.total_duration,
            scene_count: self.scenes.len(),
            shot_count: self.shot_count(),
            shots_without_media: self
                .shots()
                .filter(|shot| shot.media.is_none())
                .map(|shot| shot.shot_id.clone())
                .collect(),
            voiceover_clips: self.tracks.voiceover.len(),
            music_clips: self.tracks.music.len(),
            sound_effect_clips: self.tracks.sound_effects.len(),
        }
    }
}
