/*!
 * Core production entities: scenes, shots, shot versions and audio.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type SceneId = String;
pub type ShotId = String;

/// A top-level ordered segment of the video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    /// 1-based, contiguous across the job
    pub sequence_number: u32,
    pub title: String,
    pub description: String,
    /// Target duration in seconds
    pub duration: f64,
    #[serde(default)]
    pub loop_count: Option<u32>,
}

/// The smallest addressable visual unit inside a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub id: ShotId,
    pub scene_id: SceneId,
    /// 1-based, contiguous within the owning scene
    pub sequence_number: u32,
    /// Duration in seconds
    pub duration: f64,
    pub camera_movement: String,
    pub description: String,
    #[serde(default)]
    pub loop_count: Option<u32>,
}

/// Media produced for a shot by one generation attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotArtifacts {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub start_frame_url: Option<String>,
    #[serde(default)]
    pub end_frame_url: Option<String>,
    #[serde(default)]
    pub clip_url: Option<String>,
}

impl ShotArtifacts {
    /// Best media reference for playback: clip, then still, then nothing
    pub fn playback_media(&self) -> Option<(MediaKind, &str)> {
        if let Some(clip) = &self.clip_url {
            return Some((MediaKind::Clip, clip));
        }
        self.image_url
            .as_deref()
            .map(|image| (MediaKind::Image, image))
    }

    pub fn is_empty(&self) -> bool {
        self.image_url.is_none()
            && self.start_frame_url.is_none()
            && self.end_frame_url.is_none()
            && self.clip_url.is_none()
    }
}

/// Kind of media a timeline entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Clip,
    Image,
}

/// Status of one shot version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotVersionStatus {
    PromptGenerated,
    ImagesGenerated,
    Completed,
    Failed,
}

impl fmt::Display for ShotVersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShotVersionStatus::PromptGenerated => write!(f, "prompt_generated"),
            ShotVersionStatus::ImagesGenerated => write!(f, "images_generated"),
            ShotVersionStatus::Completed => write!(f, "completed"),
            ShotVersionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ShotVersionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prompt_generated" => Ok(ShotVersionStatus::PromptGenerated),
            "images_generated" => Ok(ShotVersionStatus::ImagesGenerated),
            "completed" => Ok(ShotVersionStatus::Completed),
            "failed" => Ok(ShotVersionStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid shot version status: {}", s)),
        }
    }
}

/// Prompts used for one generation attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotPrompts {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub start_frame: Option<String>,
    #[serde(default)]
    pub end_frame: Option<String>,
    #[serde(default)]
    pub clip: Option<String>,
}

/// One generation attempt for a shot; versions are append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotVersion {
    pub shot_id: ShotId,
    /// 1-based, increasing per shot
    pub version: u32,
    pub prompts: ShotPrompts,
    pub artifacts: ShotArtifacts,
    pub status: ShotVersionStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub cost: f64,
}

/// A single audio clip with its known duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub url: String,
    /// Duration in seconds
    pub duration: f64,
}

/// Audio produced by the soundscape stage; every part is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioAsset {
    #[serde(default)]
    pub voiceover: Option<AudioClip>,
    #[serde(default)]
    pub music: Option<AudioClip>,
    #[serde(default)]
    pub sound_effects: BTreeMap<ShotId, AudioClip>,
}

/// Scenes and their shots as produced by flow design
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryBoard {
    pub scenes: Vec<Scene>,
    pub shots_by_scene: BTreeMap<SceneId, Vec<Shot>>,
}

impl StoryBoard {
    /// Scenes in sequence order
    pub fn ordered_scenes(&self) -> Vec<&Scene> {
        let mut scenes: Vec<&Scene> = self.scenes.iter().collect();
        scenes.sort_by_key(|s| s.sequence_number);
        scenes
    }

    /// Shots of one scene in sequence order
    pub fn ordered_shots(&self, scene_id: &str) -> Vec<&Shot> {
        let mut shots: Vec<&Shot> = self
            .shots_by_scene
            .get(scene_id)
            .map(|shots| shots.iter().collect())
            .unwrap_or_default();
        shots.sort_by_key(|s| s.sequence_number);
        shots
    }

    /// Every shot in global playback order, paired with its scene's sequence number
    pub fn playback_order(&self) -> Vec<(u32, &Shot)> {
        self.ordered_scenes()
            .into_iter()
            .flat_map(|scene| {
                self.ordered_shots(&scene.id)
                    .into_iter()
                    .map(move |shot| (scene.sequence_number, shot))
            })
            .collect()
    }

    pub fn shot_count(&self) -> usize {
        self.shots_by_scene.values().map(Vec::len).sum()
    }

    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(id: &str, scene: &str, n: u32) -> Shot {
        Shot {
            id: id.to_string(),
            scene_id: scene.to_string(),
            sequence_number: n,
            duration: 2.0,
            camera_movement: "static".to_string(),
            description: String::new(),
            loop_count: None,
        }
    }

    fn scene(id: &str, n: u32) -> Scene {
        Scene {
            id: id.to_string(),
            sequence_number: n,
            title: id.to_string(),
            description: String::new(),
            duration: 4.0,
            loop_count: None,
        }
    }

    #[test]
    fn test_shotArtifacts_playbackMedia_shouldPreferClipOverImage() {
        let artifacts = ShotArtifacts {
            image_url: Some("img".to_string()),
            clip_url: Some("clip".to_string()),
            ..Default::default()
        };
        assert_eq!(artifacts.playback_media(), Some((MediaKind::Clip, "clip")));

        let still = ShotArtifacts {
            image_url: Some("img".to_string()),
            ..Default::default()
        };
        assert_eq!(still.playback_media(), Some((MediaKind::Image, "img")));

        assert_eq!(ShotArtifacts::default().playback_media(), None);
    }

    #[test]
    fn test_storyBoard_playbackOrder_shouldSortScenesThenShots() {
        let mut board = StoryBoard {
            scenes: vec![scene("b", 2), scene("a", 1)],
            shots_by_scene: BTreeMap::new(),
        };
        board
            .shots_by_scene
            .insert("a".to_string(), vec![shot("a2", "a", 2), shot("a1", "a", 1)]);
        board
            .shots_by_scene
            .insert("b".to_string(), vec![shot("b1", "b", 1)]);

        let order: Vec<&str> = board
            .playback_order()
            .iter()
            .map(|(_, s)| s.id.as_str())
            .collect();

        assert_eq!(order, vec!["a1", "a2", "b1"]);
        assert_eq!(board.shot_count(), 3);
    }

    #[test]
    fn test_shotVersionStatus_parse_shouldRoundTripDisplay() {
        for status in [
            ShotVersionStatus::PromptGenerated,
            ShotVersionStatus::ImagesGenerated,
            ShotVersionStatus::Completed,
            ShotVersionStatus::Failed,
        ] {
            let parsed: ShotVersionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
