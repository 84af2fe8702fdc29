/*!
 * Timeline assembly.
 *
 * A pure transform from scenes, shots, their latest versions and the audio
 * assets into a `TimelineDocument`. Shot offsets accumulate across scene
 * boundaries in global playback order; sound effects are placed at the offset
 * of the shot they belong to, while voiceover and music each start at zero.
 */

use std::collections::BTreeMap;

use crate::production::{
    AudioAsset, AudioClip, Scene, SceneId, Shot, ShotId, ShotVersion, StoryBoard,
};

use super::model::{AudioTracks, MediaRef, TimelineDocument, TimelineScene, TimelineShot, TrackClip};

/// Round to milliseconds so tenth-second durations do not drift when summed
fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineAssembler;

impl TimelineAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(
        &self,
        scenes: &[Scene],
        shots_by_scene: &BTreeMap<SceneId, Vec<Shot>>,
        latest_versions: &BTreeMap<ShotId, ShotVersion>,
        audio: &AudioAsset,
    ) -> TimelineDocument {
        let mut ordered_scenes: Vec<&Scene> = scenes.iter().collect();
        ordered_scenes.sort_by_key(|scene| scene.sequence_number);

        let mut offset = 0.0;
        let mut timeline_scenes = Vec::with_capacity(ordered_scenes.len());
        let mut sound_effects = Vec::new();

        for scene in ordered_scenes {
            let mut shots: Vec<&Shot> = shots_by_scene
                .get(&scene.id)
                .map(|shots| shots.iter().collect())
                .unwrap_or_default();
            shots.sort_by_key(|shot| shot.sequence_number);

            let scene_start = offset;
            let mut timeline_shots = Vec::with_capacity(shots.len());

            for shot in shots {
                let start_offset = round_ms(offset);
                let media = latest_versions
                    .get(&shot.id)
                    .and_then(|version| version.artifacts.playback_media())
                    .map(|(kind, url)| MediaRef {
                        kind,
                        url: url.to_string(),
                    });

                if let Some(effect) = audio.sound_effects.get(&shot.id) {
                    sound_effects.push(TrackClip {
                        url: effect.url.clone(),
                        start_offset,
                        duration: effect.duration,
                        shot_id: Some(shot.id.clone()),
                    });
                }

                timeline_shots.push(TimelineShot {
                    shot_id: shot.id.clone(),
                    sequence_number: shot.sequence_number,
                    start_offset,
                    duration: shot.duration,
                    media,
                    camera_movement: shot.camera_movement.clone(),
                    loop_count: shot.loop_count,
                });

                offset += shot.duration;
            }

            timeline_scenes.push(TimelineScene {
                scene_id: scene.id.clone(),
                sequence_number: scene.sequence_number,
                title: scene.title.clone(),
                start_offset: round_ms(scene_start),
                duration: round_ms(offset - scene_start),
                loop_count: scene.loop_count,
                shots: timeline_shots,
            });
        }

        let whole_track = |clip: &Option<AudioClip>| -> Vec<TrackClip> {
            clip.iter()
                .map(|clip| TrackClip {
                    url: clip.url.clone(),
                    start_offset: 0.0,
                    duration: clip.duration,
                    shot_id: None,
                })
                .collect()
        };

        TimelineDocument {
            scenes: timeline_scenes,
            tracks: AudioTracks {
                voiceover: whole_track(&audio.voiceover),
                music: whole_track(&audio.music),
                sound_effects,
            },
            total_duration: round_ms(offset),
        }
    }

    /// Assemble straight from a storyboard
    pub fn assemble_board(
        &self,
        board: &StoryBoard,
        latest_versions: &BTreeMap<ShotId, ShotVersion>,
        audio: &AudioAsset,
    ) -> TimelineDocument {
        self.assemble(&board.scenes, &board.shots_by_scene, latest_versions, audio)
    }
}
