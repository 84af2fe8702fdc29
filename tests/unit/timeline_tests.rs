/*!
 * Timeline assembly tests
 */

use std::collections::BTreeMap;

use reelsmith::production::{
    AudioAsset, AudioClip, MediaKind, ShotArtifacts, ShotPrompts, ShotVersion, ShotVersionStatus,
};
use reelsmith::timeline::TimelineAssembler;
use crate::common;

fn version(shot_id: &str, artifacts: ShotArtifacts) -> ShotVersion {
    ShotVersion {
        shot_id: shot_id.to_string(),
        version: 1,
        prompts: ShotPrompts::default(),
        artifacts,
        status: ShotVersionStatus::Completed,
        error: None,
        cost: 0.0,
    }
}

#[test]
fn test_assemble_shotOffsets_shouldRunContinuouslyAcrossScenes() {
    let board = common::board(&[&[2.0, 3.0], &[4.0], &[1.0, 1.0, 1.0]]);

    let document =
        TimelineAssembler::new().assemble_board(&board, &BTreeMap::new(), &AudioAsset::default());

    let offsets: Vec<f64> = document.shots().map(|shot| shot.start_offset).collect();
    assert_eq!(offsets, vec![0.0, 2.0, 5.0, 9.0, 10.0, 11.0]);
    assert_eq!(document.total_duration, 12.0);
}

#[test]
fn test_assemble_missingMedia_shouldStillOccupyItsSlot() {
    let board = common::board(&[&[2.0, 3.0, 1.5]]);
    let mut latest = BTreeMap::new();
    latest.insert(
        "s1-1".to_string(),
        version(
            "s1-1",
            ShotArtifacts {
                clip_url: Some("clip-1".to_string()),
                ..ShotArtifacts::default()
            },
        ),
    );
    latest.insert(
        "s1-3".to_string(),
        version(
            "s1-3",
            ShotArtifacts {
                image_url: Some("image-3".to_string()),
                ..ShotArtifacts::default()
            },
        ),
    );

    let document = TimelineAssembler::new().assemble_board(&board, &latest, &AudioAsset::default());

    let shots: Vec<_> = document.shots().collect();
    assert!(shots[1].media.is_none());
    assert_eq!(shots[2].start_offset, 5.0);
    assert_eq!(shots[2].media.as_ref().unwrap().kind, MediaKind::Image);
    assert_eq!(document.summary().shots_without_media, vec!["s1-2".to_string()]);
}

#[test]
fn test_assemble_soundEffects_shouldAlignWithTheirShots() {
    let board = common::board(&[&[2.0, 3.0], &[4.0]]);
    let mut audio = AudioAsset {
        music: Some(AudioClip {
            url: "music".to_string(),
            duration: 9.0,
        }),
        ..AudioAsset::default()
    };
    audio.sound_effects.insert(
        "s2-1".to_string(),
        AudioClip {
            url: "sfx".to_string(),
            duration: 1.0,
        },
    );

    let document = TimelineAssembler::new().assemble_board(&board, &BTreeMap::new(), &audio);

    assert_eq!(document.tracks.music.len(), 1);
    assert_eq!(document.tracks.music[0].start_offset, 0.0);
    assert_eq!(document.tracks.sound_effects.len(), 1);
    assert_eq!(document.tracks.sound_effects[0].start_offset, 5.0);
    assert_eq!(document.tracks.sound_effects[0].shot_id.as_deref(), Some("s2-1"));
}
