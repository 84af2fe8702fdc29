/*!
 * Common test utilities for the reelsmith test suite
 */

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reelsmith::jobs::JobManager;
use reelsmith::pipeline::{PipelineConfig, PipelineController};
use reelsmith::production::{DurationBucket, GenerationSettings, Scene, Shot, StoryBoard};
use reelsmith::providers::mock::MockStudio;
use reelsmith::providers::Collaborators;

/// Route library logs through env_logger; `RUST_LOG=debug` shows them
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Pipeline config with near-instant render polling
pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_render_polling(Duration::from_millis(1), 5)
}

/// Controller over an in-memory database; the studio stays inspectable
pub fn controller_with(studio: MockStudio) -> (PipelineController, Arc<MockStudio>) {
    init_logging();
    let studio = Arc::new(studio);
    let controller = PipelineController::new(
        JobManager::new_in_memory().expect("in-memory database"),
        Collaborators::from_studio(studio.clone()),
        fast_config(),
    );
    (controller, studio)
}

/// Calm nature piece, two minutes, medium pacing
pub fn forest_rain_settings() -> GenerationSettings {
    GenerationSettings {
        mood: "calm".to_string(),
        theme: "nature".to_string(),
        duration: DurationBucket::Minutes2,
        pacing: 50,
        ..GenerationSettings::default()
    }
}

pub fn scene(id: &str, sequence_number: u32, duration: f64) -> Scene {
    Scene {
        id: id.to_string(),
        sequence_number,
        title: format!("Scene {}", sequence_number),
        description: String::new(),
        duration,
        loop_count: None,
    }
}

pub fn shot(id: &str, scene_id: &str, sequence_number: u32, duration: f64) -> Shot {
    Shot {
        id: id.to_string(),
        scene_id: scene_id.to_string(),
        sequence_number,
        description: format!("shot {}", id),
        camera_movement: "static".to_string(),
        duration,
        loop_count: None,
    }
}

/// Storyboard with one scene per entry and `s{scene}-{shot}` shot ids
pub fn board(shot_durations: &[&[f64]]) -> StoryBoard {
    let mut board = StoryBoard {
        scenes: Vec::new(),
        shots_by_scene: BTreeMap::new(),
    };
    for (i, durations) in shot_durations.iter().enumerate() {
        let scene_id = format!("s{}", i + 1);
        board
            .scenes
            .push(scene(&scene_id, i as u32 + 1, durations.iter().sum()));
        let shots = durations
            .iter()
            .enumerate()
            .map(|(j, d)| shot(&format!("{}-{}", scene_id, j + 1), &scene_id, j as u32 + 1, *d))
            .collect();
        board.shots_by_scene.insert(scene_id, shots);
    }
    board
}
