/*!
 * Prompt templates and structured-output schemas for the pipeline stages.
 *
 * Templates use `{placeholder}` substitution. Structured tasks carry a JSON
 * schema whose `minItems`/`maxItems` encode the pacing bounds, so the model
 * is asked for a count the flow design stage will accept.
 */

use serde_json::{Value, json};

use crate::production::{
    AnimationMode, CountBounds, FrameMode, GenerationSettings, Scene, Shot, ShotPrompts,
    StoryBoard, VisualWorld,
};
use crate::providers::TextRequest;

/// Task labels sent with every text request
pub mod tasks {
    pub const ATMOSPHERE: &str = "atmosphere";
    pub const SCENE_BREAKDOWN: &str = "scene_breakdown";
    pub const SHOT_COMPOSITION: &str = "shot_composition";
    pub const VOICEOVER_SCRIPT: &str = "voiceover_script";
}

const ATMOSPHERE_SYSTEM: &str = r#"You are a creative director for short ambient videos.

Describe the atmosphere of the piece in one vivid paragraph:
- Sensory detail over plot
- Consistent with the requested mood and theme
- No camera directions, no shot lists"#;

const ATMOSPHERE_USER: &str = "Brief: {brief}\nMood: {mood}\nTheme: {theme}";

const SCENE_BREAKDOWN_SYSTEM: &str = r#"You are a film editor planning the structure of a {duration}-second video.

## Output Requirements
- Return ONLY valid JSON matching the requested schema
- Between {min} and {max} scenes, ideally {target}
- Each scene has a title, a one-sentence description and a duration in seconds
- Durations should add up to roughly {duration} seconds"#;

const SCENE_BREAKDOWN_USER: &str =
    "Brief: {brief}\nAtmosphere: {atmosphere}\nMood: {mood}\nTheme: {theme}";

const SHOT_COMPOSITION_SYSTEM: &str = r#"You are a cinematographer breaking one scene into shots.

## Output Requirements
- Return ONLY valid JSON matching the requested schema
- Between {min} and {max} shots, ideally {target}
- Each shot has a description, a camera movement and a duration in seconds
- Durations should add up to roughly {duration} seconds
- Optionally propose continuity groups: runs of 2 to 5 consecutive shot
  numbers whose frames should flow into each other, with a transition
  (seamless, match-cut, morph, camera-continuation)"#;

const SHOT_COMPOSITION_USER: &str = r#"Scene {number} of {total}: {title}
{description}
Atmosphere: {atmosphere}
Art style: {art_style}"#;

const VOICEOVER_SYSTEM: &str = r#"You write narration for ambient videos.
Write a calm voiceover script in {language} that fits within {duration} seconds when read aloud.
Return only the script text."#;

const VOICEOVER_USER: &str = "Brief: {brief}\nAtmosphere: {atmosphere}\nScenes:\n{scenes}";

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("{{{}}}", key), value)
    })
}

fn text_request(task: &str, system_prompt: String, user_prompt: String, settings: &GenerationSettings) -> TextRequest {
    TextRequest {
        task: task.to_string(),
        system_prompt,
        user_prompt,
        output_schema: None,
        model: settings.models.text.clone(),
    }
}

pub fn atmosphere_request(brief: &str, settings: &GenerationSettings) -> TextRequest {
    let user = render(
        ATMOSPHERE_USER,
        &[("brief", brief), ("mood", &settings.mood), ("theme", &settings.theme)],
    );
    text_request(tasks::ATMOSPHERE, ATMOSPHERE_SYSTEM.to_string(), user, settings)
}

/// Schema for the scene breakdown answer
pub fn scene_schema(bounds: &CountBounds) -> Value {
    json!({
        "type": "object",
        "required": ["scenes"],
        "properties": {
            "scenes": {
                "type": "array",
                "minItems": bounds.min,
                "maxItems": bounds.max,
                "items": {
                    "type": "object",
                    "required": ["title", "description", "duration"],
                    "properties": {
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "duration": { "type": "number", "minimum": 1 }
                    }
                }
            }
        }
    })
}

pub fn scene_breakdown_request(
    brief: &str,
    atmosphere: &str,
    settings: &GenerationSettings,
    bounds: &CountBounds,
) -> TextRequest {
    let duration = settings.duration.seconds().to_string();
    let system = render(
        SCENE_BREAKDOWN_SYSTEM,
        &[
            ("duration", &duration),
            ("min", &bounds.min.to_string()),
            ("max", &bounds.max.to_string()),
            ("target", &bounds.target.to_string()),
        ],
    );
    let user = render(
        SCENE_BREAKDOWN_USER,
        &[
            ("brief", brief),
            ("atmosphere", atmosphere),
            ("mood", &settings.mood),
            ("theme", &settings.theme),
        ],
    );
    let mut request = text_request(tasks::SCENE_BREAKDOWN, system, user, settings);
    request.output_schema = Some(scene_schema(bounds));
    request
}

/// Schema for the shot composition answer of one scene
pub fn shot_schema(bounds: &CountBounds) -> Value {
    json!({
        "type": "object",
        "required": ["shots"],
        "properties": {
            "shots": {
                "type": "array",
                "minItems": bounds.min,
                "maxItems": bounds.max,
                "items": {
                    "type": "object",
                    "required": ["description", "camera_movement", "duration"],
                    "properties": {
                        "description": { "type": "string" },
                        "camera_movement": { "type": "string" },
                        "duration": { "type": "number", "minimum": 0.1 }
                    }
                }
            },
            "continuity_groups": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["shot_numbers"],
                    "properties": {
                        "shot_numbers": {
                            "type": "array",
                            "items": { "type": "integer", "minimum": 1 }
                        },
                        "transition": { "type": "string" }
                    }
                }
            }
        }
    })
}

pub fn shot_composition_request(
    scene: &Scene,
    scene_total: usize,
    atmosphere: &str,
    settings: &GenerationSettings,
    bounds: &CountBounds,
) -> TextRequest {
    let system = render(
        SHOT_COMPOSITION_SYSTEM,
        &[
            ("min", &bounds.min.to_string()),
            ("max", &bounds.max.to_string()),
            ("target", &bounds.target.to_string()),
            ("duration", &scene.duration.to_string()),
        ],
    );
    let user = render(
        SHOT_COMPOSITION_USER,
        &[
            ("number", &scene.sequence_number.to_string()),
            ("total", &scene_total.to_string()),
            ("title", &scene.title),
            ("description", &scene.description),
            ("atmosphere", atmosphere),
            ("art_style", &settings.visual_world.art_style),
        ],
    );
    let mut request = text_request(tasks::SHOT_COMPOSITION, system, user, settings);
    request.output_schema = Some(shot_schema(bounds));
    request
}

pub fn voiceover_script_request(
    brief: &str,
    atmosphere: &str,
    board: &StoryBoard,
    settings: &GenerationSettings,
) -> TextRequest {
    let scenes = board
        .ordered_scenes()
        .iter()
        .map(|scene| format!("{}. {} ({:.0}s): {}", scene.sequence_number, scene.title, scene.duration, scene.description))
        .collect::<Vec<_>>()
        .join("\n");
    let duration = format!("{:.0}", board.total_duration());
    let system = render(
        VOICEOVER_SYSTEM,
        &[("language", &settings.voiceover.language), ("duration", &duration)],
    );
    let user = render(
        VOICEOVER_USER,
        &[("brief", brief), ("atmosphere", atmosphere), ("scenes", &scenes)],
    );
    text_request(tasks::VOICEOVER_SCRIPT, system, user, settings)
}

pub fn music_prompt(atmosphere: &str, settings: &GenerationSettings) -> String {
    let style = settings.music.style.as_deref().unwrap_or("ambient");
    format!("{} music, {} mood, {} theme. {}", style, settings.mood, settings.theme, atmosphere)
}

pub fn sound_effect_prompt(shot: &Shot) -> String {
    format!("Ambient sound for: {}", shot.description)
}

fn visual_style(world: &VisualWorld) -> String {
    if world.color_palette.is_empty() {
        world.art_style.clone()
    } else {
        format!("{}, palette {}", world.art_style, world.color_palette.join(", "))
    }
}

/// Prompts for one shot, filled in for the frames the modes actually need
pub fn shot_prompts(
    scene: &Scene,
    shot: &Shot,
    world: &VisualWorld,
    atmosphere: &str,
    settings: &GenerationSettings,
) -> ShotPrompts {
    let style = visual_style(world);
    let base = format!("{} {}: {}. {}", style, scene.title, shot.description, atmosphere);

    let mut prompts = ShotPrompts::default();
    match settings.frame_mode {
        FrameMode::ImageReference => {
            prompts.image = Some(base);
        }
        FrameMode::StartEndFrame => {
            prompts.start_frame = Some(format!("Opening frame. {}", base));
            prompts.end_frame = Some(format!(
                "Closing frame after a {}. {}",
                shot.camera_movement, base
            ));
        }
    }
    if settings.animation_mode == AnimationMode::VideoAnimation {
        prompts.clip = Some(format!(
            "{}, {:.1}s. {}",
            shot.camera_movement, shot.duration, shot.description
        ));
    }
    prompts
}
