/*!
 * Step 5: voiceover, music and per-shot sound effects.
 *
 * Voiceover and music are independent and generated concurrently; either one
 * failing fails the stage. Sound effects run one shot at a time and a failed
 * effect is logged and skipped.
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::StageError;
use crate::pipeline::prompts;
use crate::pipeline::stage::{Stage, StageContext, StageOutput};
use crate::pipeline::steps::PipelineStep;
use crate::production::{AudioAsset, AudioClip, ShotId, ShotVersion, StoryBoard};
use crate::providers::{MusicRequest, SoundEffectRequest, SpeechRequest};

use super::atmosphere::AtmosphereOutput;
use super::flow_design::FlowDesignOutput;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundscapeOutput {
    pub audio: AudioAsset,
    /// Shots whose sound effect failed
    #[serde(default)]
    pub skipped_sound_effects: Vec<ShotId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SoundscapeStage;

impl SoundscapeStage {
    async fn voiceover(
        &self,
        ctx: &StageContext<'_>,
        board: &StoryBoard,
        atmosphere: &str,
    ) -> Result<(Option<AudioClip>, f64), StageError> {
        let settings = ctx.settings();
        if !settings.voiceover.enabled {
            return Ok((None, 0.0));
        }

        let request = prompts::voiceover_script_request(ctx.brief(), atmosphere, board, settings);
        let script = ctx.collaborators.text.generate_text(request).await?.into_text();
        let speech = ctx
            .collaborators
            .audio
            .generate_speech(SpeechRequest {
                script: script.value,
                voice_id: settings.voiceover.voice_id.clone(),
                language: settings.voiceover.language.clone(),
                model: settings.models.voice.clone(),
            })
            .await?;

        debug!("Voiceover generated ({:.1}s)", speech.value.duration);
        Ok((Some(speech.value), script.cost + speech.cost))
    }

    async fn music(
        &self,
        ctx: &StageContext<'_>,
        board: &StoryBoard,
        atmosphere: &str,
    ) -> Result<(Option<AudioClip>, f64), StageError> {
        let settings = ctx.settings();
        if !settings.music.enabled {
            return Ok((None, 0.0));
        }

        let generated = ctx
            .collaborators
            .audio
            .generate_music(MusicRequest {
                prompt: prompts::music_prompt(atmosphere, settings),
                duration: board.total_duration(),
                model: settings.models.music.clone(),
            })
            .await?;

        debug!("Music generated ({:.1}s)", generated.value.duration);
        Ok((Some(generated.value), generated.cost))
    }

    async fn sound_effects(
        &self,
        ctx: &StageContext<'_>,
        board: &StoryBoard,
        latest: &BTreeMap<ShotId, ShotVersion>,
    ) -> (BTreeMap<ShotId, AudioClip>, Vec<ShotId>, f64) {
        let mut clips = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut cost = 0.0;

        for (_, shot) in board.playback_order() {
            let Some((_, media_url)) = latest
                .get(&shot.id)
                .and_then(|version| version.artifacts.playback_media())
            else {
                debug!("Shot {} has no media, no sound effect", shot.id);
                continue;
            };

            let request = SoundEffectRequest {
                video_url: media_url.to_string(),
                prompt: prompts::sound_effect_prompt(shot),
                model: ctx.settings().models.sound_effect.clone(),
            };
            match ctx.collaborators.audio.generate_sound_effect(request).await {
                Ok(generated) => {
                    cost += generated.cost;
                    clips.insert(shot.id.clone(), generated.value);
                }
                Err(e) => {
                    warn!("Sound effect for shot {} failed, skipping: {}", shot.id, e);
                    skipped.push(shot.id.clone());
                }
            }
        }

        (clips, skipped, cost)
    }
}

#[async_trait]
impl Stage for SoundscapeStage {
    fn step(&self) -> PipelineStep {
        PipelineStep::Soundscape
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let flow: FlowDesignOutput = ctx.input(PipelineStep::FlowDesign).await?;
        let atmosphere: AtmosphereOutput = ctx.input(PipelineStep::Atmosphere).await?;
        let board = &flow.board;
        let mood = atmosphere.mood_description.as_str();

        let (voiceover, music) = tokio::join!(
            self.voiceover(ctx, board, mood),
            self.music(ctx, board, mood)
        );
        let (voiceover, voiceover_cost) = voiceover?;
        let (music, music_cost) = music?;

        let (sound_effects, skipped, effects_cost) = if ctx.settings().sound_effects.enabled {
            let latest = ctx.repository.latest_shot_versions(ctx.job_id()).await?;
            self.sound_effects(ctx, board, &latest).await
        } else {
            (BTreeMap::new(), Vec::new(), 0.0)
        };

        info!(
            "Soundscape: voiceover {}, music {}, {} sound effects ({} skipped)",
            if voiceover.is_some() { "yes" } else { "no" },
            if music.is_some() { "yes" } else { "no" },
            sound_effects.len(),
            skipped.len()
        );

        StageOutput::completed(
            &SoundscapeOutput {
                audio: AudioAsset {
                    voiceover,
                    music,
                    sound_effects,
                },
                skipped_sound_effects: skipped,
            },
            voiceover_cost + music_cost + effects_cost,
        )
    }
}
