//! Audio alignment arithmetic and stage planning.
//!
//! Every layer is reconciled to the probed video duration `D`:
//!
//! | Stage | Output length |
//! |---|---|
//! | music trim | `D`, 3s fades at both ends |
//! | transition bed trim | `D - outro`, gain ×1.6 |
//! | narration lead-in | narration + lead-in silence |
//! | narration pad | `D` (trailing silence, never truncated) |
//! | duck narration | `D` |
//! | end-card align | `D`, narration placed at `D - 15` |
//! | duck end card | `D` |
//! | final mix | `D`, both inputs ×2.0 |
//! | merge | shortest of picture and audio |

use std::path::Path;

use slidecut_common::{PipelineConfig, SlidecutError, SlidecutResult};
use slidecut_project_model::{
    AudioLayer, AudioPlan, AudioRole, AudioStage, DuckPass, DuckingParams, Fade, FadeDirection,
    TemplateSet,
};

pub const MUSIC_FADE_SECS: f64 = 3.0;
pub const TRANSITION_BED_GAIN: f64 = 1.6;
pub const END_CARD_WINDOW_SECS: f64 = 15.0;
pub const FINAL_MIX_GAIN: f64 = 2.0;

/// Tolerance for stages that claim a fixed length.
pub const DURATION_EPSILON_SECS: f64 = 0.05;

/// Sidechain settings for both ducking passes.
pub const DUCKING: DuckingParams = DuckingParams {
    ratio: 3.0,
    threshold: 0.02,
    attack_ms: 20.0,
    release_ms: 500.0,
};

/// Intermediate file names inside the group directory.
pub mod files {
    pub const MUSIC: &str = "audio_music.wav";
    pub const TRANSITION_BED: &str = "audio_transition_bed.wav";
    pub const NARRATION_LEAD_IN: &str = "audio_narration_lead_in.wav";
    pub const NARRATION_PADDED: &str = "audio_narration_padded.wav";
    pub const DUCKED_NARRATION: &str = "audio_ducked_narration.wav";
    pub const NARRATION_END: &str = "audio_narration_end.wav";
    pub const DUCKED_END_CARD: &str = "audio_ducked_end_card.wav";
    pub const FINAL_MIX: &str = "audio_final_mix.wav";
}

/// Trailing silence that brings `actual` up to `target`.
///
/// Negative silence means the track is longer than the video; that is an
/// error, never a silent truncation.
pub fn trailing_silence(track: &str, target_secs: f64, actual_secs: f64) -> SlidecutResult<f64> {
    let silence = target_secs - actual_secs;
    if silence < 0.0 {
        return Err(SlidecutError::reconciliation(track, target_secs, actual_secs));
    }
    Ok(silence)
}

/// Length of the transition bed, which stops where the outro starts.
///
/// A video no longer than the outro leaves no room for the bed; the error
/// reports the bed length that would result.
pub fn transition_bed_secs(target_secs: f64, outro_secs: f64) -> SlidecutResult<f64> {
    let secs = target_secs - outro_secs;
    if secs <= 0.0 {
        return Err(SlidecutError::reconciliation(
            format!(
                "{} (video must be longer than the {outro_secs:.3}s outro)",
                AudioRole::TransitionBed
            ),
            target_secs,
            secs,
        ));
    }
    Ok(secs)
}

/// Silence around the end-card narration so it sits in the final window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndCardLayout {
    pub lead_silence_secs: f64,
    pub trailing_silence_secs: f64,
}

/// Place a narration of `narration_secs` at `target - 15` and pad to `target`.
pub fn end_card_layout(target_secs: f64, narration_secs: f64) -> SlidecutResult<EndCardLayout> {
    let lead = target_secs - END_CARD_WINDOW_SECS;
    if lead < 0.0 {
        return Err(SlidecutError::reconciliation(
            AudioRole::NarrationEnd.as_str(),
            target_secs,
            END_CARD_WINDOW_SECS,
        ));
    }
    let trailing = trailing_silence(
        AudioRole::NarrationEnd.as_str(),
        END_CARD_WINDOW_SECS,
        narration_secs,
    )
    .map_err(|_| {
        SlidecutError::reconciliation(
            AudioRole::NarrationEnd.as_str(),
            target_secs,
            lead + narration_secs,
        )
    })?;

    Ok(EndCardLayout {
        lead_silence_secs: lead,
        trailing_silence_secs: trailing,
    })
}

/// Fail unless `actual` is within the epsilon of `target`.
pub fn check_duration(track: &str, target_secs: f64, actual_secs: f64) -> SlidecutResult<()> {
    if (target_secs - actual_secs).abs() > DURATION_EPSILON_SECS {
        return Err(SlidecutError::reconciliation(track, target_secs, actual_secs));
    }
    Ok(())
}

/// Plans the audio stages for one group.
pub struct AudioAlignment<'a> {
    config: &'a PipelineConfig,
    templates: &'a TemplateSet,
}

impl<'a> AudioAlignment<'a> {
    pub fn new(config: &'a PipelineConfig, templates: &'a TemplateSet) -> Self {
        Self { config, templates }
    }

    /// Build the ordered stages for a video of `target_secs`.
    ///
    /// Intermediates are written to `work_dir`; the last stage merges the
    /// mix into `video` and writes `output`.
    pub fn plan(
        &self,
        target_secs: f64,
        outro_secs: f64,
        work_dir: &Path,
        video: &Path,
        output: &Path,
    ) -> SlidecutResult<AudioPlan> {
        if !(target_secs > 0.0) {
            return Err(SlidecutError::probe(
                video,
                format!("video duration must be positive, got {target_secs}"),
            ));
        }
        let bed_secs = transition_bed_secs(target_secs, outro_secs)?;
        let t = self.templates;
        let file = |name: &str| work_dir.join(name);

        let fades = vec![
            Fade {
                direction: FadeDirection::In,
                start_secs: 0.0,
                duration_secs: MUSIC_FADE_SECS,
            },
            Fade {
                direction: FadeDirection::Out,
                start_secs: (target_secs - MUSIC_FADE_SECS).max(0.0),
                duration_secs: MUSIC_FADE_SECS,
            },
        ];

        let layers = vec![
            AudioLayer {
                role: AudioRole::Music,
                source: t.music.clone(),
                target_secs,
                fades: fades.clone(),
                gain: 1.0,
            },
            AudioLayer {
                role: AudioRole::TransitionBed,
                source: t.transition_bed.clone(),
                target_secs: bed_secs,
                fades: Vec::new(),
                gain: TRANSITION_BED_GAIN,
            },
            AudioLayer {
                role: AudioRole::Narration,
                source: t.narration.clone(),
                target_secs,
                fades: Vec::new(),
                gain: 1.0,
            },
            AudioLayer {
                role: AudioRole::NarrationEnd,
                source: t.narration_end.clone(),
                target_secs,
                fades: Vec::new(),
                gain: 1.0,
            },
        ];

        let stages = vec![
            AudioStage::TrimMusic {
                source: t.music.clone(),
                output: file(files::MUSIC),
                duration_secs: target_secs,
                fades,
            },
            AudioStage::TrimTransitionBed {
                source: t.transition_bed.clone(),
                output: file(files::TRANSITION_BED),
                duration_secs: bed_secs,
                gain: TRANSITION_BED_GAIN,
            },
            AudioStage::PrependSilence {
                source: t.narration.clone(),
                output: file(files::NARRATION_LEAD_IN),
                silence_secs: self.config.narration_lead_in_secs,
            },
            AudioStage::PadToTarget {
                role: AudioRole::Narration,
                source: file(files::NARRATION_LEAD_IN),
                output: file(files::NARRATION_PADDED),
                target_secs,
            },
            AudioStage::Duck {
                pass: DuckPass::Narration,
                bed: file(files::MUSIC),
                control: file(files::NARRATION_PADDED),
                output: file(files::DUCKED_NARRATION),
                params: DUCKING,
                target_secs,
            },
            AudioStage::AlignEndCard {
                source: t.narration_end.clone(),
                output: file(files::NARRATION_END),
                window_start_secs: target_secs - END_CARD_WINDOW_SECS,
                window_secs: END_CARD_WINDOW_SECS,
                target_secs,
            },
            AudioStage::Duck {
                pass: DuckPass::EndCard,
                bed: file(files::DUCKED_NARRATION),
                control: file(files::NARRATION_END),
                output: file(files::DUCKED_END_CARD),
                params: DUCKING,
                target_secs,
            },
            AudioStage::FinalMix {
                bed: file(files::DUCKED_END_CARD),
                transitions: file(files::TRANSITION_BED),
                output: file(files::FINAL_MIX),
                gain: FINAL_MIX_GAIN,
                target_secs,
            },
            AudioStage::Merge {
                video: video.to_path_buf(),
                audio: file(files::FINAL_MIX),
                output: output.to_path_buf(),
            },
        ];

        tracing::debug!(
            duration_secs = target_secs,
            stages = stages.len(),
            "Planned audio alignment"
        );

        Ok(AudioPlan {
            target_secs,
            layers,
            stages,
        })
    }
}
