//! Audio layers and the ordered alignment stages.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What an audio layer is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioRole {
    Music,
    TransitionBed,
    Narration,
    NarrationEnd,
}

impl AudioRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioRole::Music => "music",
            AudioRole::TransitionBed => "transition_bed",
            AudioRole::Narration => "narration",
            AudioRole::NarrationEnd => "narration_end",
        }
    }
}

impl fmt::Display for AudioRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fade {
    pub direction: FadeDirection,
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// One independently authored track and the length it must end up at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioLayer {
    pub role: AudioRole,
    pub source: PathBuf,
    /// Always derived from the probed video duration.
    pub target_secs: f64,
    pub fades: Vec<Fade>,
    pub gain: f64,
}

/// Sidechain compressor settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuckingParams {
    pub ratio: f64,
    pub threshold: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

/// Which control track drives a ducking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuckPass {
    Narration,
    EndCard,
}

/// One step of the audio pipeline. Each stage reads earlier outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum AudioStage {
    /// Cut to `[0, duration]` and fade in/out.
    TrimMusic {
        source: PathBuf,
        output: PathBuf,
        duration_secs: f64,
        fades: Vec<Fade>,
    },
    /// Cut to `[0, duration]` and boost.
    TrimTransitionBed {
        source: PathBuf,
        output: PathBuf,
        duration_secs: f64,
        gain: f64,
    },
    /// Put fixed silence in front of a track.
    PrependSilence {
        source: PathBuf,
        output: PathBuf,
        silence_secs: f64,
    },
    /// Append trailing silence so the track is exactly `target_secs` long.
    /// The silence length is only known once the source is probed.
    PadToTarget {
        role: AudioRole,
        source: PathBuf,
        output: PathBuf,
        target_secs: f64,
    },
    /// Duck `bed` under `control`, then mix both at unity gain.
    Duck {
        pass: DuckPass,
        bed: PathBuf,
        control: PathBuf,
        output: PathBuf,
        params: DuckingParams,
        target_secs: f64,
    },
    /// Place the end-card narration in the final window of the timeline.
    AlignEndCard {
        source: PathBuf,
        output: PathBuf,
        window_start_secs: f64,
        window_secs: f64,
        target_secs: f64,
    },
    /// Additive mix of the ducked bed and the transition bed.
    FinalMix {
        bed: PathBuf,
        transitions: PathBuf,
        output: PathBuf,
        gain: f64,
        target_secs: f64,
    },
    /// Attach the mixed audio to the picture stream.
    Merge {
        video: PathBuf,
        audio: PathBuf,
        output: PathBuf,
    },
}

impl AudioStage {
    /// Stage identifier used in logs and errors.
    pub fn id(&self) -> &'static str {
        match self {
            AudioStage::TrimMusic { .. } => "music_trim",
            AudioStage::TrimTransitionBed { .. } => "transition_bed_trim",
            AudioStage::PrependSilence { .. } => "narration_lead_in",
            AudioStage::PadToTarget { .. } => "narration_pad",
            AudioStage::Duck {
                pass: DuckPass::Narration,
                ..
            } => "duck_narration",
            AudioStage::Duck {
                pass: DuckPass::EndCard,
                ..
            } => "duck_end_card",
            AudioStage::AlignEndCard { .. } => "end_card_align",
            AudioStage::FinalMix { .. } => "final_mix",
            AudioStage::Merge { .. } => "merge",
        }
    }

    pub fn output(&self) -> &Path {
        match self {
            AudioStage::TrimMusic { output, .. }
            | AudioStage::TrimTransitionBed { output, .. }
            | AudioStage::PrependSilence { output, .. }
            | AudioStage::PadToTarget { output, .. }
            | AudioStage::Duck { output, .. }
            | AudioStage::AlignEndCard { output, .. }
            | AudioStage::FinalMix { output, .. }
            | AudioStage::Merge { output, .. } => output,
        }
    }

    /// Length the output must match, when the stage claims one.
    pub fn expected_secs(&self) -> Option<f64> {
        match self {
            AudioStage::TrimMusic { duration_secs, .. }
            | AudioStage::TrimTransitionBed { duration_secs, .. } => Some(*duration_secs),
            AudioStage::PadToTarget { target_secs, .. }
            | AudioStage::Duck { target_secs, .. }
            | AudioStage::AlignEndCard { target_secs, .. }
            | AudioStage::FinalMix { target_secs, .. } => Some(*target_secs),
            AudioStage::PrependSilence { .. } | AudioStage::Merge { .. } => None,
        }
    }
}

/// Ordered audio stages for one group, ending in the merged video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPlan {
    /// Probed duration of the compiled video.
    pub target_secs: f64,
    pub layers: Vec<AudioLayer>,
    pub stages: Vec<AudioStage>,
}

impl AudioPlan {
    /// Output of the last audio-only stage (the mixed stream).
    pub fn mixed_output(&self) -> Option<&Path> {
        self.stages
            .iter()
            .rev()
            .find(|s| matches!(s, AudioStage::FinalMix { .. }))
            .map(AudioStage::output)
    }

    pub fn stage_ids(&self) -> Vec<&'static str> {
        self.stages.iter().map(AudioStage::id).collect()
    }
}
