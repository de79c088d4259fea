//! Ordered segments and the frame budget.

use std::fmt;

use serde::{Deserialize, Serialize};
use slidecut_common::{SlidecutError, SlidecutResult};

use crate::asset::{Asset, AssetKind};

/// Named transition styles for crossfades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    HBlur,
    SmoothUp,
    HorzOpen,
    CircleOpen,
    DiagTr,
    DiagBl,
}

impl TransitionKind {
    /// The palette each boundary draws from, in draw-index order.
    pub const PALETTE: [TransitionKind; 6] = [
        TransitionKind::HBlur,
        TransitionKind::SmoothUp,
        TransitionKind::HorzOpen,
        TransitionKind::CircleOpen,
        TransitionKind::DiagTr,
        TransitionKind::DiagBl,
    ];

    /// Name understood by the `xfade` filter.
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionKind::HBlur => "hblur",
            TransitionKind::SmoothUp => "smoothup",
            TransitionKind::HorzOpen => "horzopen",
            TransitionKind::CircleOpen => "circleopen",
            TransitionKind::DiagTr => "diagtr",
            TransitionKind::DiagBl => "diagbl",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asset placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub asset: Asset,
    /// Position in the timeline, also the engine input index.
    pub index: usize,
    /// Slide duration for images, native duration for videos and the outro.
    pub nominal_secs: f64,
}

/// Ordered segments ending with exactly one outro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    segments: Vec<Segment>,
    slide_secs: f64,
    outro_secs: f64,
    fps: u32,
}

impl Timeline {
    /// Build a timeline, checking the outro invariant.
    pub fn new(segments: Vec<Segment>, slide_secs: f64, fps: u32) -> SlidecutResult<Self> {
        let outro_count = segments
            .iter()
            .filter(|s| s.asset.kind == AssetKind::Outro)
            .count();
        let last_is_outro = segments
            .last()
            .is_some_and(|s| s.asset.kind == AssetKind::Outro);

        if outro_count != 1 || !last_is_outro {
            return Err(SlidecutError::config(
                "Timeline must end with exactly one outro segment",
            ));
        }

        let outro_secs = segments
            .last()
            .map(|s| s.nominal_secs)
            .unwrap_or_default();

        Ok(Self {
            segments,
            slide_secs,
            outro_secs,
            fps,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn slide_secs(&self) -> f64 {
        self.slide_secs
    }

    pub fn outro_secs(&self) -> f64 {
        self.outro_secs
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Expected clip length: every segment at slide duration except the
    /// outro, which runs for its own length.
    pub fn expected_secs(&self) -> f64 {
        self.segment_count() as f64 * self.slide_secs + (self.outro_secs - self.slide_secs)
    }

    /// Hard cap on encoded frames, independent of the graph.
    pub fn frame_budget(&self) -> u64 {
        frame_budget(
            self.segment_count(),
            self.slide_secs,
            self.outro_secs,
            self.fps,
        )
    }
}

/// `(segments * slide + (outro - slide)) * fps`, rounded up to whole frames.
pub fn frame_budget(segment_count: usize, slide_secs: f64, outro_secs: f64, fps: u32) -> u64 {
    let raw = (segment_count as f64 * slide_secs + (outro_secs - slide_secs)) * fps as f64;
    if raw <= 0.0 {
        return 0;
    }
    // Float noise must not add a frame to an exact count.
    let nearest = raw.round();
    if (raw - nearest).abs() < 1e-6 {
        nearest as u64
    } else {
        raw.ceil() as u64
    }
}
