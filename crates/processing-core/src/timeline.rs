//! Asset ordering and bounding.
//!
//! # Algorithm
//!
//! 1. **Classify** the listing into images and videos; in depth mode images
//!    are excluded (their parallax renders are sequenced instead).
//! 2. **Sort** case-insensitively by file name. This is the only sequencing
//!    mechanism, so ties fall back to the raw name to stay deterministic.
//! 3. **Truncate** to `floor(time_limit / slide) - 3` entries. Truncated
//!    assets are reported for eviction; the caller deletes them.
//! 4. **Append** the outro and emit segments.

use std::path::{Path, PathBuf};

use serde::Serialize;
use slidecut_common::{PipelineConfig, SlidecutError, SlidecutResult};
use slidecut_project_model::{Asset, AssetKind, Segment, Timeline};

pub use slidecut_common::config::{media_limit, RESERVED_SLOTS};

/// Result of ordering and truncating a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    /// Sequenced media in order, with their kinds.
    pub kept: Vec<(PathBuf, AssetKind)>,
    /// Media cut by the limit. These must be deleted from storage.
    pub evicted: Vec<PathBuf>,
    /// Images skipped in depth mode. Left untouched.
    pub excluded: Vec<PathBuf>,
}

impl Selection {
    /// Kept videos, whose native durations must be probed.
    pub fn videos(&self) -> impl Iterator<Item = &Path> {
        self.kept
            .iter()
            .filter(|(_, kind)| *kind == AssetKind::Video)
            .map(|(path, _)| path.as_path())
    }
}

/// Orders and bounds a group's assets.
pub struct AssetTimeline<'a> {
    config: &'a PipelineConfig,
}

impl<'a> AssetTimeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn limit(&self) -> usize {
        self.config.media_limit()
    }

    /// Classify, sort, and truncate a directory listing.
    pub fn select(&self, listing: &[PathBuf]) -> Selection {
        let mut selection = Selection::default();
        let mut media: Vec<(PathBuf, AssetKind)> = Vec::new();

        for path in listing {
            match AssetKind::classify(path) {
                Some(AssetKind::Image) if self.config.depth_mode => {
                    selection.excluded.push(path.clone());
                }
                Some(kind) => media.push((path.clone(), kind)),
                None => {}
            }
        }

        media.sort_by(|(a, _), (b, _)| {
            let a = sort_key(a);
            let b = sort_key(b);
            a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(&b))
        });

        let limit = self.limit();
        if media.len() > limit {
            selection.evicted = media.split_off(limit).into_iter().map(|(p, _)| p).collect();
            tracing::debug!(
                limit,
                evicted = selection.evicted.len(),
                "Truncated asset list to time limit"
            );
        }
        selection.kept = media;
        selection
    }

    /// Emit the timeline from the kept assets and the outro.
    ///
    /// `kept` must be in selection order with video durations filled in.
    pub fn build(&self, kept: Vec<Asset>, outro: Asset) -> SlidecutResult<Timeline> {
        if outro.kind != AssetKind::Outro {
            return Err(SlidecutError::config(format!(
                "{} is not an outro asset",
                outro.path.display()
            )));
        }

        let slide = self.config.slide_secs;
        let mut segments = Vec::with_capacity(kept.len() + 1);

        for (index, asset) in kept.into_iter().chain(std::iter::once(outro)).enumerate() {
            let nominal_secs = match asset.kind {
                AssetKind::Image => slide,
                AssetKind::Video | AssetKind::Outro => asset.native_duration_secs.ok_or_else(|| {
                    SlidecutError::probe(&asset.path, "native duration was not probed")
                })?,
            };
            segments.push(Segment {
                asset,
                index,
                nominal_secs,
            });
        }

        Timeline::new(segments, slide, self.config.fps)
    }
}

fn sort_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
