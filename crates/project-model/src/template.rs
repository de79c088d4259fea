//! Fixed-name template assets resolved per group.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slidecut_common::{Orientation, SlidecutError, SlidecutResult};

pub const MUSIC_FILE: &str = "soundtrack.mp3";
pub const TRANSITION_BED_FILE: &str = "transition_long.mp3";
pub const NARRATION_FILE: &str = "voiceover.mp3";
pub const NARRATION_END_FILE: &str = "voiceover_end.mp3";

/// Paths of every template asset one group render may touch.
///
/// Resolution only builds paths; existence is checked with [`require`]
/// right before the stage that needs the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSet {
    pub music: PathBuf,
    pub transition_bed: PathBuf,
    /// Main narration, owned by the group.
    pub narration: PathBuf,
    pub narration_end: PathBuf,
    pub outro: PathBuf,
    /// Branded chroma-keyed overlay clip.
    pub overlay: PathBuf,
}

impl TemplateSet {
    pub fn resolve(template_dir: &Path, group_dir: &Path, orientation: Orientation) -> Self {
        let (outro, overlay) = match orientation {
            Orientation::Vertical => ("outro_vertical.mp4", "name_subscribe_like.mp4"),
            Orientation::Horizontal => (
                "outro_horizontal.mp4",
                "name_subscribe_like_horizontal.mp4",
            ),
        };

        Self {
            music: template_dir.join(MUSIC_FILE),
            transition_bed: template_dir.join(TRANSITION_BED_FILE),
            narration: group_dir.join(NARRATION_FILE),
            narration_end: template_dir.join(NARRATION_END_FILE),
            outro: template_dir.join(outro),
            overlay: template_dir.join(overlay),
        }
    }

    /// Every audio asset the alignment pipeline reads.
    pub fn audio_assets(&self) -> [&Path; 4] {
        [
            &self.music,
            &self.transition_bed,
            &self.narration,
            &self.narration_end,
        ]
    }
}

/// Fail with `MissingAsset` unless `path` is an existing file.
pub fn require(path: &Path) -> SlidecutResult<&Path> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(SlidecutError::missing_asset(path))
    }
}
