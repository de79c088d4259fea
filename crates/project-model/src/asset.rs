//! Discovered media assets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extensions sequenced as still images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions sequenced as video clips (compared case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4"];

/// What an asset is, which decides its visual node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Video,
    /// The fixed template outro, always last and never rescaled.
    Outro,
}

impl AssetKind {
    /// Classify a path by extension. Returns `None` for files that are
    /// neither sequenced nor evicted.
    pub fn classify(path: &Path) -> Option<AssetKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Video)
        } else {
            None
        }
    }
}

/// A visual asset. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub path: PathBuf,
    pub kind: AssetKind,
    /// Probed duration; present for videos and the outro.
    pub native_duration_secs: Option<f64>,
}

impl Asset {
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Image,
            native_duration_secs: None,
        }
    }

    pub fn video(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Video,
            native_duration_secs: Some(duration_secs),
        }
    }

    pub fn outro(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Outro,
            native_duration_secs: Some(duration_secs),
        }
    }

    /// File name used for ordering. Empty when the path has none.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}
