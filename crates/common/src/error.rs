//! Error types shared across Slidecut crates.

use std::path::PathBuf;

/// Top-level error type for Slidecut operations.
#[derive(Debug, thiserror::Error)]
pub enum SlidecutError {
    #[error("Missing asset: {path}")]
    MissingAsset { path: PathBuf },

    #[error("Could not determine duration of {path}: {message}")]
    DurationProbe { path: PathBuf, message: String },

    #[error("Media engine failed during {stage} (status {status:?}): {stderr}")]
    ExternalEngine {
        stage: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Media engine timed out during {stage} after {timeout_secs}s")]
    EngineTimeout { stage: String, timeout_secs: u64 },

    #[error("Media engine invocation cancelled during {stage}")]
    Cancelled { stage: String },

    #[error(
        "Duration mismatch for {track}: target {target_secs:.3}s, actual {actual_secs:.3}s"
    )]
    DurationReconciliation {
        track: String,
        target_secs: f64,
        actual_secs: f64,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SlidecutError.
pub type SlidecutResult<T> = Result<T, SlidecutError>;

impl SlidecutError {
    pub fn missing_asset(path: impl Into<PathBuf>) -> Self {
        Self::MissingAsset { path: path.into() }
    }

    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::DurationProbe {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn engine(stage: impl Into<String>, status: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ExternalEngine {
            stage: stage.into(),
            status,
            stderr: stderr.into(),
        }
    }

    pub fn reconciliation(track: impl Into<String>, target_secs: f64, actual_secs: f64) -> Self {
        Self::DurationReconciliation {
            track: track.into(),
            target_secs,
            actual_secs,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Short machine-friendly name of the error kind, used in batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingAsset { .. } => "missing_asset",
            Self::DurationProbe { .. } => "duration_probe",
            Self::ExternalEngine { .. } => "external_engine",
            Self::EngineTimeout { .. } => "engine_timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::DurationReconciliation { .. } => "duration_reconciliation",
            Self::Configuration { .. } => "configuration",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciliation_message_mentions_both_durations() {
        let err = SlidecutError::reconciliation("narration", 60.0, 70.0);
        let msg = err.to_string();
        assert!(msg.contains("60.000"));
        assert!(msg.contains("70.000"));
        assert_eq!(err.kind(), "duration_reconciliation");
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SlidecutError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
