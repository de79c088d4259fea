//! In-memory media engine for unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use slidecut_common::{SlidecutError, SlidecutResult};

use crate::engine::{CancelToken, EngineRequest, MediaEngine};

/// Records every request, writes a placeholder output, and answers probes
/// from a table. A request's `expected_secs` becomes its output's duration,
/// shifted by the configured drift for that stage.
#[derive(Default)]
pub struct FakeEngine {
    requests: Mutex<Vec<EngineRequest>>,
    durations: Mutex<HashMap<PathBuf, f64>>,
    fail_stage: Option<String>,
    drift: HashMap<String, f64>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(stage: &str) -> Self {
        Self {
            fail_stage: Some(stage.to_string()),
            ..Self::default()
        }
    }

    /// Outputs of `stage` come out `secs` longer than requested.
    pub fn with_drift(mut self, stage: &str, secs: f64) -> Self {
        self.drift.insert(stage.to_string(), secs);
        self
    }

    pub fn set_duration(&self, path: impl Into<PathBuf>, secs: f64) {
        self.durations.lock().unwrap().insert(path.into(), secs);
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.stage).collect()
    }

    pub fn request(&self, stage: &str) -> Option<EngineRequest> {
        self.requests().into_iter().find(|r| r.stage == stage)
    }
}

#[async_trait::async_trait]
impl MediaEngine for FakeEngine {
    async fn run(&self, request: &EngineRequest, cancel: &CancelToken) -> SlidecutResult<()> {
        if cancel.is_cancelled() {
            return Err(SlidecutError::Cancelled {
                stage: request.stage.clone(),
            });
        }
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_stage.as_deref() == Some(request.stage.as_str()) {
            return Err(SlidecutError::engine(&request.stage, Some(1), "boom"));
        }
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&request.output, b"fake")?;
        if let Some(secs) = request.expected_secs {
            let drift = self.drift.get(&request.stage).copied().unwrap_or_default();
            self.set_duration(&request.output, secs + drift);
        }
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> SlidecutResult<f64> {
        self.durations
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| SlidecutError::probe(path, "no duration recorded"))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Fresh directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "slidecut-{name}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
