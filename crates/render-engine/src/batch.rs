//! Sequential batch over every group directory under a root.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slidecut_common::{PipelineConfig, RandomSource, SlidecutError, SlidecutResult};
use tracing::Instrument;

use crate::engine::{CancelToken, MediaEngine};
use crate::group::{GroupOutcome, GroupRunner};
use crate::parallax::ParallaxPool;

/// One failed group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupError {
    pub group: String,
    pub stage: String,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub rendered: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<GroupError>,
    /// Set when the batch stopped early on cancellation.
    pub cancelled: bool,
}

impl BatchReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            rendered: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
        }
    }
}

pub struct BatchDriver<'a> {
    config: &'a PipelineConfig,
    engine: &'a dyn MediaEngine,
    cancel: &'a CancelToken,
    parallax: Option<&'a ParallaxPool>,
}

impl<'a> BatchDriver<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        engine: &'a dyn MediaEngine,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            config,
            engine,
            cancel,
            parallax: None,
        }
    }

    pub fn with_parallax(mut self, pool: &'a ParallaxPool) -> Self {
        self.parallax = Some(pool);
        self
    }

    /// Group directories directly under `root`, sorted by name. The
    /// template and fonts directories are never groups.
    pub fn groups(&self, root: &Path) -> SlidecutResult<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(SlidecutError::config(format!(
                "Input root {} is not a directory",
                root.display()
            )));
        }
        let reserved = [
            std::fs::canonicalize(&self.config.template_dir).ok(),
            std::fs::canonicalize(&self.config.fonts_dir).ok(),
        ];

        let mut groups = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let canonical = std::fs::canonicalize(&path).ok();
            if canonical.is_some() && reserved.contains(&canonical) {
                continue;
            }
            groups.push(path);
        }
        groups.sort();
        Ok(groups)
    }

    /// Render every group. Only an unusable root is an error; group
    /// failures are recorded and the batch moves on.
    pub async fn run(
        &self,
        root: &Path,
        random: &mut dyn RandomSource,
    ) -> SlidecutResult<BatchReport> {
        self.config.validate()?;
        let groups = self.groups(root)?;
        tracing::info!(root = %root.display(), groups = groups.len(), "Starting batch");

        let mut runner = GroupRunner::new(self.config, self.engine, self.cancel);
        if let Some(pool) = self.parallax {
            runner = runner.with_parallax(pool);
        }

        let mut report = BatchReport::new();
        for group_dir in groups {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let group = group_name(&group_dir);
            let span = tracing::info_span!("group", name = %group);

            match runner.run(&group_dir, random).instrument(span).await {
                Ok(GroupOutcome::Rendered(_)) => report.rendered.push(group),
                Ok(GroupOutcome::Skipped(_)) => report.skipped.push(group),
                Err(failure) => {
                    tracing::error!(stage = %failure.stage, error = %failure.source, "Group failed");
                    if matches!(failure.source, SlidecutError::Cancelled { .. }) {
                        report.cancelled = true;
                    }
                    report.failed.push(GroupError {
                        group,
                        stage: failure.stage,
                        kind: failure.source.kind().to_string(),
                        error: failure.source.to_string(),
                    });
                    if report.cancelled {
                        break;
                    }
                }
            }
        }

        report.finished_at = Some(Utc::now());
        tracing::info!(
            rendered = report.rendered.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Batch finished"
        );
        Ok(report)
    }
}

fn group_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}
