//! Depth/parallax pre-rendering of still images.
//!
//! Each image is turned into `<stem>_df.mp4` next to it by an external
//! program. [`ParallaxPool`] bounds how many run at once.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use slidecut_common::{ParallaxConfig, SlidecutError, SlidecutResult};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::engine::{path_arg, CancelToken};

const STAGE: &str = "parallax";

/// Output clip for `image`.
pub fn parallax_output(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    image.with_file_name(format!("{stem}_df.mp4"))
}

#[async_trait::async_trait]
pub trait ParallaxRenderer: Send + Sync {
    async fn render(&self, image: &Path, output: &Path, cancel: &CancelToken) -> SlidecutResult<()>;
}

/// Runs a configured program with `{input}` and `{output}` substituted.
pub struct CommandParallaxRenderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandParallaxRenderer {
    pub fn new(config: &ParallaxConfig, timeout: Duration) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout,
        }
    }

    pub fn command_args(&self, image: &Path, output: &Path) -> Vec<String> {
        let input = path_arg(image);
        let output = path_arg(output);
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

#[async_trait::async_trait]
impl ParallaxRenderer for CommandParallaxRenderer {
    async fn render(&self, image: &Path, output: &Path, cancel: &CancelToken) -> SlidecutResult<()> {
        let args = self.command_args(image, output);
        tracing::debug!(program = %self.program, args = ?args, "Running parallax renderer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SlidecutError::engine(STAGE, None, format!("Failed to start {}: {e}", self.program))
            })?;

        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                stderr.read_to_string(&mut text).await.ok();
            }
            text
        });

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(self.timeout) => None,
            _ = cancel.cancelled() => None,
        };

        let status = match status {
            Some(status) => status.map_err(|e| SlidecutError::engine(STAGE, None, e.to_string()))?,
            None => {
                child.kill().await.ok();
                if cancel.is_cancelled() {
                    return Err(SlidecutError::Cancelled {
                        stage: STAGE.to_string(),
                    });
                }
                return Err(SlidecutError::EngineTimeout {
                    stage: STAGE.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(SlidecutError::engine(STAGE, status.code(), stderr.trim()));
        }
        if !output.is_file() {
            return Err(SlidecutError::engine(
                STAGE,
                status.code(),
                format!("{} was not written", output.display()),
            ));
        }
        Ok(())
    }
}

/// Bounded pool of parallax renders.
pub struct ParallaxPool {
    renderer: Arc<dyn ParallaxRenderer>,
    permits: Arc<Semaphore>,
}

impl ParallaxPool {
    pub fn new(renderer: Arc<dyn ParallaxRenderer>, workers: usize) -> Self {
        Self {
            renderer,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Render every image that has no clip yet. Returns all clip paths in
    /// image order. After the first failure no new render starts, and
    /// renders still running are aborted when it is returned.
    pub async fn render_all(
        &self,
        images: &[PathBuf],
        cancel: &CancelToken,
    ) -> SlidecutResult<Vec<PathBuf>> {
        let mut tasks = JoinSet::new();
        let failed = Arc::new(AtomicBool::new(false));

        for image in images {
            let output = parallax_output(image);
            if output.is_file() {
                tracing::debug!(clip = %output.display(), "Parallax clip exists, skipping");
                continue;
            }
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| SlidecutError::Other(e.into()))?;
            if failed.load(Ordering::SeqCst) {
                break;
            }
            let renderer = Arc::clone(&self.renderer);
            let failed = Arc::clone(&failed);
            let cancel = cancel.clone();
            let image = image.clone();

            tasks.spawn(async move {
                let _permit = permit;
                tracing::info!(image = %image.display(), "Rendering parallax clip");
                let result = renderer.render(&image, &output, &cancel).await;
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| SlidecutError::Other(e.into()))??;
        }

        Ok(images.iter().map(|image| parallax_output(image)).collect())
    }
}
