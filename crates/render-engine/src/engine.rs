//! External media engine boundary.
//!
//! Every encode, filter, and probe is delegated to an external engine
//! (ffmpeg/ffprobe in production). Each invocation carries a timeout and a
//! cancel token; on either, the child process is killed and a distinct
//! error kind is returned.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use slidecut_common::{SlidecutError, SlidecutResult};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::watch;

/// One engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    /// Stage identifier used in logs and errors.
    pub stage: String,
    /// Arguments between the common prefix and the output path.
    pub args: Vec<String>,
    pub output: PathBuf,
    /// Expected output length, used for progress reporting.
    pub expected_secs: Option<f64>,
}

impl EngineRequest {
    pub fn new(stage: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            stage: stage.into(),
            args: Vec::new(),
            output: output.into(),
            expected_secs: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").arg(path_arg(path))
    }

    pub fn expect_secs(mut self, secs: f64) -> Self {
        self.expected_secs = Some(secs);
        self
    }

    /// Position of `flag` in the argument list.
    pub fn find(&self, flag: &str) -> Option<usize> {
        self.args.iter().position(|a| a == flag)
    }

    /// Value following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.find(flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }
}

pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Cooperative cancellation shared by every invocation of a run.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender is held by every clone, so this only happens at teardown.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Abstract interface for the external media engine.
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync {
    /// Run one invocation to completion. Succeeds only if the engine exits
    /// cleanly and the output exists and is non-empty.
    async fn run(&self, request: &EngineRequest, cancel: &CancelToken) -> SlidecutResult<()>;

    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> SlidecutResult<f64>;

    /// Check if the engine binaries are available on the system.
    fn is_available(&self) -> bool;

    /// Engine name.
    fn name(&self) -> &str;
}

/// Stage reported for ffprobe failures that are not about the file itself.
pub const PROBE_STAGE: &str = "probe";

/// ffmpeg/ffprobe found on `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
}

impl FfmpegEngine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            timeout,
        }
    }

    pub fn with_binaries(
        ffmpeg: impl Into<String>,
        ffprobe: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    fn command_line(&self, request: &EngineRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-nostats",
            "-progress",
            "pipe:1",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.extend(request.args.iter().cloned());
        args.push(path_arg(&request.output));
        args
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

#[async_trait::async_trait]
impl MediaEngine for FfmpegEngine {
    async fn run(&self, request: &EngineRequest, cancel: &CancelToken) -> SlidecutResult<()> {
        let stage = request.stage.as_str();
        if cancel.is_cancelled() {
            return Err(SlidecutError::Cancelled {
                stage: stage.to_string(),
            });
        }

        let args = self.command_line(request);
        tracing::debug!(stage, args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SlidecutError::engine(stage, None, format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(stage, pid = child.id(), "ffmpeg process started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(err) = stderr.read_to_string(&mut output).await {
                    output.push_str(&format!("<failed to read ffmpeg stderr: {err}>"));
                }
            }
            output
        });

        let outcome = tokio::select! {
            status = wait_with_progress(&mut child, stdout, stage, request.expected_secs) => {
                Outcome::Exited(status)
            }
            _ = tokio::time::sleep(self.timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::Exited(status) => status.map_err(|e| {
                SlidecutError::engine(stage, None, format!("Failed to wait on ffmpeg: {e}"))
            })?,
            Outcome::TimedOut => {
                child.kill().await.ok();
                tracing::warn!(stage, timeout_secs = self.timeout.as_secs(), "ffmpeg timed out");
                return Err(SlidecutError::EngineTimeout {
                    stage: stage.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            Outcome::Cancelled => {
                child.kill().await.ok();
                tracing::warn!(stage, "ffmpeg cancelled");
                return Err(SlidecutError::Cancelled {
                    stage: stage.to_string(),
                });
            }
        };

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(SlidecutError::engine(
                stage,
                status.code(),
                stderr_output.trim(),
            ));
        }

        ensure_output(stage, &request.output).await
    }

    async fn probe_duration(&self, path: &Path) -> SlidecutResult<f64> {
        if !path.exists() {
            return Err(SlidecutError::missing_asset(path));
        }

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| SlidecutError::EngineTimeout {
                stage: PROBE_STAGE.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| SlidecutError::probe(path, format!("Failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(SlidecutError::probe(
                path,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_probe_duration(&output.stdout).map_err(|msg| SlidecutError::probe(path, msg))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg) && command_exists(&self.ffprobe)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

async fn wait_with_progress(
    child: &mut Child,
    stdout: Option<ChildStdout>,
    stage: &str,
    expected_secs: Option<f64>,
) -> std::io::Result<ExitStatus> {
    if let Some(stdout) = stdout {
        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        let mut last_report = Instant::now();

        while let Some(line) = lines.next_line().await? {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key == "progress" && (state.complete || last_report.elapsed().as_secs() >= 10) {
                last_report = Instant::now();
                tracing::info!(
                    stage,
                    out_time_secs = state.out_time_secs,
                    percent = state.percent(expected_secs),
                    "ffmpeg progress"
                );
            }
        }
    }
    child.wait().await
}

async fn ensure_output(stage: &str, output: &Path) -> SlidecutResult<()> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(SlidecutError::engine(
            stage,
            Some(0),
            format!("{} is missing or empty", output.display()),
        )),
    }
}

/// Parse `ffprobe -of json` output with a `format.duration` entry.
pub fn parse_probe_duration(stdout: &[u8]) -> Result<f64, String> {
    let json: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| format!("invalid ffprobe output: {e}"))?;
    let raw = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .ok_or_else(|| "ffprobe reported no duration".to_string())?;

    let secs = match raw {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|e| format!("unparseable duration '{s}': {e}"))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("unparseable duration {n}"))?,
        other => return Err(format!("unexpected duration value {other}")),
    };

    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("non-positive duration {secs}"));
    }
    Ok(secs)
}

pub fn command_exists(binary: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn percent(&self, expected_secs: Option<f64>) -> f64 {
        if self.complete {
            return 100.0;
        }
        match expected_secs {
            Some(total) if total > 0.0 => (self.out_time_secs / total * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = EngineRequest::new("slideshow", "out.mp4")
            .input(Path::new("a.jpg"))
            .args(["-r", "25"])
            .expect_secs(33.5);
        assert_eq!(request.args, ["-i", "a.jpg", "-r", "25"]);
        assert_eq!(request.value_of("-r"), Some("25"));
        assert_eq!(request.value_of("-map"), None);
        assert_eq!(request.expected_secs, Some(33.5));
    }

    #[test]
    fn test_command_line_appends_output() {
        let engine = FfmpegEngine::new(Duration::from_secs(5));
        let args = engine.command_line(&EngineRequest::new("probe", "x.mp4").arg("-an"));
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.windows(2).any(|w| w == ["-progress", "pipe:1"]));
        assert_eq!(args[args.len() - 2..], ["-an", "x.mp4"]);
    }

    #[test]
    fn test_parse_probe_duration() {
        let out = br#"{"format": {"duration": "33.500000"}}"#;
        assert!((parse_probe_duration(out).unwrap() - 33.5).abs() < 1e-9);
        assert!(parse_probe_duration(br#"{"format": {}}"#).is_err());
        assert!(parse_probe_duration(br#"{"format": {"duration": "N/A"}}"#).is_err());
        assert!(parse_probe_duration(b"not json").is_err());
    }

    #[test]
    fn test_progress_state() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "16750000");
        assert!((state.percent(Some(33.5)) - 50.0).abs() < 1e-9);
        state.update("progress", "end");
        assert_eq!(state.percent(Some(33.5)), 100.0);
    }

    #[tokio::test]
    async fn test_cancel_token_resolves() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancel should wake waiters")
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let engine = FfmpegEngine::with_binaries("definitely-not-ffmpeg", "nope", Duration::from_secs(1));
        let token = CancelToken::new();
        token.cancel();
        let result = engine
            .run(&EngineRequest::new("slideshow", "/tmp/never.mp4"), &token)
            .await;
        assert!(matches!(result, Err(SlidecutError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_error() {
        let engine = FfmpegEngine::with_binaries(
            "definitely-not-ffmpeg-binary",
            "nope",
            Duration::from_secs(1),
        );
        let result = engine
            .run(&EngineRequest::new("slideshow", "/tmp/never.mp4"), &CancelToken::new())
            .await;
        assert!(matches!(
            result,
            Err(SlidecutError::ExternalEngine { status: None, .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hanging_ffprobe_is_engine_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = crate::testing::temp_dir("probe-timeout");
        let ffprobe = dir.join("ffprobe");
        std::fs::write(&ffprobe, "#!/bin/sh\nsleep 10\n").unwrap();
        std::fs::set_permissions(&ffprobe, std::fs::Permissions::from_mode(0o755)).unwrap();
        let clip = dir.join("clip.mp4");
        std::fs::write(&clip, b"clip").unwrap();

        let engine = FfmpegEngine::with_binaries(
            "ffmpeg",
            ffprobe.to_string_lossy(),
            Duration::from_millis(200),
        );
        match engine.probe_duration(&clip).await {
            Err(SlidecutError::EngineTimeout { stage, .. }) => assert_eq!(stage, PROBE_STAGE),
            other => panic!("expected engine timeout, got {other:?}"),
        }
    }
}
