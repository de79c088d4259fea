//! Application and pipeline configuration.
//!
//! The pipeline configuration is built once (config file defaults plus
//! command-line overrides), validated once, and then handed to every
//! component by shared reference. Nothing mutates it after validation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SlidecutError, SlidecutResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Rendering pipeline settings.
    pub pipeline: PipelineConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Output orientation; selects the canvas size and orientation-specific templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

impl Orientation {
    /// Canvas size for this orientation.
    pub fn canvas(self) -> Canvas {
        match self {
            Orientation::Vertical => Canvas {
                width: 1080,
                height: 1920,
            },
            Orientation::Horizontal => Canvas {
                width: 1920,
                height: 1080,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
        }
    }
}

impl FromStr for Orientation {
    type Err = SlidecutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(Orientation::Vertical),
            "horizontal" => Ok(Orientation::Horizontal),
            other => Err(SlidecutError::config(format!(
                "Unknown orientation '{other}'. Use: vertical, horizontal"
            ))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// The single immutable configuration object for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nominal on-screen time per slide (seconds).
    pub slide_secs: f64,

    /// Upper bound for the whole clip (seconds).
    pub time_limit_secs: f64,

    /// Output frame rate.
    pub fps: u32,

    /// Canvas orientation.
    pub orientation: Orientation,

    /// When set, images are rendered by the parallax collaborator and only
    /// videos are sequenced.
    pub depth_mode: bool,

    /// Directory holding the fixed-name template assets.
    pub template_dir: PathBuf,

    /// Directory searched for font files.
    pub fonts_dir: PathBuf,

    /// Silence prepended to the main narration (seconds).
    pub narration_lead_in_secs: f64,

    /// Per-invocation timeout for the external media engine (seconds).
    pub engine_timeout_secs: u64,

    pub title: TitleConfig,
    pub watermark: WatermarkConfig,
    pub overlay: OverlayConfig,
    pub subtitles: SubtitleConfig,
    pub encoding: EncodingConfig,
    pub parallax: ParallaxConfig,
}

/// Title text drawn during the branded overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    /// Title text. A literal `\n` is expanded to a newline.
    pub text: String,
    pub font_file: String,
    pub font_size: u32,
    /// RGB hex (`FF00B4`) or `random`.
    pub font_color: String,
    /// Horizontal offset from the canvas center (pixels).
    pub x_offset: i32,
    /// Vertical offset from the canvas center (pixels).
    pub y_offset: i32,
    /// Delay after the overlay start before the title appears (seconds).
    pub appearance_delay_secs: f64,
    /// How long the title stays visible (seconds).
    pub visible_secs: f64,
}

/// Moving watermark drawn over interior crossfades.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub enabled: bool,
    /// Watermark text. A literal `\n` is expanded to a newline.
    pub text: String,
    pub font_file: String,
    pub font_size: u32,
    pub opacity: f64,
    pub motion: WatermarkMotion,
    /// Frames between position changes.
    pub interval_frames: u32,
}

/// How the watermark moves around the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkMotion {
    /// Jump to a random position every interval.
    #[default]
    Random,
    /// Walk the frame edges counter-clockwise.
    Ccw,
}

impl FromStr for WatermarkMotion {
    type Err = SlidecutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(WatermarkMotion::Random),
            "ccw" => Ok(WatermarkMotion::Ccw),
            other => Err(SlidecutError::config(format!(
                "Unknown watermark motion '{other}'. Use: random, ccw"
            ))),
        }
    }
}

/// Branded chroma-keyed overlay clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Key color as RGB hex.
    pub chroma_color: String,
    pub similarity: f64,
    pub blend: f64,
    /// When the overlay clip starts (seconds).
    pub start_delay_secs: f64,
}

/// Subtitle burn-in styling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub enabled: bool,
    /// Font file name (looked up in the fonts directory) or family name.
    pub font: String,
    pub font_size: u32,
    /// RGB hex colors.
    pub primary_color: String,
    pub outline_color: String,
    pub shadow_color: String,
    pub outline_width: f64,
    pub shadow_enabled: bool,
    pub shadow_opacity: f64,
    /// ASS numpad alignment (2 = bottom center).
    pub alignment: u8,
    /// Subtitle file path relative to the group directory.
    pub file_name: String,
}

/// Codec settings for the encoded outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub video_codec: String,
    pub preset: String,
    pub crf: u32,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

/// External parallax renderer used in depth mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallaxConfig {
    /// Maximum concurrent parallax renders.
    pub workers: usize,
    /// Program to run.
    pub program: String,
    /// Arguments; `{input}` and `{output}` are substituted per image.
    pub args: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "slidecut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slide_secs: 5.0,
            time_limit_secs: 595.0,
            fps: 25,
            orientation: Orientation::Vertical,
            depth_mode: false,
            template_dir: PathBuf::from("TEMPLATE"),
            fonts_dir: PathBuf::from("fonts"),
            narration_lead_in_secs: 5.0,
            engine_timeout_secs: 1800,
            title: TitleConfig::default(),
            watermark: WatermarkConfig::default(),
            overlay: OverlayConfig::default(),
            subtitles: SubtitleConfig::default(),
            encoding: EncodingConfig::default(),
            parallax: ParallaxConfig::default(),
        }
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            text: "Model Name".to_string(),
            font_file: "Montserrat-SemiBold.otf".to_string(),
            font_size: 90,
            font_color: "random".to_string(),
            x_offset: 110,
            y_offset: -35,
            appearance_delay_secs: 1.0,
            visible_secs: 5.0,
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            text: "Today is a\\n Plus Day".to_string(),
            font_file: "Nexa Bold.otf".to_string(),
            font_size: 40,
            opacity: 0.7,
            motion: WatermarkMotion::Random,
            interval_frames: 50,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            chroma_color: "65db41".to_string(),
            similarity: 0.18,
            blend: 0.0,
            start_delay_secs: 21.0,
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            font: "Arial".to_string(),
            font_size: 24,
            primary_color: "FFFFFF".to_string(),
            outline_color: "000000".to_string(),
            shadow_color: "000000".to_string(),
            outline_width: 1.0,
            shadow_enabled: true,
            shadow_opacity: 0.5,
            alignment: 2,
            file_name: "subs/voiceover.srt".to_string(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 22,
            video_bitrate: "2000k".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            program: "depthflow".to_string(),
            args: vec![
                "input".to_string(),
                "-i".to_string(),
                "{input}".to_string(),
                "main".to_string(),
                "-o".to_string(),
                "{output}".to_string(),
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Slots held back from the time limit for the outro and transition overhead.
pub const RESERVED_SLOTS: usize = 3;

/// Number of media assets that fit in the time limit.
pub fn media_limit(time_limit_secs: f64, slide_secs: f64) -> usize {
    if slide_secs <= 0.0 || time_limit_secs <= 0.0 {
        return 0;
    }
    let slots = (time_limit_secs / slide_secs).floor() as usize;
    slots.saturating_sub(RESERVED_SLOTS)
}

impl PipelineConfig {
    /// Reject configurations that cannot produce a render.
    pub fn validate(&self) -> SlidecutResult<()> {
        if !(self.slide_secs > 0.0) {
            return Err(SlidecutError::config(format!(
                "Slide duration must be positive, got {}",
                self.slide_secs
            )));
        }
        if !(self.time_limit_secs > 0.0) {
            return Err(SlidecutError::config(format!(
                "Time limit must be positive, got {}",
                self.time_limit_secs
            )));
        }
        // A zero limit would evict, and delete, every asset of a group.
        if self.media_limit() == 0 {
            return Err(SlidecutError::config(format!(
                "Time limit {}s leaves no room for media at {}s per slide (need at least {}s)",
                self.time_limit_secs,
                self.slide_secs,
                (RESERVED_SLOTS + 1) as f64 * self.slide_secs
            )));
        }
        if self.fps == 0 {
            return Err(SlidecutError::config("Frame rate must be at least 1"));
        }
        if self.narration_lead_in_secs < 0.0 {
            return Err(SlidecutError::config(
                "Narration lead-in cannot be negative",
            ));
        }
        if self.engine_timeout_secs == 0 {
            return Err(SlidecutError::config("Engine timeout must be at least 1s"));
        }
        if self.watermark.enabled && self.watermark.interval_frames == 0 {
            return Err(SlidecutError::config(
                "Watermark interval must be at least one frame",
            ));
        }
        if self.parallax.workers == 0 {
            return Err(SlidecutError::config(
                "Parallax worker count must be at least 1",
            ));
        }

        parse_rgb_hex(&self.overlay.chroma_color)?;
        if !self.title.font_color.eq_ignore_ascii_case("random") {
            parse_rgb_hex(&self.title.font_color)?;
        }
        for color in [
            &self.subtitles.primary_color,
            &self.subtitles.outline_color,
            &self.subtitles.shadow_color,
        ] {
            parse_rgb_hex(color)?;
        }

        Ok(())
    }

    /// Media assets that fit in the time limit at the configured slide length.
    pub fn media_limit(&self) -> usize {
        media_limit(self.time_limit_secs, self.slide_secs)
    }

    /// Canvas size for the configured orientation.
    pub fn canvas(&self) -> Canvas {
        self.orientation.canvas()
    }

    /// Title text with literal `\n` sequences expanded.
    pub fn title_text(&self) -> String {
        expand_newlines(&self.title.text)
    }

    /// Watermark text with literal `\n` sequences expanded.
    pub fn watermark_text(&self) -> String {
        expand_newlines(&self.watermark.text)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&config_path, json)?;
        Ok(config_path)
    }
}

/// Expand literal `\n` escape sequences into real newlines.
pub fn expand_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Parse a 6-digit RGB hex color (with or without a leading `#`).
pub fn parse_rgb_hex(color: &str) -> SlidecutResult<[u8; 3]> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SlidecutError::config(format!(
            "Invalid RGB hex color '{color}'"
        )));
    }

    let mut rgb = [0u8; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| SlidecutError::config(format!("Invalid RGB hex color '{color}': {e}")))?;
    }
    Ok(rgb)
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("slidecut").join("config.json")
}
