//! Slidecut CLI: batch slideshow rendering.
//!
//! Usage:
//!   slidecut render <ROOT>    Render every group directory under ROOT
//!   slidecut plan <GROUP>     Show the timeline and filter graph of one group
//!   slidecut check            Check ffmpeg and template availability
//!   slidecut config           Print the effective configuration

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use slidecut_common::{AppConfig, Orientation, PipelineConfig, WatermarkMotion};

mod commands;

#[derive(Parser)]
#[command(
    name = "slidecut",
    about = "Turn folders of photos and clips into narrated slideshow videos",
    version,
    author
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every group directory under ROOT
    Render {
        /// Directory containing one subdirectory per group
        root: PathBuf,

        #[command(flatten)]
        options: PipelineOptions,

        /// Seed the random source for a reproducible render
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Dry run: print segments, evictions and the filter graph of one group
    Plan {
        /// Path to the group directory
        group: PathBuf,

        #[command(flatten)]
        options: PipelineOptions,

        /// Seed the random source
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check ffmpeg/ffprobe and template availability
    Check {
        #[command(flatten)]
        options: PipelineOptions,
    },

    /// Print the effective configuration
    Config {
        #[command(flatten)]
        options: PipelineOptions,

        /// Persist the effective configuration
        #[arg(long)]
        save: bool,
    },
}

/// Overrides for the configuration file.
#[derive(Args, Debug, Default)]
struct PipelineOptions {
    /// Seconds each image is shown
    #[arg(long)]
    slide_secs: Option<f64>,

    /// Total time limit in seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// vertical (1080x1920) or horizontal (1920x1080)
    #[arg(long)]
    orientation: Option<Orientation>,

    /// Depth/parallax mode (0 or 1)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    depth: Option<u8>,

    /// Concurrent parallax renders in depth mode
    #[arg(long)]
    parallax_workers: Option<usize>,

    /// Title text; a literal \n becomes a line break
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    title_font_size: Option<u32>,

    /// Title color as RGB hex, or "random"
    #[arg(long)]
    title_color: Option<String>,

    /// Seconds after the overlay starts before the title appears
    #[arg(long)]
    title_delay: Option<f64>,

    /// Seconds the title stays visible
    #[arg(long)]
    title_visible: Option<f64>,

    /// Watermark text; a literal \n becomes a line break
    #[arg(long)]
    watermark: Option<String>,

    #[arg(long)]
    no_watermark: bool,

    /// random or ccw
    #[arg(long)]
    watermark_motion: Option<WatermarkMotion>,

    /// Chroma-key color of the overlay clip (RGB hex)
    #[arg(long)]
    chroma_color: Option<String>,

    #[arg(long)]
    chroma_similarity: Option<f64>,

    #[arg(long)]
    chroma_blend: Option<f64>,

    /// Seconds into the video when the overlay clip starts
    #[arg(long)]
    overlay_delay: Option<f64>,

    /// Burn in <group>/subs/voiceover.srt when present
    #[arg(long)]
    subtitles: bool,

    #[arg(long)]
    subtitle_font: Option<String>,

    #[arg(long)]
    subtitle_font_size: Option<u32>,

    #[arg(long)]
    subtitle_color: Option<String>,

    #[arg(long)]
    subtitle_outline_color: Option<String>,

    #[arg(long)]
    subtitle_shadow_color: Option<String>,

    #[arg(long)]
    subtitle_outline: Option<f64>,

    #[arg(long)]
    no_subtitle_shadow: bool,

    /// ASS alignment (numpad layout, 2 = bottom center)
    #[arg(long)]
    subtitle_alignment: Option<u8>,

    /// Directory with the template assets
    #[arg(long)]
    template_dir: Option<PathBuf>,

    /// Directory with the font files
    #[arg(long)]
    fonts_dir: Option<PathBuf>,

    /// Timeout for each media engine call, in seconds
    #[arg(long)]
    engine_timeout: Option<u64>,
}

impl PipelineOptions {
    fn apply(self, config: &mut PipelineConfig) {
        macro_rules! set {
            ($opt:expr => $field:expr) => {
                if let Some(value) = $opt {
                    $field = value;
                }
            };
        }

        set!(self.slide_secs => config.slide_secs);
        set!(self.time_limit => config.time_limit_secs);
        set!(self.orientation => config.orientation);
        set!(self.depth.map(|d| d == 1) => config.depth_mode);
        set!(self.parallax_workers => config.parallax.workers);
        set!(self.title => config.title.text);
        set!(self.title_font_size => config.title.font_size);
        set!(self.title_color => config.title.font_color);
        set!(self.title_delay => config.title.appearance_delay_secs);
        set!(self.title_visible => config.title.visible_secs);
        set!(self.watermark => config.watermark.text);
        set!(self.watermark_motion => config.watermark.motion);
        set!(self.chroma_color => config.overlay.chroma_color);
        set!(self.chroma_similarity => config.overlay.similarity);
        set!(self.chroma_blend => config.overlay.blend);
        set!(self.overlay_delay => config.overlay.start_delay_secs);
        set!(self.subtitle_font => config.subtitles.font);
        set!(self.subtitle_font_size => config.subtitles.font_size);
        set!(self.subtitle_color => config.subtitles.primary_color);
        set!(self.subtitle_outline_color => config.subtitles.outline_color);
        set!(self.subtitle_shadow_color => config.subtitles.shadow_color);
        set!(self.subtitle_outline => config.subtitles.outline_width);
        set!(self.subtitle_alignment => config.subtitles.alignment);
        set!(self.template_dir => config.template_dir);
        set!(self.fonts_dir => config.fonts_dir);
        set!(self.engine_timeout => config.engine_timeout_secs);

        if self.no_watermark {
            config.watermark.enabled = false;
        }
        if self.subtitles {
            config.subtitles.enabled = true;
        }
        if self.no_subtitle_shadow {
            config.subtitles.shadow_enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut app = AppConfig::load();

    slidecut_common::logging::init_logging(&slidecut_common::logging::logging_for_verbosity(
        &app.logging,
        cli.verbose,
        cli.json,
    ));

    match cli.command {
        Commands::Render {
            root,
            options,
            seed,
        } => {
            options.apply(&mut app.pipeline);
            commands::render::run(root, app.pipeline, seed).await
        }
        Commands::Plan {
            group,
            options,
            seed,
        } => {
            options.apply(&mut app.pipeline);
            commands::plan::run(group, app.pipeline, seed).await
        }
        Commands::Check { options } => {
            options.apply(&mut app.pipeline);
            commands::check::run(&app.pipeline)
        }
        Commands::Config { options, save } => {
            options.apply(&mut app.pipeline);
            commands::config::run(&app, save)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::parse_from([
            "slidecut",
            "render",
            "INPUT",
            "--slide-secs",
            "4",
            "--orientation",
            "horizontal",
            "--depth",
            "1",
            "--no-watermark",
            "--title",
            "Hello\\nWorld",
        ]);
        let Commands::Render { options, .. } = cli.command else {
            panic!("expected render");
        };
        let mut config = PipelineConfig::default();
        options.apply(&mut config);

        assert_eq!(config.slide_secs, 4.0);
        assert_eq!(config.orientation, Orientation::Horizontal);
        assert!(config.depth_mode);
        assert!(!config.watermark.enabled);
        assert_eq!(config.title_text(), "Hello\nWorld");
        assert_eq!(config.time_limit_secs, 595.0);
    }

    #[test]
    fn test_depth_accepts_only_zero_or_one() {
        assert!(Cli::try_parse_from(["slidecut", "check", "--depth", "2"]).is_err());
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::parse_from(["slidecut", "-vv", "check"]);
        assert_eq!(cli.verbose, 2);
    }
}
