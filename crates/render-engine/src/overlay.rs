//! Second pass: branded overlay clip, title text and optional subtitles.

use std::path::{Path, PathBuf};

use slidecut_common::{
    choose, parse_rgb_hex, PipelineConfig, RandomSource, SlidecutResult, SubtitleConfig,
};
use slidecut_project_model::{TextOverlay, TextPlacement};

use crate::assemble::video_encoding;
use crate::engine::EngineRequest;
use crate::filtergraph::{drawtext, format_secs};

/// Title colors used when the configured color is `random`.
pub const TITLE_COLORS: [&str; 3] = ["FF00B4", "ff6600", "0b4178"];

pub const TITLE_OPACITY: f64 = 0.8;
pub const OVERLAY_AUDIO_GAIN: f64 = 0.5;

/// Subtitle track to burn in, with its resolved font family.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleBurn {
    pub file: PathBuf,
    pub fonts_dir: PathBuf,
    pub font_name: String,
}

pub struct OverlayCompositor<'a> {
    config: &'a PipelineConfig,
}

impl<'a> OverlayCompositor<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Title color; `random` draws exactly once from [`TITLE_COLORS`].
    pub fn title_color(&self, random: &mut dyn RandomSource) -> String {
        let configured = &self.config.title.font_color;
        if configured.eq_ignore_ascii_case("random") {
            choose(random, &TITLE_COLORS)
                .copied()
                .unwrap_or(TITLE_COLORS[0])
                .to_string()
        } else {
            configured.trim_start_matches('#').to_string()
        }
    }

    /// `[delay + appear, delay + appear + visible]`.
    pub fn title_window(&self) -> (f64, f64) {
        let start = self.config.overlay.start_delay_secs + self.config.title.appearance_delay_secs;
        (start, start + self.config.title.visible_secs)
    }

    pub fn title(&self, color: String) -> TextOverlay {
        let title = &self.config.title;
        TextOverlay {
            text: self.config.title_text(),
            font_file: self.config.fonts_dir.join(&title.font_file),
            font_size: title.font_size,
            color,
            opacity: TITLE_OPACITY,
            placement: TextPlacement::CenterOffset {
                x_offset: title.x_offset,
                y_offset: title.y_offset,
            },
            enable: Some(self.title_window()),
            shadow: true,
        }
    }

    /// `-filter_complex` text of the overlay pass, producing `[vout]` and `[aout]`.
    pub fn filter(
        &self,
        overlay_secs: f64,
        title: &TextOverlay,
        subtitles: Option<&SubtitleBurn>,
    ) -> SlidecutResult<String> {
        let ov = &self.config.overlay;
        let delay = ov.start_delay_secs;
        let delay_ms = (delay * 1000.0).round() as u64;
        let key = parse_rgb_hex(&ov.chroma_color)?;

        let mut chains = vec![
            format!(
                "[1:a]adelay={delay_ms}|{delay_ms},volume={}[a_over]",
                format_secs(OVERLAY_AUDIO_GAIN)
            ),
            "[0:a]volume=1.0[a_base]".to_string(),
            "[a_base][a_over]amix=inputs=2:duration=first:normalize=0[aout]".to_string(),
            "[0:v]setpts=PTS-STARTPTS[base]".to_string(),
            format!(
                "[1:v]setpts=PTS-STARTPTS+{}/TB,chromakey=color=0x{:02x}{:02x}{:02x}:similarity={}:blend={}[keyed]",
                format_secs(delay),
                key[0],
                key[1],
                key[2],
                format_secs(ov.similarity),
                format_secs(ov.blend),
            ),
            format!(
                "[base][keyed]overlay=enable='between(t,{},{})'[layered]",
                format_secs(delay),
                format_secs(delay + overlay_secs)
            ),
        ];

        match subtitles {
            Some(burn) => {
                chains.push(format!("[layered]{}[titled]", drawtext(title)));
                chains.push(format!(
                    "[titled]subtitles='{}':fontsdir='{}':force_style='{}'[vout]",
                    filter_path(&burn.file),
                    filter_path(&burn.fonts_dir),
                    subtitle_style(&self.config.subtitles, &burn.font_name)?
                ));
            }
            None => chains.push(format!("[layered]{}[vout]", drawtext(title))),
        }

        Ok(chains.join(";"))
    }

    /// The engine request for the overlay pass.
    pub fn request(
        &self,
        input: &Path,
        overlay_clip: &Path,
        overlay_secs: f64,
        output: &Path,
        subtitles: Option<&SubtitleBurn>,
        random: &mut dyn RandomSource,
    ) -> SlidecutResult<EngineRequest> {
        let title = self.title(self.title_color(random));
        let encoding = &self.config.encoding;
        Ok(EngineRequest::new("overlay", output)
            .input(input)
            .input(overlay_clip)
            .arg("-filter_complex")
            .arg(self.filter(overlay_secs, &title, subtitles)?)
            .args(["-map", "[vout]", "-map", "[aout]"])
            .args(video_encoding(encoding))
            .args([
                "-c:a",
                encoding.audio_codec.as_str(),
                "-b:a",
                encoding.audio_bitrate.as_str(),
            ]))
    }
}

/// Reverse channel order of an RGB hex color: `FF00B4` -> `B400FF`.
pub fn rgb_to_bgr(color: &str) -> SlidecutResult<String> {
    let [r, g, b] = parse_rgb_hex(color)?;
    Ok(format!("{b:02X}{g:02X}{r:02X}"))
}

/// ASS `force_style` block for the subtitle filter.
pub fn subtitle_style(config: &SubtitleConfig, font_name: &str) -> SlidecutResult<String> {
    let mut parts = vec![
        format!("FontName={font_name}"),
        format!("FontSize={}", config.font_size),
        format!("PrimaryColour=&H00{}", rgb_to_bgr(&config.primary_color)?),
        format!("OutlineColour=&H00{}", rgb_to_bgr(&config.outline_color)?),
        format!("Outline={}", format_secs(config.outline_width)),
        format!("Alignment={}", config.alignment),
    ];
    if config.shadow_enabled {
        // ASS alpha is inverted: 00 is opaque.
        let alpha = ((1.0 - config.shadow_opacity.clamp(0.0, 1.0)) * 255.0) as u8;
        parts.push(format!(
            "BackColour=&H{alpha:02X}{}",
            rgb_to_bgr(&config.shadow_color)?
        ));
        parts.push("Shadow=1".to_string());
    } else {
        parts.push("Shadow=0".to_string());
    }
    Ok(parts.join(","))
}

fn filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\\\:")
        .replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecut_common::ScriptedRandom;

    #[test]
    fn test_rgb_to_bgr() {
        assert_eq!(rgb_to_bgr("FF00B4").unwrap(), "B400FF");
        assert_eq!(rgb_to_bgr("#123456").unwrap(), "563412");
        assert_eq!(rgb_to_bgr("ff6600").unwrap(), "0066FF");
        assert!(rgb_to_bgr("FF00B").is_err());
        assert!(rgb_to_bgr("GG0000").is_err());
    }

    #[test]
    fn test_random_title_color_draws_once() {
        let config = PipelineConfig::default();
        let mut random = ScriptedRandom::new(vec![2]);
        let color = OverlayCompositor::new(&config).title_color(&mut random);
        assert_eq!(color, "0b4178");
        assert_eq!(random.draws(), 1);
    }

    #[test]
    fn test_fixed_title_color_draws_nothing() {
        let mut config = PipelineConfig::default();
        config.title.font_color = "#00FF00".to_string();
        let mut random = ScriptedRandom::zeros();
        let color = OverlayCompositor::new(&config).title_color(&mut random);
        assert_eq!(color, "00FF00");
        assert_eq!(random.draws(), 0);
    }

    #[test]
    fn test_title_window() {
        let config = PipelineConfig::default();
        assert_eq!(OverlayCompositor::new(&config).title_window(), (22.0, 27.0));
    }

    #[test]
    fn test_filter_without_subtitles() {
        let config = PipelineConfig::default();
        let compositor = OverlayCompositor::new(&config);
        let title = compositor.title("FF00B4".to_string());
        let filter = compositor.filter(23.0, &title, None).unwrap();

        assert!(filter.starts_with("[1:a]adelay=21000|21000,volume=0.5[a_over];"));
        assert!(filter.contains(
            "[1:v]setpts=PTS-STARTPTS+21/TB,chromakey=color=0x65db41:similarity=0.18:blend=0[keyed]"
        ));
        assert!(filter.contains("overlay=enable='between(t,21,44)'"));
        assert!(filter.contains(":enable='between(t,22,27)'"));
        assert!(filter.ends_with("[vout]"));
        assert!(!filter.contains("subtitles="));
    }

    #[test]
    fn test_subtitle_style() {
        let config = SubtitleConfig {
            primary_color: "FF00B4".to_string(),
            ..SubtitleConfig::default()
        };
        let style = subtitle_style(&config, "Nexa Bold").unwrap();
        assert_eq!(
            style,
            "FontName=Nexa Bold,FontSize=24,PrimaryColour=&H00B400FF,OutlineColour=&H00000000,Outline=1,Alignment=2,BackColour=&H7F000000,Shadow=1"
        );

        let flat = SubtitleConfig {
            shadow_enabled: false,
            ..SubtitleConfig::default()
        };
        assert!(subtitle_style(&flat, "Arial").unwrap().ends_with("Shadow=0"));
    }

    #[test]
    fn test_request_with_subtitles() {
        let config = PipelineConfig::default();
        let burn = SubtitleBurn {
            file: "g/subs/voiceover.srt".into(),
            fonts_dir: "/abs/fonts".into(),
            font_name: "Arial".to_string(),
        };
        let request = OverlayCompositor::new(&config)
            .request(
                Path::new("g/slideshow_with_audio.mp4"),
                Path::new("T/name_subscribe_like.mp4"),
                23.0,
                Path::new("g/Model_Name.mp4"),
                Some(&burn),
                &mut ScriptedRandom::zeros(),
            )
            .unwrap();

        assert_eq!(request.stage, "overlay");
        let filter = request.value_of("-filter_complex").unwrap();
        assert!(filter.contains("[titled]subtitles='g/subs/voiceover.srt':fontsdir='/abs/fonts':force_style='FontName=Arial,"));
        assert!(filter.contains("fontcolor=0xFF00B4@0.8"));
        assert_eq!(request.value_of("-c:v"), Some("libx264"));
    }
}
