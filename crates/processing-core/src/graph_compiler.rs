//! Filter-graph compilation.
//!
//! One effect node per segment, then one crossfade per adjacent pair:
//!
//! ```text
//! v0 ─┐
//!     ├─ xfade ─ f0 ─┐
//! v1 ─┘              ├─ xfade ─ x1 ─ drawtext ─ f1 ─┐
//! v2 ────────────────┘                              ├─ xfade ─ (sink)
//! v3 ───────────────────────────────────────────────┘
//! ```
//!
//! Boundary 0 carries no watermark and the last boundary is the unlabeled
//! sink, so the watermark only ever sits on interior boundaries.

use slidecut_common::{
    choose, PipelineConfig, RandomSource, SlidecutError, SlidecutResult, WatermarkMotion,
};
use slidecut_project_model::{
    AssetKind, FilterGraph, FilterOp, Pad, TextOverlay, TextPlacement, Timeline, TransitionKind,
};

/// Fixed crossfade overlap.
pub const CROSSFADE_SECS: f64 = 0.5;

/// Per-frame zoom increment of the Ken-Burns effect.
pub const KEN_BURNS_ZOOM_STEP: f64 = 0.001;

/// Margin kept by the edge-walking watermark.
pub const WATERMARK_EDGE_MARGIN: u32 = 15;

/// Offset of boundary `i`: `(i + 1) * slide - crossfade`.
pub fn crossfade_offset(boundary: usize, slide_secs: f64) -> f64 {
    (boundary as f64 + 1.0) * slide_secs - CROSSFADE_SECS
}

/// Builds the visual graph for a timeline.
pub struct FilterGraphCompiler<'a> {
    config: &'a PipelineConfig,
}

impl<'a> FilterGraphCompiler<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Compile the timeline. Draws exactly one transition per boundary
    /// from `random`, in boundary order.
    pub fn compile(
        &self,
        timeline: &Timeline,
        random: &mut dyn RandomSource,
    ) -> SlidecutResult<FilterGraph> {
        let segments = timeline.segments();
        let count = segments.len();
        if count == 0 {
            return Err(SlidecutError::config("Cannot compile an empty timeline"));
        }

        let mut graph = FilterGraph::new();

        for segment in segments {
            let output = (count > 1).then(|| effect_label(segment.index));
            graph.push(
                self.effect_op(segment.asset.kind, timeline),
                vec![Pad::Input(segment.index)],
                output,
            );
        }

        let boundaries = count - 1;
        let mut current = effect_label(0);

        for i in 0..boundaries {
            let transition = choose(random, &TransitionKind::PALETTE)
                .copied()
                .unwrap_or(TransitionKind::HBlur);
            let crossfade = FilterOp::Crossfade {
                transition,
                duration_secs: CROSSFADE_SECS,
                offset_secs: crossfade_offset(i, timeline.slide_secs()),
            };
            let inputs = vec![Pad::Label(current.clone()), Pad::Label(effect_label(i + 1))];
            let is_last = i + 1 == boundaries;

            if is_last {
                graph.push(crossfade, inputs, None);
            } else if i > 0 && self.config.watermark.enabled {
                let faded = format!("x{i}");
                graph.push(crossfade, inputs, Some(faded.clone()));
                current = format!("f{i}");
                graph.push(
                    FilterOp::DrawText(self.watermark()),
                    vec![Pad::Label(faded)],
                    Some(current.clone()),
                );
            } else {
                current = format!("f{i}");
                graph.push(crossfade, inputs, Some(current.clone()));
            }
        }

        tracing::debug!(
            segments = count,
            nodes = graph.len(),
            "Compiled filter graph"
        );
        Ok(graph)
    }

    fn effect_op(&self, kind: AssetKind, timeline: &Timeline) -> FilterOp {
        let fps = timeline.fps();
        let canvas = self.config.canvas();
        match kind {
            AssetKind::Image => FilterOp::KenBurns {
                zoom_step: KEN_BURNS_ZOOM_STEP,
                frames: (fps as f64 * timeline.slide_secs()).round() as u32,
                canvas,
                fps,
            },
            AssetKind::Video => FilterOp::Normalize {
                fps,
                scale: Some(canvas),
            },
            AssetKind::Outro => FilterOp::Normalize { fps, scale: None },
        }
    }

    fn watermark(&self) -> TextOverlay {
        let wm = &self.config.watermark;
        let placement = match wm.motion {
            WatermarkMotion::Random => TextPlacement::Jitter {
                interval_frames: wm.interval_frames,
            },
            WatermarkMotion::Ccw => TextPlacement::EdgeWalk {
                interval_frames: wm.interval_frames,
                margin: WATERMARK_EDGE_MARGIN,
            },
        };
        TextOverlay {
            text: self.config.watermark_text(),
            font_file: self.config.fonts_dir.join(&wm.font_file),
            font_size: wm.font_size,
            color: "white".to_string(),
            opacity: wm.opacity,
            placement,
            enable: None,
            shadow: false,
        }
    }
}

fn effect_label(index: usize) -> String {
    format!("v{index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecut_common::ScriptedRandom;
    use slidecut_project_model::{Asset, Segment};

    fn timeline(images: usize) -> Timeline {
        let mut segments: Vec<Segment> = (0..images)
            .map(|i| Segment {
                asset: Asset::image(format!("{i:02}.jpg")),
                index: i,
                nominal_secs: 5.0,
            })
            .collect();
        segments.push(Segment {
            asset: Asset::outro("outro.mp4", 14.0),
            index: images,
            nominal_secs: 14.0,
        });
        Timeline::new(segments, 5.0, 25).unwrap()
    }

    #[test]
    fn test_single_segment_is_sink() {
        let config = PipelineConfig::default();
        let mut random = ScriptedRandom::zeros();
        let graph = FilterGraphCompiler::new(&config)
            .compile(&timeline(0), &mut random)
            .unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.crossfades().count(), 0);
        assert!(graph.sink().is_some());
        assert_eq!(random.draws(), 0);
        graph.validate().unwrap();
    }

    #[test]
    fn test_images_get_slow_ken_burns_zoom() {
        let config = PipelineConfig::default();
        let graph = FilterGraphCompiler::new(&config)
            .compile(&timeline(2), &mut ScriptedRandom::zeros())
            .unwrap();

        let first = graph.effect_nodes().next().map(|n| &n.op);
        assert_eq!(
            first,
            Some(&FilterOp::KenBurns {
                zoom_step: 0.001,
                frames: 125,
                canvas: config.canvas(),
                fps: 25,
            })
        );
    }

    #[test]
    fn test_two_segments_no_watermark() {
        let config = PipelineConfig::default();
        let mut random = ScriptedRandom::zeros();
        let graph = FilterGraphCompiler::new(&config)
            .compile(&timeline(1), &mut random)
            .unwrap();

        assert_eq!(graph.crossfades().count(), 1);
        assert_eq!(graph.text_nodes().count(), 0);
        assert_eq!(graph.crossfade_offsets(), vec![4.5]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_watermark_on_interior_boundaries_only() {
        let config = PipelineConfig::default();
        let mut random = ScriptedRandom::zeros();
        let graph = FilterGraphCompiler::new(&config)
            .compile(&timeline(4), &mut random)
            .unwrap();

        // Boundaries 1 and 2 are interior.
        assert_eq!(graph.text_nodes().count(), 2);
        let labels: Vec<Option<&str>> = graph
            .crossfades()
            .map(|n| n.output.as_deref())
            .collect();
        assert_eq!(labels, [Some("f0"), Some("x1"), Some("x2"), None]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_watermark_disabled() {
        let mut config = PipelineConfig::default();
        config.watermark.enabled = false;
        let mut random = ScriptedRandom::zeros();
        let graph = FilterGraphCompiler::new(&config)
            .compile(&timeline(4), &mut random)
            .unwrap();

        assert_eq!(graph.text_nodes().count(), 0);
        graph.validate().unwrap();
    }

    #[test]
    fn test_transitions_follow_draws() {
        let config = PipelineConfig::default();
        let mut random = ScriptedRandom::new(vec![5, 0, 3]);
        let graph = FilterGraphCompiler::new(&config)
            .compile(&timeline(3), &mut random)
            .unwrap();

        assert_eq!(
            graph.transitions(),
            [
                TransitionKind::DiagBl,
                TransitionKind::HBlur,
                TransitionKind::CircleOpen
            ]
        );
        assert_eq!(random.draws(), 3);
    }

    #[test]
    fn test_effect_ops_by_kind() {
        let config = PipelineConfig::default();
        let segments = vec![
            Segment {
                asset: Asset::video("clip.mp4", 8.0),
                index: 0,
                nominal_secs: 8.0,
            },
            Segment {
                asset: Asset::outro("outro.mp4", 14.0),
                index: 1,
                nominal_secs: 14.0,
            },
        ];
        let timeline = Timeline::new(segments, 5.0, 25).unwrap();
        let graph = FilterGraphCompiler::new(&config)
            .compile(&timeline, &mut ScriptedRandom::zeros())
            .unwrap();

        let ops: Vec<&FilterOp> = graph.effect_nodes().map(|n| &n.op).collect();
        assert_eq!(
            ops[0],
            &FilterOp::Normalize {
                fps: 25,
                scale: Some(config.canvas())
            }
        );
        assert_eq!(ops[1], &FilterOp::Normalize { fps: 25, scale: None });
    }

    #[test]
    fn test_ccw_watermark_placement() {
        let mut config = PipelineConfig::default();
        config.watermark.motion = WatermarkMotion::Ccw;
        let graph = FilterGraphCompiler::new(&config)
            .compile(&timeline(3), &mut ScriptedRandom::zeros())
            .unwrap();

        let placements: Vec<&TextPlacement> = graph
            .text_nodes()
            .filter_map(|n| match &n.op {
                FilterOp::DrawText(text) => Some(&text.placement),
                _ => None,
            })
            .collect();
        assert_eq!(
            placements,
            [&TextPlacement::EdgeWalk {
                interval_frames: 50,
                margin: 15
            }]
        );
    }
}
