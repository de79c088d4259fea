//! Render plan assembly: turns a compiled graph into engine requests.

use std::path::{Path, PathBuf};

use slidecut_common::{EncodingConfig, PipelineConfig, SlidecutError, SlidecutResult};
use slidecut_project_model::{
    AssetKind, FilterGraph, OutputParams, RenderPlan, Timeline, VisualInput,
};

use crate::engine::EngineRequest;
use crate::filtergraph::{self, format_secs};

/// Label given to the sink when it has to be mapped explicitly.
const VIDEO_OUT: &str = "vout";

pub struct RenderPlanAssembler<'a> {
    config: &'a PipelineConfig,
}

impl<'a> RenderPlanAssembler<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Pair each segment with its engine input and attach output parameters.
    pub fn plan(
        &self,
        timeline: &Timeline,
        graph: FilterGraph,
        audio: Option<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> RenderPlan {
        let inputs = timeline
            .segments()
            .iter()
            .map(|segment| match segment.asset.kind {
                AssetKind::Image => VisualInput::Still {
                    path: segment.asset.path.clone(),
                    duration_secs: timeline.slide_secs(),
                    fps: timeline.fps(),
                },
                AssetKind::Video | AssetKind::Outro => VisualInput::Clip {
                    path: segment.asset.path.clone(),
                },
            })
            .collect();

        RenderPlan {
            inputs,
            graph,
            audio,
            output: OutputParams {
                fps: timeline.fps(),
                canvas: self.config.canvas(),
                frame_cap: timeline.frame_budget(),
                encoding: self.config.encoding.clone(),
            },
            destination: destination.into(),
        }
    }

    /// The single invocation that renders `plan`.
    pub fn request(&self, plan: &RenderPlan, stage: &str) -> SlidecutResult<EngineRequest> {
        plan.graph.validate()?;
        if plan.inputs.is_empty() {
            return Err(SlidecutError::config("Render plan has no inputs"));
        }

        let mut request = EngineRequest::new(stage, &plan.destination);
        for input in &plan.inputs {
            request = match input {
                VisualInput::Still {
                    path,
                    duration_secs,
                    fps,
                } => request
                    .args(["-loop", "1", "-t"])
                    .arg(format_secs(*duration_secs))
                    .arg("-framerate")
                    .arg(fps.to_string())
                    .input(path),
                VisualInput::Clip { path } => request.input(path),
            };
        }

        let mut graph = filtergraph::serialize(&plan.graph);
        let encoding = &plan.output.encoding;

        if let Some(audio) = &plan.audio {
            graph.push_str(&format!("[{VIDEO_OUT}]"));
            request = request
                .input(audio)
                .arg("-filter_complex")
                .arg(graph)
                .args(["-map".to_string(), format!("[{VIDEO_OUT}]")])
                .args(["-map".to_string(), format!("{}:a", plan.inputs.len())])
                .args([
                    "-c:a",
                    encoding.audio_codec.as_str(),
                    "-b:a",
                    encoding.audio_bitrate.as_str(),
                ])
                .arg("-shortest");
        } else {
            request = request.arg("-filter_complex").arg(graph).arg("-an");
        }

        let frames = plan.output.frame_cap;
        let secs = frames as f64 / plan.output.fps.max(1) as f64;
        Ok(request
            .arg("-r")
            .arg(plan.output.fps.to_string())
            .arg("-frames:v")
            .arg(frames.to_string())
            .args(["-pix_fmt", "yuv420p"])
            .args(video_encoding(encoding))
            .expect_secs(secs))
    }
}

/// Attach `audio` to the picture stream of `video` without re-encoding it.
pub fn merge_request(
    stage: &str,
    video: &Path,
    audio: &Path,
    output: &Path,
    encoding: &EncodingConfig,
) -> EngineRequest {
    EngineRequest::new(stage, output)
        .input(video)
        .input(audio)
        .args(["-map", "0:v", "-map", "1:a", "-c:v", "copy"])
        .args([
            "-c:a",
            encoding.audio_codec.as_str(),
            "-b:a",
            encoding.audio_bitrate.as_str(),
        ])
        .arg("-shortest")
}

pub fn video_encoding(encoding: &EncodingConfig) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        encoding.video_codec.clone(),
        "-preset".to_string(),
        encoding.preset.clone(),
        "-crf".to_string(),
        encoding.crf.to_string(),
        "-b:v".to_string(),
        encoding.video_bitrate.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecut_common::ScriptedRandom;
    use slidecut_processing_core::{AssetTimeline, FilterGraphCompiler};
    use slidecut_project_model::Asset;

    fn timeline(config: &PipelineConfig) -> Timeline {
        let kept = vec![
            Asset::image("g/a.jpg"),
            Asset::video("g/b.mp4", 7.0),
            Asset::image("g/c.png"),
        ];
        AssetTimeline::new(config)
            .build(kept, Asset::outro("T/outro_vertical.mp4", 14.0))
            .unwrap()
    }

    fn plan(config: &PipelineConfig, audio: Option<PathBuf>) -> RenderPlan {
        let timeline = timeline(config);
        let graph = FilterGraphCompiler::new(config)
            .compile(&timeline, &mut ScriptedRandom::zeros())
            .unwrap();
        RenderPlanAssembler::new(config).plan(&timeline, graph, audio, "g/slideshow.mp4")
    }

    #[test]
    fn test_plan_inputs_follow_segments() {
        let config = PipelineConfig::default();
        let plan = plan(&config, None);

        assert_eq!(plan.inputs.len(), 4);
        assert_eq!(
            plan.inputs[0],
            VisualInput::Still {
                path: "g/a.jpg".into(),
                duration_secs: 5.0,
                fps: 25,
            }
        );
        assert_eq!(plan.inputs[1], VisualInput::Clip { path: "g/b.mp4".into() });
        assert_eq!(plan.output.frame_cap, 725);
    }

    #[test]
    fn test_video_only_request() {
        let config = PipelineConfig::default();
        let plan = plan(&config, None);
        let request = RenderPlanAssembler::new(&config)
            .request(&plan, "slideshow")
            .unwrap();

        assert_eq!(request.output, PathBuf::from("g/slideshow.mp4"));
        assert_eq!(request.value_of("-frames:v"), Some("725"));
        assert_eq!(request.value_of("-r"), Some("25"));
        assert_eq!(request.value_of("-c:v"), Some("libx264"));
        assert_eq!(request.value_of("-crf"), Some("22"));
        assert!(request.find("-an").is_some());
        assert!(request.find("-map").is_none());

        let inputs = request.args.iter().filter(|a| *a == "-i").count();
        assert_eq!(inputs, 4);
        assert_eq!(request.value_of("-t"), Some("5"));

        let graph = request.value_of("-filter_complex").unwrap();
        assert_eq!(graph.split(';').count(), 4 + 3 + 1);
    }

    #[test]
    fn test_request_with_audio_maps_streams() {
        let config = PipelineConfig::default();
        let plan = plan(&config, Some("g/mix.wav".into()));
        let request = RenderPlanAssembler::new(&config)
            .request(&plan, "slideshow")
            .unwrap();

        let graph = request.value_of("-filter_complex").unwrap();
        assert!(graph.ends_with("[vout]"));
        let maps: Vec<&str> = request
            .args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(maps, ["[vout]", "4:a"]);
        assert!(request.find("-shortest").is_some());
    }

    #[test]
    fn test_merge_copies_video() {
        let encoding = EncodingConfig::default();
        let request = merge_request(
            "merge",
            Path::new("g/slideshow.mp4"),
            Path::new("g/mix.wav"),
            Path::new("g/slideshow_with_audio.mp4"),
            &encoding,
        );
        assert_eq!(request.value_of("-c:v"), Some("copy"));
        assert_eq!(request.value_of("-c:a"), Some("aac"));
        assert_eq!(request.value_of("-b:a"), Some("192k"));
        assert_eq!(request.args.last().map(String::as_str), Some("-shortest"));
    }
}
