//! Executes an [`AudioPlan`] stage by stage through the media engine.

use std::path::Path;

use slidecut_common::{EncodingConfig, SlidecutResult};
use slidecut_processing_core::audio_align::{check_duration, end_card_layout, trailing_silence};
use slidecut_project_model::{
    require, AudioPlan, AudioStage, DuckingParams, Fade, FadeDirection,
};

use crate::assemble::merge_request;
use crate::engine::{CancelToken, EngineRequest, MediaEngine};
use crate::filtergraph::format_secs;

/// Every intermediate is resampled to this layout before filtering.
const AUDIO_FORMAT: &str = "aformat=sample_rates=44100:channel_layouts=stereo";

pub struct AudioPipeline<'a> {
    engine: &'a dyn MediaEngine,
    encoding: &'a EncodingConfig,
    cancel: &'a CancelToken,
}

impl<'a> AudioPipeline<'a> {
    pub fn new(
        engine: &'a dyn MediaEngine,
        encoding: &'a EncodingConfig,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            engine,
            encoding,
            cancel,
        }
    }

    /// Run every stage in order.
    pub async fn run(&self, plan: &AudioPlan) -> SlidecutResult<()> {
        for stage in &plan.stages {
            self.run_stage(stage).await?;
        }
        Ok(())
    }

    /// Run one stage. A stage that claims a length is probed afterwards
    /// and must land within the epsilon of it.
    pub async fn run_stage(&self, stage: &AudioStage) -> SlidecutResult<()> {
        for input in inputs(stage) {
            require(input)?;
        }
        let request = self.request(stage).await?;
        self.engine.run(&request, self.cancel).await?;

        if let Some(expected) = stage.expected_secs() {
            let actual = self.engine.probe_duration(stage.output()).await?;
            check_duration(stage.id(), expected, actual)?;
        }
        tracing::info!(stage = %request.stage, output = %stage.output().display(), "Audio stage complete");
        Ok(())
    }

    /// Engine request for one stage. Stages whose padding depends on a
    /// source length probe it first.
    pub async fn request(&self, stage: &AudioStage) -> SlidecutResult<EngineRequest> {
        let id = format!("audio:{}", stage.id());
        let request = match stage {
            AudioStage::TrimMusic {
                source,
                output,
                duration_secs,
                fades,
            } => {
                let mut filters = vec![AUDIO_FORMAT.to_string()];
                filters.extend(fades.iter().map(fade_filter));
                EngineRequest::new(id, output)
                    .input(source)
                    .arg("-t")
                    .arg(format_secs(*duration_secs))
                    .arg("-af")
                    .arg(filters.join(","))
                    .expect_secs(*duration_secs)
            }
            AudioStage::TrimTransitionBed {
                source,
                output,
                duration_secs,
                gain,
            } => EngineRequest::new(id, output)
                .input(source)
                .arg("-t")
                .arg(format_secs(*duration_secs))
                .arg("-af")
                .arg(format!("{AUDIO_FORMAT},volume={}", format_secs(*gain)))
                .expect_secs(*duration_secs),
            AudioStage::PrependSilence {
                source,
                output,
                silence_secs,
            } => {
                let source_secs = self.engine.probe_duration(source).await?;
                EngineRequest::new(id, output)
                    .input(source)
                    .arg("-af")
                    .arg(format!("{AUDIO_FORMAT},{}", delay_filter(*silence_secs)))
                    .expect_secs(source_secs + silence_secs)
            }
            AudioStage::PadToTarget {
                role,
                source,
                output,
                target_secs,
            } => {
                let actual = self.engine.probe_duration(source).await?;
                let silence = trailing_silence(role.as_str(), *target_secs, actual)?;
                tracing::debug!(track = %role, actual_secs = actual, silence_secs = silence, "Padding track");
                EngineRequest::new(id, output)
                    .input(source)
                    .arg("-af")
                    .arg(format!("{AUDIO_FORMAT},apad=pad_dur={}", format_secs(silence)))
                    .expect_secs(*target_secs)
            }
            AudioStage::Duck {
                bed,
                control,
                output,
                params,
                target_secs,
                ..
            } => EngineRequest::new(id, output)
                .input(bed)
                .input(control)
                .arg("-filter_complex")
                .arg(duck_filter(params))
                .arg("-t")
                .arg(format_secs(*target_secs))
                .expect_secs(*target_secs),
            AudioStage::AlignEndCard {
                source,
                output,
                target_secs,
                ..
            } => {
                let narration = self.engine.probe_duration(source).await?;
                let layout = end_card_layout(*target_secs, narration)?;
                EngineRequest::new(id, output)
                    .input(source)
                    .arg("-af")
                    .arg(format!(
                        "{AUDIO_FORMAT},{},apad=pad_dur={}",
                        delay_filter(layout.lead_silence_secs),
                        format_secs(layout.trailing_silence_secs)
                    ))
                    .arg("-t")
                    .arg(format_secs(*target_secs))
                    .expect_secs(*target_secs)
            }
            AudioStage::FinalMix {
                bed,
                transitions,
                output,
                gain,
                target_secs,
            } => {
                let gain = format_secs(*gain);
                EngineRequest::new(id, output)
                    .input(bed)
                    .input(transitions)
                    .arg("-filter_complex")
                    .arg(format!(
                        "[0:a]{AUDIO_FORMAT},volume={gain}[bed];[1:a]{AUDIO_FORMAT},volume={gain}[tr];[bed][tr]amix=inputs=2:duration=first:normalize=0"
                    ))
                    .arg("-t")
                    .arg(format_secs(*target_secs))
                    .expect_secs(*target_secs)
            }
            AudioStage::Merge {
                video,
                audio,
                output,
            } => merge_request("merge", video, audio, output, self.encoding),
        };
        Ok(request)
    }
}

/// Files a stage reads.
fn inputs(stage: &AudioStage) -> Vec<&Path> {
    match stage {
        AudioStage::TrimMusic { source, .. }
        | AudioStage::TrimTransitionBed { source, .. }
        | AudioStage::PrependSilence { source, .. }
        | AudioStage::PadToTarget { source, .. }
        | AudioStage::AlignEndCard { source, .. } => vec![source.as_path()],
        AudioStage::Duck { bed, control, .. } => vec![bed.as_path(), control.as_path()],
        AudioStage::FinalMix {
            bed, transitions, ..
        } => vec![bed.as_path(), transitions.as_path()],
        AudioStage::Merge { video, audio, .. } => vec![video.as_path(), audio.as_path()],
    }
}

fn fade_filter(fade: &Fade) -> String {
    let kind = match fade.direction {
        FadeDirection::In => "in",
        FadeDirection::Out => "out",
    };
    format!(
        "afade=t={kind}:st={}:d={}",
        format_secs(fade.start_secs),
        format_secs(fade.duration_secs)
    )
}

fn delay_filter(secs: f64) -> String {
    let ms = (secs.max(0.0) * 1000.0).round() as u64;
    format!("adelay=delays={ms}:all=1")
}

/// Compress the bed under the control track, then mix both at unity gain.
fn duck_filter(params: &DuckingParams) -> String {
    format!(
        "[0:a]{AUDIO_FORMAT}[bed];[1:a]{AUDIO_FORMAT},asplit=2[sc][voice];[bed][sc]sidechaincompress=threshold={}:ratio={}:attack={}:release={}[ducked];[ducked][voice]amix=inputs=2:duration=first:normalize=0",
        format_secs(params.threshold),
        format_secs(params.ratio),
        format_secs(params.attack_ms),
        format_secs(params.release_ms),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{temp_dir, FakeEngine};
    use slidecut_common::{Orientation, PipelineConfig, SlidecutError};
    use slidecut_processing_core::audio_align::files;
    use slidecut_processing_core::AudioAlignment;
    use slidecut_project_model::TemplateSet;

    fn setup(narration_secs: f64, end_card_secs: f64) -> (FakeEngine, AudioPlan) {
        let dir = temp_dir("audio");
        let templates = TemplateSet::resolve(&dir, &dir, Orientation::Vertical);
        for path in templates.audio_assets() {
            std::fs::write(path, b"audio").unwrap();
        }
        std::fs::write(dir.join("slideshow.mp4"), b"video").unwrap();

        let engine = FakeEngine::new();
        engine.set_duration(&templates.narration, narration_secs);
        engine.set_duration(&templates.narration_end, end_card_secs);

        let config = PipelineConfig::default();
        let plan = AudioAlignment::new(&config, &templates)
            .plan(
                120.0,
                14.0,
                &dir,
                &dir.join("slideshow.mp4"),
                &dir.join("slideshow_with_audio.mp4"),
            )
            .unwrap();
        (engine, plan)
    }

    #[tokio::test]
    async fn test_runs_every_stage_in_order() {
        let (engine, plan) = setup(35.0, 9.0);
        let encoding = EncodingConfig::default();
        let cancel = CancelToken::new();
        AudioPipeline::new(&engine, &encoding, &cancel)
            .run(&plan)
            .await
            .unwrap();

        assert_eq!(
            engine.stages(),
            [
                "audio:music_trim",
                "audio:transition_bed_trim",
                "audio:narration_lead_in",
                "audio:narration_pad",
                "audio:duck_narration",
                "audio:end_card_align",
                "audio:duck_end_card",
                "audio:final_mix",
                "merge",
            ]
        );

        // 35s narration + 5s lead-in leaves 80s of trailing silence.
        let pad = engine.request("audio:narration_pad").unwrap();
        assert!(pad.value_of("-af").unwrap().ends_with("apad=pad_dur=80"));

        let end = engine.request("audio:end_card_align").unwrap();
        let af = end.value_of("-af").unwrap();
        assert!(af.contains("adelay=delays=105000:all=1"));
        assert!(af.ends_with("apad=pad_dur=6"));
    }

    #[tokio::test]
    async fn test_long_narration_is_reconciliation_error() {
        // 118s narration + 5s lead-in overruns the 120s video.
        let (engine, plan) = setup(118.0, 9.0);
        let encoding = EncodingConfig::default();
        let cancel = CancelToken::new();
        let result = AudioPipeline::new(&engine, &encoding, &cancel)
            .run(&plan)
            .await;

        assert!(matches!(
            result,
            Err(SlidecutError::DurationReconciliation { .. })
        ));
        // Nothing after the failed pad stage runs.
        assert_eq!(engine.stages().last().map(String::as_str), Some("audio:narration_lead_in"));
    }

    #[tokio::test]
    async fn test_drifting_output_is_reconciliation_error() {
        let (_, plan) = setup(35.0, 9.0);
        let engine = FakeEngine::new().with_drift("audio:music_trim", 0.2);

        let encoding = EncodingConfig::default();
        let cancel = CancelToken::new();
        let err = AudioPipeline::new(&engine, &encoding, &cancel)
            .run(&plan)
            .await
            .unwrap_err();

        match err {
            SlidecutError::DurationReconciliation {
                track,
                target_secs,
                actual_secs,
            } => {
                assert_eq!(track, "music_trim");
                assert_eq!(target_secs, 120.0);
                assert!((actual_secs - 120.2).abs() < 1e-9);
            }
            other => panic!("expected reconciliation error, got {other:?}"),
        }
        assert_eq!(engine.stages(), ["audio:music_trim"]);
    }

    #[tokio::test]
    async fn test_drift_within_epsilon_is_accepted() {
        let (_, plan) = setup(35.0, 9.0);
        let engine = FakeEngine::new().with_drift("audio:music_trim", 0.04);
        let dir = plan.stages[2].output().parent().unwrap().to_path_buf();
        engine.set_duration(dir.join("voiceover.mp3"), 35.0);
        engine.set_duration(dir.join("voiceover_end.mp3"), 9.0);

        let encoding = EncodingConfig::default();
        let cancel = CancelToken::new();
        AudioPipeline::new(&engine, &encoding, &cancel)
            .run(&plan)
            .await
            .unwrap();
        assert_eq!(engine.stages().len(), 9);
    }

    #[tokio::test]
    async fn test_engine_failure_stops_pipeline() {
        let (_, plan) = setup(35.0, 9.0);
        let engine = FakeEngine::failing_at("audio:duck_narration");
        let dir = plan.stages[2].output().parent().unwrap().to_path_buf();
        engine.set_duration(dir.join("voiceover.mp3"), 35.0);

        let encoding = EncodingConfig::default();
        let cancel = CancelToken::new();
        let err = AudioPipeline::new(&engine, &encoding, &cancel)
            .run(&plan)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "external_engine");
        assert_eq!(engine.stages().len(), 5);
        assert!(!dir.join(files::FINAL_MIX).exists());
    }

    #[tokio::test]
    async fn test_missing_template_is_missing_asset() {
        let (engine, plan) = setup(35.0, 9.0);
        std::fs::remove_file(plan.stages[0].output().with_file_name("soundtrack.mp3")).unwrap();

        let encoding = EncodingConfig::default();
        let cancel = CancelToken::new();
        let err = AudioPipeline::new(&engine, &encoding, &cancel)
            .run(&plan)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "missing_asset");
        assert!(engine.stages().is_empty());
    }

    #[test]
    fn test_duck_filter_uses_fixed_constants() {
        let text = duck_filter(&slidecut_processing_core::audio_align::DUCKING);
        assert!(text.contains("sidechaincompress=threshold=0.02:ratio=3:attack=20:release=500"));
        assert!(text.ends_with("amix=inputs=2:duration=first:normalize=0"));
    }

    #[test]
    fn test_fade_filter() {
        let fade = Fade {
            direction: FadeDirection::Out,
            start_secs: 117.0,
            duration_secs: 3.0,
        };
        assert_eq!(fade_filter(&fade), "afade=t=out:st=117:d=3");
    }
}
