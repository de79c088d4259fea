//! One asset group rendered end to end.
//!
//! Stages run strictly in order and every failure is tagged with the stage
//! it happened in. Intermediates stay on disk.

use std::path::{Path, PathBuf};

use slidecut_common::{PipelineConfig, RandomSource, SlidecutError, SlidecutResult};
use slidecut_processing_core::{AssetTimeline, AudioAlignment, FilterGraphCompiler};
use slidecut_project_model::{require, Asset, AssetKind, AudioStage, TemplateSet, Timeline};

use crate::assemble::RenderPlanAssembler;
use crate::audio::AudioPipeline;
use crate::engine::{CancelToken, MediaEngine};
use crate::fonts::subtitle_font_name;
use crate::overlay::{OverlayCompositor, SubtitleBurn};
use crate::parallax::ParallaxPool;

pub const SLIDESHOW_FILE: &str = "slideshow.mp4";
pub const SLIDESHOW_WITH_AUDIO_FILE: &str = "slideshow_with_audio.mp4";

/// A group failure and the stage that raised it.
#[derive(Debug, thiserror::Error)]
#[error("stage {stage} failed: {source}")]
pub struct GroupFailure {
    pub stage: String,
    #[source]
    pub source: SlidecutError,
}

impl GroupFailure {
    fn at(stage: impl Into<String>) -> impl FnOnce(SlidecutError) -> GroupFailure {
        let stage = stage.into();
        move |source| GroupFailure { stage, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Rendered(PathBuf),
    /// The final output already existed.
    Skipped(PathBuf),
}

/// File name of the final output: spaces become `_`, anything outside
/// `[A-Za-z0-9_-]` is dropped.
pub fn final_file_name(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if stem.is_empty() {
        "output.mp4".to_string()
    } else {
        format!("{stem}.mp4")
    }
}

pub struct GroupRunner<'a> {
    config: &'a PipelineConfig,
    engine: &'a dyn MediaEngine,
    cancel: &'a CancelToken,
    parallax: Option<&'a ParallaxPool>,
}

impl<'a> GroupRunner<'a> {
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

    pub fn final_output(&self, group_dir: &Path) -> PathBuf {
        group_dir.join(final_file_name(&self.config.title_text()))
    }

    pub fn templates(&self, group_dir: &Path) -> TemplateSet {
        TemplateSet::resolve(&self.config.template_dir, group_dir, self.config.orientation)
    }

    /// Media files of the group, without this pipeline's own outputs.
    pub fn discover(&self, group_dir: &Path) -> SlidecutResult<Vec<PathBuf>> {
        let final_output = self.final_output(group_dir);
        let own = [
            group_dir.join(SLIDESHOW_FILE),
            group_dir.join(SLIDESHOW_WITH_AUDIO_FILE),
            final_output,
        ];

        let mut listing = Vec::new();
        for entry in std::fs::read_dir(group_dir)? {
            let path = entry?.path();
            if path.is_file() && AssetKind::classify(&path).is_some() && !own.contains(&path) {
                listing.push(path);
            }
        }
        Ok(listing)
    }

    /// Build the timeline: select, evict, probe.
    pub async fn timeline(
        &self,
        listing: &[PathBuf],
        templates: &TemplateSet,
        delete_evicted: bool,
    ) -> SlidecutResult<Timeline> {
        let stage = AssetTimeline::new(self.config);
        let selection = stage.select(listing);

        if !selection.excluded.is_empty() {
            tracing::debug!(count = selection.excluded.len(), "Excluded images in depth mode");
        }
        if delete_evicted {
            for path in &selection.evicted {
                tracing::info!(file = %path.display(), "Deleting file over the media limit");
                std::fs::remove_file(path)?;
            }
        }

        let mut kept = Vec::with_capacity(selection.kept.len());
        for (path, kind) in selection.kept {
            let asset = match kind {
                AssetKind::Video => {
                    let secs = self.engine.probe_duration(&path).await?;
                    Asset::video(path, secs)
                }
                _ => Asset::image(path),
            };
            kept.push(asset);
        }

        let outro_path = require(&templates.outro)?;
        let outro_secs = self.engine.probe_duration(outro_path).await?;
        stage.build(kept, Asset::outro(outro_path, outro_secs))
    }

    /// Render `group_dir`, or skip it if its final output already exists.
    pub async fn run(
        &self,
        group_dir: &Path,
        random: &mut dyn RandomSource,
    ) -> Result<GroupOutcome, GroupFailure> {
        let final_output = self.final_output(group_dir);
        if is_finished(&final_output) {
            tracing::info!(output = %final_output.display(), "Final output exists, skipping group");
            return Ok(GroupOutcome::Skipped(final_output));
        }

        let templates = self.templates(group_dir);
        require(&templates.outro).map_err(GroupFailure::at("discover"))?;
        let mut listing = self.discover(group_dir).map_err(GroupFailure::at("discover"))?;

        if self.config.depth_mode {
            if let Some(pool) = self.parallax {
                let images: Vec<PathBuf> = listing
                    .iter()
                    .filter(|p| AssetKind::classify(p) == Some(AssetKind::Image))
                    .cloned()
                    .collect();
                pool.render_all(&images, self.cancel)
                    .await
                    .map_err(GroupFailure::at("parallax"))?;
                listing = self.discover(group_dir).map_err(GroupFailure::at("parallax"))?;
            }
        }

        let timeline = self
            .timeline(&listing, &templates, true)
            .await
            .map_err(GroupFailure::at("timeline"))?;
        tracing::info!(
            group = %group_dir.display(),
            segments = timeline.segment_count(),
            frame_budget = timeline.frame_budget(),
            "Timeline built"
        );

        let slideshow = group_dir.join(SLIDESHOW_FILE);
        self.render_slideshow(&timeline, &slideshow, random)
            .await
            .map_err(GroupFailure::at("slideshow"))?;

        let video_secs = self
            .engine
            .probe_duration(&slideshow)
            .await
            .map_err(GroupFailure::at("probe"))?;

        let with_audio = group_dir.join(SLIDESHOW_WITH_AUDIO_FILE);
        self.render_audio(&templates, &timeline, video_secs, group_dir, &slideshow, &with_audio)
            .await?;

        self.render_overlay(group_dir, &templates, &with_audio, &final_output, random)
            .await
            .map_err(GroupFailure::at("overlay"))?;

        tracing::info!(output = %final_output.display(), "Group rendered");
        Ok(GroupOutcome::Rendered(final_output))
    }

    async fn render_slideshow(
        &self,
        timeline: &Timeline,
        output: &Path,
        random: &mut dyn RandomSource,
    ) -> SlidecutResult<()> {
        if self.config.watermark.enabled {
            require(&self.config.fonts_dir.join(&self.config.watermark.font_file))?;
        }
        let graph = FilterGraphCompiler::new(self.config).compile(timeline, random)?;
        let assembler = RenderPlanAssembler::new(self.config);
        let plan = assembler.plan(timeline, graph, None, output);
        let request = assembler.request(&plan, "slideshow")?;
        self.engine.run(&request, self.cancel).await
    }

    async fn render_audio(
        &self,
        templates: &TemplateSet,
        timeline: &Timeline,
        video_secs: f64,
        group_dir: &Path,
        video: &Path,
        output: &Path,
    ) -> Result<(), GroupFailure> {
        let plan = AudioAlignment::new(self.config, templates)
            .plan(video_secs, timeline.outro_secs(), group_dir, video, output)
            .map_err(GroupFailure::at("audio:plan"))?;
        for layer in &plan.layers {
            tracing::debug!(
                role = %layer.role,
                target_secs = layer.target_secs,
                gain = layer.gain,
                source = %layer.source.display(),
                "Audio layer"
            );
        }

        let pipeline = AudioPipeline::new(self.engine, &self.config.encoding, self.cancel);
        for stage in &plan.stages {
            let id = match stage {
                AudioStage::Merge { .. } => "merge".to_string(),
                other => format!("audio:{}", other.id()),
            };
            pipeline
                .run_stage(stage)
                .await
                .map_err(GroupFailure::at(id))?;
        }
        Ok(())
    }

    async fn render_overlay(
        &self,
        group_dir: &Path,
        templates: &TemplateSet,
        input: &Path,
        output: &Path,
        random: &mut dyn RandomSource,
    ) -> SlidecutResult<()> {
        let clip = require(&templates.overlay)?;
        require(&self.config.fonts_dir.join(&self.config.title.font_file))?;
        let overlay_secs = self.engine.probe_duration(clip).await?;

        let subtitles = self.subtitles(group_dir).await?;
        let request = OverlayCompositor::new(self.config).request(
            input,
            clip,
            overlay_secs,
            output,
            subtitles.as_ref(),
            random,
        )?;
        self.engine.run(&request, self.cancel).await
    }

    async fn subtitles(&self, group_dir: &Path) -> SlidecutResult<Option<SubtitleBurn>> {
        let subs = &self.config.subtitles;
        if !subs.enabled {
            return Ok(None);
        }
        let file = group_dir.join(&subs.file_name);
        if !file.is_file() {
            tracing::warn!(file = %file.display(), "Subtitles enabled but no subtitle file, skipping burn-in");
            return Ok(None);
        }

        let fonts_dir = if self.config.fonts_dir.is_absolute() {
            self.config.fonts_dir.clone()
        } else {
            std::env::current_dir()?.join(&self.config.fonts_dir)
        };
        let font_name = subtitle_font_name(&fonts_dir, &subs.font).await;
        Ok(Some(SubtitleBurn {
            file,
            fonts_dir,
            font_name,
        }))
    }
}

fn is_finished(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
