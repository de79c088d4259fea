//! Slidecut Render Engine
//!
//! Everything that talks to the external media engine: graph
//! serialization, render plan assembly, the audio stage executor, the
//! overlay pass, and the per-group and batch drivers.
//!
//! # Group Pipeline
//!
//! ```text
//! images/videos ─┐
//!                ├── AssetTimeline ── FilterGraphCompiler ── slideshow.mp4
//! outro clip ────┘                                               │
//!                                                           probe (D)
//!                                                                │
//! music/bed/narration ── AudioPipeline (9 stages) ── slideshow_with_audio.mp4
//!                                                                │
//! overlay clip + title + subtitles ── OverlayCompositor ── <title>.mp4
//! ```

pub mod assemble;
pub mod audio;
pub mod batch;
pub mod engine;
pub mod filtergraph;
pub mod fonts;
pub mod group;
pub mod overlay;
pub mod parallax;

#[cfg(test)]
mod testing;

pub use assemble::RenderPlanAssembler;
pub use audio::AudioPipeline;
pub use batch::{BatchDriver, BatchReport, GroupError};
pub use engine::{CancelToken, EngineRequest, FfmpegEngine, MediaEngine};
pub use group::{GroupFailure, GroupOutcome, GroupRunner};
pub use overlay::OverlayCompositor;
pub use parallax::{CommandParallaxRenderer, ParallaxPool, ParallaxRenderer};
