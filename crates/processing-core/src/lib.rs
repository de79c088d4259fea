//! Slidecut Processing Core
//!
//! Turns a group's asset listing into render decisions:
//! - **Asset Timeline:** Order and bound the assets, compute the frame budget
//! - **Graph Compiler:** Build the chained crossfade filter graph
//! - **Audio Alignment:** Duration arithmetic and the ordered audio stages
//!
//! This crate is pure computation. No I/O, no media engine.
//! All inputs are data; all outputs are data.

pub mod audio_align;
pub mod graph_compiler;
pub mod timeline;

pub use audio_align::AudioAlignment;
pub use graph_compiler::FilterGraphCompiler;
pub use timeline::AssetTimeline;
