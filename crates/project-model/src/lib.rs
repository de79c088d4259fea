//! Slidecut Project Model
//!
//! Defines the data contracts handed between pipeline stages:
//! - **Assets:** Discovered images, videos, and the fixed outro clip
//! - **Templates:** Fixed-name template assets resolved per group
//! - **Timeline:** Ordered segments with a frame budget
//! - **Graph:** Typed visual filter graph (nodes and pads)
//! - **Audio:** Audio layers and the ordered alignment stages
//! - **Plan:** Render plan combining graph, audio, and output parameters
//!
//! Everything here is descriptive data handed between stages by value.
//! Nothing in this crate runs the media engine.

pub mod asset;
pub mod audio;
pub mod graph;
pub mod plan;
pub mod template;
pub mod timeline;

pub use asset::*;
pub use audio::*;
pub use graph::*;
pub use plan::*;
pub use template::*;
pub use timeline::*;
