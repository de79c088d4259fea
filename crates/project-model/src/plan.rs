//! Render plan: everything one engine invocation needs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use slidecut_common::{Canvas, EncodingConfig};

use crate::graph::FilterGraph;

/// How an engine input is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisualInput {
    /// A still image looped for `duration_secs` at `fps`.
    Still {
        path: PathBuf,
        duration_secs: f64,
        fps: u32,
    },
    /// A video clip read as-is.
    Clip { path: PathBuf },
}

/// Output parameters of the encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputParams {
    pub fps: u32,
    pub canvas: Canvas,
    /// Hard cap on encoded frames.
    pub frame_cap: u64,
    pub encoding: EncodingConfig,
}

/// Created once per group and consumed once by the assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    /// Engine inputs, indexed by `Pad::Input`.
    pub inputs: Vec<VisualInput>,
    pub graph: FilterGraph,
    /// Mixed audio stream to attach in the same pass, if already available.
    pub audio: Option<PathBuf>,
    pub output: OutputParams,
    pub destination: PathBuf,
}
