//! Typed visual filter graph.
//!
//! The graph is built in memory by the compiler and only turned into the
//! engine's textual syntax at the render boundary. Nodes reference their
//! inputs through [`Pad`]s; a node's output is either a named label that
//! exactly one later node consumes, or unlabeled, which marks the sink.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use slidecut_common::{Canvas, SlidecutError, SlidecutResult};

use crate::timeline::TransitionKind;

/// Identifier of a node, equal to its position in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Where a node reads a stream from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pad {
    /// Video stream of the n-th engine input.
    Input(usize),
    /// Output label of an earlier node.
    Label(String),
}

impl Pad {
    pub fn label(name: impl Into<String>) -> Self {
        Pad::Label(name.into())
    }
}

/// Where a text overlay sits on the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextPlacement {
    /// Jump to a random position every `interval_frames`, otherwise hold.
    Jitter { interval_frames: u32 },
    /// Walk the frame edges counter-clockwise, one edge per interval.
    EdgeWalk { interval_frames: u32, margin: u32 },
    /// Fixed offset from the canvas center.
    CenterOffset { x_offset: i32, y_offset: i32 },
}

/// A `drawtext` overlay (watermark or title).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    /// Text with real newlines; escaping happens at serialization.
    pub text: String,
    pub font_file: PathBuf,
    pub font_size: u32,
    /// Color name or RGB hex.
    pub color: String,
    pub opacity: f64,
    pub placement: TextPlacement,
    /// Visibility window `[start, end]` in seconds; always visible when `None`.
    pub enable: Option<(f64, f64)>,
    pub shadow: bool,
}

/// The operation a node performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterOp {
    /// Slow continuous zoom on a still image.
    KenBurns {
        zoom_step: f64,
        frames: u32,
        canvas: Canvas,
        fps: u32,
    },
    /// Reset timestamps, force the frame rate, and optionally rescale.
    Normalize { fps: u32, scale: Option<Canvas> },
    Crossfade {
        transition: TransitionKind,
        duration_secs: f64,
        offset_secs: f64,
    },
    DrawText(TextOverlay),
}

impl FilterOp {
    /// Short operation name used in logs and plan listings.
    pub fn name(&self) -> &'static str {
        match self {
            FilterOp::KenBurns { .. } => "kenburns",
            FilterOp::Normalize { .. } => "normalize",
            FilterOp::Crossfade { .. } => "crossfade",
            FilterOp::DrawText(_) => "drawtext",
        }
    }

    /// Per-asset effect node.
    pub fn is_effect(&self) -> bool {
        matches!(self, FilterOp::KenBurns { .. } | FilterOp::Normalize { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub id: NodeId,
    pub op: FilterOp,
    pub inputs: Vec<Pad>,
    /// `None` marks the graph sink.
    pub output: Option<String>,
}

/// A chain of filter nodes in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn push(&mut self, op: FilterOp, inputs: Vec<Pad>, output: Option<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(FilterNode {
            id,
            op,
            inputs,
            output,
        });
        id
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn crossfades(&self) -> impl Iterator<Item = &FilterNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.op, FilterOp::Crossfade { .. }))
    }

    pub fn effect_nodes(&self) -> impl Iterator<Item = &FilterNode> {
        self.nodes.iter().filter(|n| n.op.is_effect())
    }

    pub fn text_nodes(&self) -> impl Iterator<Item = &FilterNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.op, FilterOp::DrawText(_)))
    }

    /// Crossfade offsets in boundary order.
    pub fn crossfade_offsets(&self) -> Vec<f64> {
        self.crossfades()
            .filter_map(|n| match n.op {
                FilterOp::Crossfade { offset_secs, .. } => Some(offset_secs),
                _ => None,
            })
            .collect()
    }

    /// Transition kinds in boundary order.
    pub fn transitions(&self) -> Vec<TransitionKind> {
        self.crossfades()
            .filter_map(|n| match n.op {
                FilterOp::Crossfade { transition, .. } => Some(transition),
                _ => None,
            })
            .collect()
    }

    /// The unlabeled terminal node.
    pub fn sink(&self) -> Option<&FilterNode> {
        self.nodes.iter().find(|n| n.output.is_none())
    }

    /// Check the chain shape: one unlabeled sink at the end, every label
    /// defined once before use and consumed by exactly one later node,
    /// every engine input consumed once.
    pub fn validate(&self) -> SlidecutResult<()> {
        let Some(last) = self.nodes.last() else {
            return Err(SlidecutError::config("Filter graph is empty"));
        };

        let sinks = self.nodes.iter().filter(|n| n.output.is_none()).count();
        if sinks != 1 || last.output.is_some() {
            return Err(SlidecutError::config(format!(
                "Filter graph must have exactly one unlabeled sink at the end, found {sinks}"
            )));
        }

        let mut defined: HashMap<&str, NodeId> = HashMap::new();
        let mut consumed: HashSet<&str> = HashSet::new();
        let mut inputs_seen: HashSet<usize> = HashSet::new();

        for node in &self.nodes {
            for pad in &node.inputs {
                match pad {
                    Pad::Input(idx) => {
                        if !inputs_seen.insert(*idx) {
                            return Err(SlidecutError::config(format!(
                                "Engine input {idx} consumed more than once"
                            )));
                        }
                    }
                    Pad::Label(label) => {
                        if !defined.contains_key(label.as_str()) {
                            return Err(SlidecutError::config(format!(
                                "Node {} reads undefined label '{label}'",
                                node.id.0
                            )));
                        }
                        if !consumed.insert(label.as_str()) {
                            return Err(SlidecutError::config(format!(
                                "Label '{label}' consumed more than once"
                            )));
                        }
                    }
                }
            }

            if let Some(label) = &node.output {
                if defined.insert(label.as_str(), node.id).is_some() {
                    return Err(SlidecutError::config(format!(
                        "Label '{label}' defined more than once"
                    )));
                }
            }
        }

        if let Some(dangling) = defined.keys().find(|l| !consumed.contains(*l)) {
            return Err(SlidecutError::config(format!(
                "Label '{dangling}' is never consumed"
            )));
        }

        Ok(())
    }
}
