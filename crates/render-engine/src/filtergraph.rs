//! Serialization of the typed filter graph to `-filter_complex` text.
//!
//! This is the only place that knows the engine's filter syntax. Each node
//! becomes one chain `[in][in]filter[out]`; chains are joined with `;`.

use std::path::Path;

use slidecut_project_model::{FilterGraph, FilterNode, FilterOp, Pad, TextOverlay, TextPlacement};

/// Render the whole graph.
pub fn serialize(graph: &FilterGraph) -> String {
    graph
        .nodes()
        .iter()
        .map(serialize_node)
        .collect::<Vec<_>>()
        .join(";")
}

/// Render one node as a labeled chain.
pub fn serialize_node(node: &FilterNode) -> String {
    let mut chain = String::new();
    for pad in &node.inputs {
        chain.push_str(&pad_text(pad));
    }
    chain.push_str(&op_text(&node.op));
    if let Some(label) = &node.output {
        chain.push('[');
        chain.push_str(label);
        chain.push(']');
    }
    chain
}

pub fn pad_text(pad: &Pad) -> String {
    match pad {
        Pad::Input(idx) => format!("[{idx}:v]"),
        Pad::Label(label) => format!("[{label}]"),
    }
}

/// Filter text for one operation.
pub fn op_text(op: &FilterOp) -> String {
    match op {
        FilterOp::KenBurns {
            zoom_step,
            frames,
            canvas,
            fps,
        } => format!(
            "zoompan=z='zoom+{zoom_step}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={w}x{h}:fps={fps},format=yuv420p",
            w = canvas.width,
            h = canvas.height,
        ),
        FilterOp::Normalize { fps, scale } => {
            let scale = scale
                .map(|c| format!(",scale={}:{}", c.width, c.height))
                .unwrap_or_default();
            format!("settb=AVTB,setpts=PTS-STARTPTS,fps={fps}/1{scale},setsar=1:1,format=yuv420p")
        }
        FilterOp::Crossfade {
            transition,
            duration_secs,
            offset_secs,
        } => format!(
            "xfade=transition={transition}:duration={duration_secs}:offset={}",
            format_secs(*offset_secs)
        ),
        FilterOp::DrawText(text) => drawtext(text),
    }
}

/// `drawtext` filter for a watermark or title.
pub fn drawtext(text: &TextOverlay) -> String {
    let (x, y) = placement_exprs(&text.placement);
    let mut out = format!(
        "drawtext=expansion=none:text={}:fontfile={}:fontsize={}:fontcolor={}@{}:x='{x}':y='{y}'",
        escape_drawtext(&text.text),
        escape_path(&text.font_file),
        text.font_size,
        color_value(&text.color),
        text.opacity,
    );
    if let Some((start, end)) = text.enable {
        out.push_str(&format!(
            ":enable='between(t,{},{})'",
            format_secs(start),
            format_secs(end)
        ));
    }
    if text.shadow {
        out.push_str(":shadowcolor=black:shadowx=4:shadowy=2");
    }
    out
}

fn placement_exprs(placement: &TextPlacement) -> (String, String) {
    match *placement {
        TextPlacement::Jitter { interval_frames: n } => (
            format!("if(eq(mod(n,{n}),0),random(1)*(w-text_w),x)"),
            format!("if(eq(mod(n,{n}),0),random(1)*(h-text_h),y)"),
        ),
        TextPlacement::EdgeWalk {
            interval_frames: n,
            margin: m,
        } => {
            let phase = format!("mod(n/{n},4)");
            let frac = format!("mod(n/{n},1)");
            let span_x = format!("(w-text_w-{})", 2 * m);
            let span_y = format!("(h-text_h-{})", 2 * m);
            (
                format!(
                    "if(lt({phase},1),{m}+{frac}*{span_x},if(lt({phase},2),w-text_w-{m},if(lt({phase},3),w-text_w-{m}-{frac}*{span_x},{m})))"
                ),
                format!(
                    "if(lt({phase},1),{m},if(lt({phase},2),{m}+{frac}*{span_y},if(lt({phase},3),h-text_h-{m},h-text_h-{m}-{frac}*{span_y})))"
                ),
            )
        }
        TextPlacement::CenterOffset { x_offset, y_offset } => (
            format!("(w-text_w)/2+({x_offset})"),
            format!("(h/2)+({y_offset})"),
        ),
    }
}

/// RGB hex becomes `0xRRGGBB`; named colors pass through.
fn color_value(color: &str) -> String {
    let hex = color.trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        format!("0x{hex}")
    } else {
        color.to_string()
    }
}

/// Seconds without float noise (`4.5`, `19.5`, `0.333333`).
pub fn format_secs(secs: f64) -> String {
    let rounded = (secs * 1_000_000.0).round() / 1_000_000.0;
    let text = format!("{rounded:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Escape a value for an option inside a filter, then for the graph.
pub fn escape_drawtext(text: &str) -> String {
    escape_graph(&escape_option(text))
}

pub fn escape_path(path: &Path) -> String {
    escape_drawtext(&path.to_string_lossy().replace('\\', "/"))
}

fn escape_option(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_graph(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use slidecut_common::Canvas;
    use slidecut_project_model::TransitionKind;

    const CANVAS: Canvas = Canvas {
        width: 1080,
        height: 1920,
    };

    #[test]
    fn test_kenburns_text() {
        let op = FilterOp::KenBurns {
            zoom_step: 0.001,
            frames: 125,
            canvas: CANVAS,
            fps: 25,
        };
        assert_eq!(
            op_text(&op),
            "zoompan=z='zoom+0.001':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=125:s=1080x1920:fps=25,format=yuv420p"
        );
    }

    #[test]
    fn test_normalize_text() {
        let scaled = FilterOp::Normalize {
            fps: 25,
            scale: Some(CANVAS),
        };
        assert_eq!(
            op_text(&scaled),
            "settb=AVTB,setpts=PTS-STARTPTS,fps=25/1,scale=1080:1920,setsar=1:1,format=yuv420p"
        );

        let outro = FilterOp::Normalize {
            fps: 25,
            scale: None,
        };
        assert_eq!(
            op_text(&outro),
            "settb=AVTB,setpts=PTS-STARTPTS,fps=25/1,setsar=1:1,format=yuv420p"
        );
    }

    #[test]
    fn test_crossfade_text() {
        let op = FilterOp::Crossfade {
            transition: TransitionKind::CircleOpen,
            duration_secs: 0.5,
            offset_secs: 14.5,
        };
        assert_eq!(
            op_text(&op),
            "xfade=transition=circleopen:duration=0.5:offset=14.5"
        );
    }

    #[test]
    fn test_serialize_chain() {
        let mut graph = FilterGraph::new();
        let normalize = FilterOp::Normalize {
            fps: 25,
            scale: None,
        };
        graph.push(normalize.clone(), vec![Pad::Input(0)], Some("v0".into()));
        graph.push(normalize, vec![Pad::Input(1)], Some("v1".into()));
        graph.push(
            FilterOp::Crossfade {
                transition: TransitionKind::HBlur,
                duration_secs: 0.5,
                offset_secs: 4.5,
            },
            vec![Pad::label("v0"), Pad::label("v1")],
            None,
        );

        let text = serialize(&graph);
        let chains: Vec<&str> = text.split(';').collect();
        assert_eq!(chains.len(), 3);
        assert!(chains[0].starts_with("[0:v]settb=AVTB"));
        assert!(chains[0].ends_with("[v0]"));
        assert_eq!(
            chains[2],
            "[v0][v1]xfade=transition=hblur:duration=0.5:offset=4.5"
        );
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("It's 5:00"), r"It\\\'s 5\\:00");
        assert_eq!(escape_drawtext("a,b"), r"a\,b");
        assert_eq!(escape_drawtext("plain"), "plain");
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(4.5), "4.5");
        assert_eq!(format_secs(19.5), "19.5");
        assert_eq!(format_secs(21.0), "21");
        assert_eq!(format_secs(0.1 + 0.2), "0.3");
        assert_eq!(format_secs(0.0), "0");
    }

    #[test]
    fn test_jitter_watermark() {
        let text = TextOverlay {
            text: "Today is a\n Plus Day".into(),
            font_file: "fonts/Nexa Bold.otf".into(),
            font_size: 40,
            color: "white".into(),
            opacity: 0.7,
            placement: TextPlacement::Jitter {
                interval_frames: 50,
            },
            enable: None,
            shadow: false,
        };
        let out = drawtext(&text);
        assert!(out.starts_with("drawtext=expansion=none:text=Today is a\n Plus Day:"));
        assert!(out.contains("fontcolor=white@0.7"));
        assert!(out.contains("x='if(eq(mod(n,50),0),random(1)*(w-text_w),x)'"));
        assert!(!out.contains("enable="));
    }

    #[test]
    fn test_title_window_and_color() {
        let text = TextOverlay {
            text: "Model Name".into(),
            font_file: "fonts/Montserrat-SemiBold.otf".into(),
            font_size: 90,
            color: "FF00B4".into(),
            opacity: 1.0,
            placement: TextPlacement::CenterOffset {
                x_offset: 110,
                y_offset: -35,
            },
            enable: Some((22.0, 27.0)),
            shadow: true,
        };
        let out = drawtext(&text);
        assert!(out.contains("fontcolor=0xFF00B4@1"));
        assert!(out.contains("x='(w-text_w)/2+(110)':y='(h/2)+(-35)'"));
        assert!(out.contains(":enable='between(t,22,27)'"));
        assert!(out.ends_with(":shadowcolor=black:shadowx=4:shadowy=2"));
    }
}
