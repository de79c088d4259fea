//! Dry run for one group: nothing is rendered or deleted.

use std::path::PathBuf;
use std::time::Duration;

use slidecut_common::{PipelineConfig, ThreadRandom};
use slidecut_processing_core::{AssetTimeline, AudioAlignment, FilterGraphCompiler};
use slidecut_render_engine::filtergraph;
use slidecut_render_engine::group::{SLIDESHOW_FILE, SLIDESHOW_WITH_AUDIO_FILE};
use slidecut_render_engine::{CancelToken, FfmpegEngine, GroupRunner, RenderPlanAssembler};

pub async fn run(group: PathBuf, config: PipelineConfig, seed: Option<u64>) -> anyhow::Result<()> {
    config.validate()?;

    let engine = FfmpegEngine::new(Duration::from_secs(config.engine_timeout_secs));
    let cancel = CancelToken::new();
    let runner = GroupRunner::new(&config, &engine, &cancel);

    let templates = runner.templates(&group);
    let listing = runner.discover(&group)?;
    let selection = AssetTimeline::new(&config).select(&listing);

    println!("Group: {}", group.display());
    println!(
        "  Media: {} kept ({} videos), {} over the limit, {} excluded",
        selection.kept.len(),
        selection.videos().count(),
        selection.evicted.len(),
        selection.excluded.len()
    );
    for path in &selection.evicted {
        println!("  [EVICT] {}", path.display());
    }

    let timeline = runner.timeline(&listing, &templates, false).await?;
    println!();
    println!("Segments:");
    for segment in timeline.segments() {
        println!(
            "  {:>3}  {:<6}  {:>6.2}s  {}",
            segment.index,
            format!("{:?}", segment.asset.kind).to_lowercase(),
            segment.nominal_secs,
            segment.asset.file_name()
        );
    }
    println!();
    println!("  Expected duration: {:.2}s", timeline.expected_secs());
    println!("  Frame budget:      {}", timeline.frame_budget());

    let mut random = seed.map(ThreadRandom::seeded).unwrap_or_default();
    let graph = FilterGraphCompiler::new(&config).compile(&timeline, &mut random)?;
    let transitions: Vec<String> = graph.transitions().iter().map(|t| t.to_string()).collect();
    println!("  Transitions:       {}", transitions.join(", "));

    let mut ops: Vec<&str> = Vec::new();
    for node in graph.nodes() {
        if ops.last() != Some(&node.op.name()) {
            ops.push(node.op.name());
        }
    }
    println!("  Operations:        {}", ops.join(" -> "));

    let assembler = RenderPlanAssembler::new(&config);
    let plan = assembler.plan(&timeline, graph, None, group.join(SLIDESHOW_FILE));
    let request = assembler.request(&plan, "slideshow")?;

    println!();
    println!("Filter graph:");
    for chain in filtergraph::serialize(&plan.graph).split(';') {
        println!("  {chain}");
    }
    println!();
    println!("Engine arguments:");
    println!("  {}", request.args.join(" "));

    // The real render probes the slideshow; the nominal duration stands in.
    let slideshow = group.join(SLIDESHOW_FILE);
    let audio = AudioAlignment::new(&config, &templates).plan(
        timeline.expected_secs(),
        timeline.outro_secs(),
        &group,
        &slideshow,
        &group.join(SLIDESHOW_WITH_AUDIO_FILE),
    )?;
    println!();
    println!("Audio layers (target {:.2}s):", audio.target_secs);
    for layer in &audio.layers {
        println!(
            "  {:<14} {:>7.2}s  gain {:.2}  {}",
            layer.role.as_str(),
            layer.target_secs,
            layer.gain,
            layer.source.display()
        );
    }
    println!("  Stages: {}", audio.stage_ids().join(", "));

    Ok(())
}
