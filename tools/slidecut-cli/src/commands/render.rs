//! Batch render every group under a root directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use slidecut_common::{PipelineConfig, ThreadRandom};
use slidecut_render_engine::{
    BatchDriver, CancelToken, CommandParallaxRenderer, FfmpegEngine, MediaEngine, ParallaxPool,
};

pub async fn run(root: PathBuf, config: PipelineConfig, seed: Option<u64>) -> anyhow::Result<()> {
    config.validate()?;

    let timeout = Duration::from_secs(config.engine_timeout_secs);
    let engine = FfmpegEngine::new(timeout);
    if !engine.is_available() {
        anyhow::bail!("ffmpeg and ffprobe must be on PATH (run `slidecut check`)");
    }

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling the running stage");
            on_signal.cancel();
        }
    });

    let pool = config.depth_mode.then(|| {
        let renderer = CommandParallaxRenderer::new(&config.parallax, timeout);
        ParallaxPool::new(Arc::new(renderer), config.parallax.workers)
    });

    let mut random = seed.map(ThreadRandom::seeded).unwrap_or_default();
    let mut driver = BatchDriver::new(&config, &engine, &cancel);
    if let Some(pool) = &pool {
        driver = driver.with_parallax(pool);
    }

    println!("Rendering groups under: {}", root.display());
    let report = driver.run(&root, &mut random).await?;

    println!();
    println!("Rendered: {}", report.rendered.len());
    for group in &report.rendered {
        println!("  [OK]   {group}");
    }
    println!("Skipped:  {}", report.skipped.len());
    for group in &report.skipped {
        println!("  [SKIP] {group}");
    }
    println!("Failed:   {}", report.failed.len());
    for failure in &report.failed {
        println!(
            "  [FAIL] {} at {} ({}): {}",
            failure.group, failure.stage, failure.kind, failure.error
        );
    }
    if report.cancelled {
        println!("Batch was cancelled before all groups were processed.");
    }

    tracing::debug!(report = %serde_json::to_string(&report)?, "Batch report");
    Ok(())
}
