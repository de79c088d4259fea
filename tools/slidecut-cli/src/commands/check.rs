//! Check the media engine and template assets.

use std::path::Path;

use slidecut_common::PipelineConfig;
use slidecut_project_model::TemplateSet;
use slidecut_render_engine::engine::command_exists;

pub fn run(config: &PipelineConfig) -> anyhow::Result<()> {
    println!("Slidecut System Check");
    println!("{}", "=".repeat(50));

    let mut ok = true;
    for binary in ["ffmpeg", "ffprobe"] {
        if command_exists(binary) {
            println!("[OK] {binary} found");
        } else {
            println!("[MISSING] {binary} not found on PATH");
            ok = false;
        }
    }
    if config.depth_mode {
        let program = &config.parallax.program;
        if command_exists(program) {
            println!("[OK] parallax renderer {program} found");
        } else {
            println!("[MISSING] parallax renderer {program} not found on PATH");
            ok = false;
        }
    }

    match config.validate() {
        Ok(()) => println!("[OK] Configuration is valid"),
        Err(e) => {
            println!("[FAIL] {e}");
            ok = false;
        }
    }

    println!();
    println!(
        "Templates ({}, {}):",
        config.template_dir.display(),
        config.orientation
    );
    // Narration lives in each group, so only shared templates are checked here.
    let templates = TemplateSet::resolve(&config.template_dir, Path::new("."), config.orientation);
    for path in [
        &templates.music,
        &templates.transition_bed,
        &templates.narration_end,
        &templates.outro,
        &templates.overlay,
    ] {
        ok &= report(path);
    }

    println!();
    println!("Fonts ({}):", config.fonts_dir.display());
    ok &= report(&config.fonts_dir.join(&config.title.font_file));
    if config.watermark.enabled {
        ok &= report(&config.fonts_dir.join(&config.watermark.font_file));
    }

    println!();
    if ok {
        println!("Everything needed for a render is in place.");
    } else {
        println!("Some requirements are missing. See above.");
    }
    Ok(())
}

fn report(path: &Path) -> bool {
    let present = path.is_file();
    let tag = if present { "[OK]" } else { "[MISSING]" };
    println!("  {tag} {}", path.display());
    present
}
