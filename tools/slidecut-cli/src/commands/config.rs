//! Print or persist the effective configuration.

use slidecut_common::AppConfig;

pub fn run(config: &AppConfig, save: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        let path = config.save()?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}
