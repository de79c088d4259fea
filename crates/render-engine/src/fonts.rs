//! Font lookup for subtitle styling.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Family name to put in a subtitle style.
///
/// A font file present in `fonts_dir` is asked for its full name
/// (`fc-query`), falling back to the file stem. Anything else is taken to
/// be an installed family name and returned as-is.
pub async fn subtitle_font_name(fonts_dir: &Path, font: &str) -> String {
    let path = fonts_dir.join(font);
    if !path.is_file() {
        return font.to_string();
    }

    match query_full_name(&path).await {
        Some(name) => name,
        None => {
            tracing::debug!(font = %path.display(), "fc-query gave no name, using file stem");
            file_stem_name(font)
        }
    }
}

async fn query_full_name(path: &Path) -> Option<String> {
    let output = Command::new("fc-query")
        .arg("--format=%{fullname}")
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    first_name(&String::from_utf8_lossy(&output.stdout))
}

/// First entry of a comma-separated name list.
fn first_name(raw: &str) -> Option<String> {
    let name = raw.split(',').next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Stem up to the first dot (`Nexa Bold.otf` -> `Nexa Bold`).
pub fn file_stem_name(font: &str) -> String {
    let base = Path::new(font)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| font.to_string());
    base.split('.').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_name() {
        assert_eq!(file_stem_name("Nexa Bold.otf"), "Nexa Bold");
        assert_eq!(file_stem_name("dir/Montserrat-SemiBold.otf"), "Montserrat-SemiBold");
        assert_eq!(file_stem_name("Arial"), "Arial");
    }

    #[test]
    fn test_first_name() {
        assert_eq!(first_name("Nexa Bold,Nexa-Bold\n"), Some("Nexa Bold".to_string()));
        assert_eq!(first_name("  "), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_family_name() {
        let name = subtitle_font_name(Path::new("/definitely/not/fonts"), "Arial").await;
        assert_eq!(name, "Arial");
    }
}
