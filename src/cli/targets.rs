//! URL-list file reading

use std::path::Path;

use anyhow::{Context, Result};
use surge_core::parse_target;
use url::Url;

/// Read the target URLs from a list file
///
/// A file without any URL is not an error; the run is then degenerate.
pub fn read_url_list(path: &Path) -> Result<Vec<Url>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL file '{}'", path.display()))?;

    let urls = parse_url_list(&contents)
        .with_context(|| format!("invalid URL file '{}'", path.display()))?;

    if urls.is_empty() {
        tracing::warn!(path = %path.display(), "URL file contains no URLs");
    } else {
        tracing::debug!(path = %path.display(), count = urls.len(), "Loaded URL list");
    }

    Ok(urls)
}

/// Parse one URL per line, skipping blank lines and `#` comments
pub fn parse_url_list(contents: &str) -> Result<Vec<Url>> {
    let mut urls = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let url = parse_target(line).with_context(|| format!("line {}", idx + 1))?;
        urls.push(url);
    }

    Ok(urls)
}
