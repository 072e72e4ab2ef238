//! NDJSON upload sources.

use anyhow::{Context, Result};
use caravel_core::upload::Upload;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Parse newline-delimited upload records.
///
/// Blank lines are skipped; a malformed line is an error up front rather
/// than a surprise mid-migration.
pub fn parse_uploads(contents: &str) -> Result<Vec<Upload>> {
    let mut uploads = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let upload: Upload = serde_json::from_str(line)
            .with_context(|| format!("malformed upload record on line {}", index + 1))?;
        // A part-less upload would flow through the pipeline without ever
        // producing an outcome; refuse it up front.
        if upload.parts.is_empty() {
            anyhow::bail!("upload {} on line {} has no parts", upload.cid, index + 1);
        }
        uploads.push(upload);
    }
    Ok(uploads)
}

/// Read uploads from a file.
pub async fn read_uploads_from_file(path: &Path) -> Result<Vec<Upload>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read uploads from {}", path.display()))?;
    parse_uploads(&contents)
}

/// Read uploads from standard input.
pub async fn read_uploads_from_stdin() -> Result<Vec<Upload>> {
    let mut contents = String::new();
    tokio::io::stdin()
        .read_to_string(&mut contents)
        .await
        .context("failed to read uploads from stdin")?;
    parse_uploads(&contents)
}
