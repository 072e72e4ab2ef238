//! Newline-delimited JSON outcome log.
//!
//! One outcome per line. Failure lines embed the full source upload record,
//! so a later run can re-feed exactly the uploads that failed.

use anyhow::{Context, Result};
use caravel_core::outcome::MigrationOutcome;
use caravel_core::upload::Upload;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Append-only writer for outcome lines.
pub struct OutcomeLog {
    file: tokio::fs::File,
}

impl OutcomeLog {
    /// Open (or create) the log at `path` for appending.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open outcome log {}", path.display()))?;
        Ok(Self { file })
    }

    /// Write one outcome as a single JSON line.
    pub async fn append(&mut self, outcome: &MigrationOutcome) -> Result<()> {
        let mut line = serde_json::to_vec(outcome)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        Ok(())
    }

    /// Flush buffered lines to disk.
    pub async fn flush(&mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }
}

/// The slice of an outcome line a re-run cares about.
#[derive(Debug, Deserialize)]
struct OutcomeLine {
    #[serde(rename = "type")]
    kind: String,
    upload: Upload,
}

/// Extract the source upload from every failure line of a previous log.
///
/// Success lines are skipped; lines that are not outcome records at all are
/// rejected, since silently dropping them would shrink a re-run.
pub async fn read_failed_uploads(path: &Path) -> Result<Vec<Upload>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read outcome log {}", path.display()))?;

    let mut uploads = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line: OutcomeLine = serde_json::from_str(line)
            .with_context(|| format!("malformed outcome on line {}", index + 1))?;
        if line.kind == "UploadMigrationFailure" {
            uploads.push(line.upload);
        }
    }
    Ok(uploads)
}
