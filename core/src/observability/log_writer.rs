//! JSONL sink for hook metrics.

use std::path::{Path, PathBuf};

use hookgate_protocol::HookMetrics;
use tokio::fs::{OpenOptions, create_dir_all};
use tokio::io::AsyncWriteExt;

use crate::error::MetricsLogError;

/// Append-only JSONL writer for [`HookMetrics`] records.
#[derive(Debug, Clone)]
pub struct MetricsLogWriter {
    path: PathBuf,
}

impl MetricsLogWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `records` as one JSON line each, creating parent directories
    /// and the file if necessary. The batch is serialized before the file is
    /// touched so a bad record never leaves a partial batch behind.
    pub async fn append_batch(&self, records: &[HookMetrics]) -> Result<(), MetricsLogError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut payload = String::new();
        for record in records {
            payload.push_str(&serde_json::to_string(record)?);
            payload.push('\n');
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(payload.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
