//! Export of parsed records as a line-oriented text file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ExportConfig, DEFAULT_EXPORT_FILENAME};
use crate::types::{FlashcardRecord, HarvestError, HarvestResult};

/// MIME type of the exported file.
pub const EXPORT_MIME: &str = "text/plain;charset=utf-8";

/// One record per line, `"front";"back"`, newline separated, no trailing newline.
pub fn serialize_records(records: &[FlashcardRecord]) -> String {
    records
        .iter()
        .map(FlashcardRecord::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A file ready to be handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub filename: String,
    pub mime: &'static str,
    pub body: String,
    pub records: usize,
}

impl ExportPayload {
    pub fn new(filename: impl Into<String>, records: &[FlashcardRecord]) -> Self {
        Self {
            filename: filename.into(),
            mime: EXPORT_MIME,
            body: serialize_records(records),
            records: records.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Where and how much was exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReceipt {
    /// File path, or a description of where the download was handed off.
    pub location: String,
    pub records: usize,
    pub bytes: usize,
}

/// Destination for exported records.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn export(&self, payload: &ExportPayload) -> HarvestResult<ExportReceipt>;
}

/// Writes the payload into a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink for the configured directory, else the user's download
    /// directory, else the current directory.
    pub fn from_config(config: &ExportConfig) -> Self {
        let dir = config
            .directory
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ExportSink for FileSink {
    async fn export(&self, payload: &ExportPayload) -> HarvestResult<ExportReceipt> {
        if payload.is_empty() {
            return Err(HarvestError::Export("refusing to write an empty export".into()));
        }

        let filename = if payload.filename.is_empty() {
            DEFAULT_EXPORT_FILENAME
        } else {
            payload.filename.as_str()
        };
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(filename);

        // Write beside the target, then rename, so a reader never sees half a file.
        let tmp = self.dir.join(format!(".{filename}.partial"));
        tokio::fs::write(&tmp, payload.body.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::info!(path = %path.display(), records = payload.records, "export written");
        Ok(ExportReceipt {
            location: path.display().to_string(),
            records: payload.records,
            bytes: payload.len(),
        })
    }
}
