// medallion-core/src/infrastructure/ingest_log.rs
//
// Audit trail of every ingestion attempt. The only artifact of the pipeline that is
// appended to and never rewritten, not even by `clean`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::project::Feed;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::append_line;

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "ingestion_runs.jsonl";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum IngestionStatus {
    Success,
    Retrying,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionLogEntry {
    pub timestamp: String,
    pub feed: Feed,
    pub dataset: String,
    pub source: String,
    pub destination: String,
    pub attempt: u32,
    pub rows: usize,
    pub columns: usize,
    pub status: IngestionStatus,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

pub struct IngestionLog {
    path: PathBuf,
    // Ingestors run concurrently; lines must not interleave.
    guard: Mutex<()>,
}

impl IngestionLog {
    pub fn new(data_root: &Path) -> Self {
        Self::at(data_root.join(LOG_DIR).join(LOG_FILE))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &IngestionLogEntry) -> Result<(), InfrastructureError> {
        let line = serde_json::to_string(entry)?;
        let _lock = self
            .guard
            .lock()
            .map_err(|_| InfrastructureError::Io(std::io::Error::other("Ingestion log mutex poisoned")))?;
        append_line(&self.path, &line)
    }

    pub fn entries(&self) -> Result<Vec<IngestionLogEntry>, InfrastructureError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(InfrastructureError::from))
            .collect()
    }
}
