//! Rolling log of completed runs, kept next to the seen-offer file.

use crate::run::RunReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Only the most recent records are kept.
pub const MAX_ENTRIES: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    /// Completed, but some notifications failed.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub recipient: Option<String>,
    pub fetched: usize,
    pub new: usize,
    pub sent: usize,
    pub failed: usize,
    pub status: RunStatus,
}

impl RunRecord {
    pub fn from_report(report: &RunReport, recipient: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            recipient,
            fetched: report.fetched,
            new: report.new,
            sent: report.sent,
            failed: report.failed,
            status: if report.failed == 0 {
                RunStatus::Success
            } else {
                RunStatus::Partial
            },
        }
    }
}

pub struct NotificationHistory {
    path: PathBuf,
}

impl NotificationHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records, oldest first. A missing or unreadable file reads as empty.
    pub fn entries(&self) -> Vec<RunRecord> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable history file");
                Vec::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read history file");
                Vec::new()
            }
        }
    }

    /// Appends a record, dropping the oldest beyond [`MAX_ENTRIES`].
    pub fn append(&self, record: RunRecord) -> Result<()> {
        let mut entries = self.entries();
        entries.push(record);
        if entries.len() > MAX_ENTRIES {
            let excess = entries.len() - MAX_ENTRIES;
            entries.drain(..excess);
        }

        let json = serde_json::to_string_pretty(&entries)?;
        write_atomic(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to write history to {:?}", self.path))?;
        Ok(())
    }
}
