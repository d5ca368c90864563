//! Append-only CSV record of structured model calls.
//!
//! One row per call, written synchronously so a crash loses at most the
//! call in flight. The header is written only when the file is new or empty.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use entente_core::truncate_chars;

/// Raw responses are cut to this many characters in the log.
pub const RESPONSE_PREVIEW_CHARS: usize = 500;

/// Failures writing the call log.
#[derive(Debug, Error)]
pub enum CallLogError {
    /// Creating or writing the file failed.
    #[error("call log I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serializing a row failed.
    #[error("call log CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the call log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallLogEntry {
    /// RFC 3339.
    pub timestamp: String,
    /// Unique per call.
    pub request_id: String,
    /// Model identifier as requested.
    pub model: String,
    /// Game the call was made for.
    pub game_id: String,
    /// Agent the call was made for.
    pub agent_id: String,
    /// Game phase of the call.
    pub phase: String,
    /// What the call was for, e.g. `orders`.
    pub response_type: String,
    /// Whether a JSON object was extracted.
    pub success: bool,
    /// Raw response, cut to `RESPONSE_PREVIEW_CHARS`.
    pub response: String,
}

impl CallLogEntry {
    /// Stamp the current time on a new row.
    #[allow(clippy::too_many_arguments)]
    pub fn now(
        request_id: impl Into<String>,
        model: impl Into<String>,
        game_id: impl Into<String>,
        agent_id: impl Into<String>,
        phase: impl Into<String>,
        response_type: impl Into<String>,
        success: bool,
        response: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            request_id: request_id.into(),
            model: model.into(),
            game_id: game_id.into(),
            agent_id: agent_id.into(),
            phase: phase.into(),
            response_type: response_type.into(),
            success,
            response: truncate_chars(response, RESPONSE_PREVIEW_CHARS),
        }
    }
}

/// Append-only CSV writer shared across tasks.
pub struct CallLog {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl CallLog {
    /// Open (or create) the log at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, CallLogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;
        let writer = csv::WriterBuilder::new().has_headers(is_empty).from_writer(file);
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
        })
    }

    /// Where rows are appended.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row and flush it to disk.
    pub fn append(&self, entry: &CallLogEntry) -> Result<(), CallLogError> {
        let mut writer = self.writer.lock();
        writer.serialize(entry)?;
        writer.flush()?;
        Ok(())
    }

    /// Append one row, logging instead of returning a failure.
    pub fn record(&self, entry: &CallLogEntry) {
        if let Err(e) = self.append(entry) {
            tracing::warn!(
                path = %self.path.display(),
                request_id = %entry.request_id,
                error = %e,
                "failed to write call log row"
            );
        }
    }

    /// Read every row back. Used by tests and the CLI.
    pub fn read_all(path: &Path) -> Result<Vec<CallLogEntry>, CallLogError> {
        let mut reader = csv::Reader::from_path(path)?;
        reader
            .deserialize()
            .map(|row| row.map_err(CallLogError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, success: bool, response: &str) -> CallLogEntry {
        CallLogEntry::now(id, "ollama/llama3", "g1", "FRANCE", "S1901M", "order_generation", success, response)
    }

    #[test]
    fn header_written_once_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/calls.csv");

        CallLog::open(&path).unwrap().append(&entry("r1", true, "{}")).unwrap();
        CallLog::open(&path).unwrap().append(&entry("r2", false, "oops")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("request_id").count(), 1);

        let rows = CallLog::read_all(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].request_id, "r1");
        assert!(rows[0].success);
        assert_eq!(rows[1].response, "oops");
        assert!(!rows[1].success);
    }

    #[test]
    fn responses_with_commas_and_newlines_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.csv");
        let log = CallLog::open(&path).unwrap();
        let raw = "{\"orders\": [\"A PAR H\", \"F BRE - MAO\"]}\nthanks, \"friend\"";
        log.record(&entry("r1", true, raw));
        assert_eq!(CallLog::read_all(&path).unwrap()[0].response, raw);
    }

    #[test]
    fn long_responses_truncated() {
        let long = "x".repeat(RESPONSE_PREVIEW_CHARS + 50);
        let e = entry("r1", true, &long);
        assert_eq!(e.response.chars().count(), RESPONSE_PREVIEW_CHARS + 3);
        assert!(e.response.ends_with("..."));
    }
}
