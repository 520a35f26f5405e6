use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit log CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("audit log writer is poisoned")]
    Poisoned,
}

/// One row of the request log. Inputs that do not apply to the mode are left
/// empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub mode: &'static str,
    pub annual_salary: Option<f64>,
    pub portion_saved: Option<f64>,
    pub total_cost: Option<f64>,
    pub semi_raise: Option<f64>,
    pub starting_salary: Option<f64>,
    pub outcome: String,
}

impl AuditRecord {
    pub fn now(mode: &'static str, outcome: String) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            mode,
            annual_salary: None,
            portion_saved: None,
            total_cost: None,
            semi_raise: None,
            starting_salary: None,
            outcome,
        }
    }
}

/// Append-only CSV log of evaluated requests.
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl AuditLog {
    /// Opens the log at `path`. With `reset` any previous content is
    /// discarded, otherwise rows are appended. The header is only written into
    /// an empty file.
    pub fn open(path: impl AsRef<Path>, reset: bool) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let file = if reset {
            File::create(&path)?
        } else {
            OpenOptions::new().create(true).append(true).open(&path)?
        };
        let needs_header = file.metadata()?.len() == 0;
        let writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut writer = self.writer.lock().map_err(|_| AuditError::Poisoned)?;
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}
