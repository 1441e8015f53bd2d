//! Transaction audit log: append-only JSON-lines at `logs/audit.log`.
//!
//! The source this system is modeled on rewrites the whole log file on
//! every append; we don't repeat that mistake (see design notes) — each
//! call opens for append, writes one line, and fsyncs, so growth is O(1)
//! per event and a crash mid-write only ever loses the last, incomplete
//! line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Result;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    Begin,
    Operation,
    ValidationFailed,
    ValidationError,
    Commit,
    Rollback,
    Recovery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub transaction_id: Option<Uuid>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<serde_json::Value>,
}

pub struct TransactionAuditLog {
    path: PathBuf,
}

impl TransactionAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TransactionAuditLog { path: path.into() }
    }

    pub fn record(
        &self,
        event_type: AuditEventType,
        transaction_id: Option<Uuid>,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let event = AuditEvent {
            timestamp: Utc::now(),
            event_type,
            transaction_id,
            message: message.into(),
            details,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(&event)?;
        writeln!(file, "{line}")?;
        file.sync_data()?;
        drop(file);
        self.rotate_if_needed()?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let size = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if size <= MAX_LOG_SIZE {
            return Ok(());
        }
        let ts = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let rotated = rotated_path(&self.path, &ts.to_string());
        fs::rename(&self.path, rotated)?;
        Ok(())
    }
}

fn rotated_path(base: &Path, ts: &str) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("audit");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("log");
    base.with_file_name(format!("{stem}-{ts}.{ext}"))
}
