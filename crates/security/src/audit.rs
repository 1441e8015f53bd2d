//! Security audit log: a buffered, append-only JSON-lines log of security
//! events, independent of the transaction audit log in `cs-transaction`.
//!
//! Events are buffered in memory and flushed at most once a second, except
//! `CRITICAL` events which force an immediate flush — losing a `CRITICAL`
//! event to a crash between append and flush is the one failure mode this
//! module refuses to accept silently.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::Result;

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROLLED_FILES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    AccessGranted,
    AccessDenied,
    StateRead,
    StateWrite,
    StateDelete,
    SecretsDetected,
    EncryptionSuccess,
    EncryptionFailure,
    DecryptionSuccess,
    DecryptionFailure,
    KeyRotation,
    LockAcquired,
    LockDenied,
    LockTimeout,
    PermissionChange,
    SuspiciousActivity,
    BackupCreated,
    RecoveryAttempt,
}

impl SecurityEventType {
    fn default_severity(self) -> Severity {
        use SecurityEventType::*;
        match self {
            SecretsDetected | EncryptionFailure | DecryptionFailure => Severity::Critical,
            AccessDenied | LockDenied | LockTimeout | SuspiciousActivity | RecoveryAttempt => {
                Severity::Warning
            }
            PermissionChange => Severity::Error,
            _ => Severity::Info,
        }
    }

    fn is_failure_type(self) -> bool {
        matches!(
            self,
            SecurityEventType::EncryptionFailure
                | SecurityEventType::DecryptionFailure
                | SecurityEventType::AccessDenied
                | SecurityEventType::LockDenied
                | SecurityEventType::LockTimeout
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: SecurityEventType,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<String>,
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack_trace: Option<String>,
}

/// Aggregate counts returned by [`SecurityAuditLog::statistics`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecurityStatistics {
    pub by_type: HashMap<String, u64>,
    pub by_severity: HashMap<String, u64>,
    pub suspicious_activities: u64,
    pub failed_operations: u64,
}

pub struct SecurityAuditLog {
    path: PathBuf,
    buffer: Mutex<Vec<SecurityEvent>>,
    last_flush: Mutex<Instant>,
}

impl SecurityAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SecurityAuditLog {
            path: path.into(),
            buffer: Mutex::new(Vec::new()),
            last_flush: Mutex::new(Instant::now()),
        }
    }

    /// Record an event. Severity defaults per event type; pass a non-`None`
    /// `stack_trace` only for diagnostics you've already captured — this
    /// module does not capture backtraces itself.
    pub fn record(
        &self,
        event_type: SecurityEventType,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let severity = event_type.default_severity();
        let event = SecurityEvent {
            timestamp: Utc::now(),
            event_type,
            severity,
            message: message.into(),
            details,
            user: current_user(),
            pid: std::process::id(),
            hostname: hostname::get().ok().and_then(|h| h.into_string().ok()),
            stack_trace: None,
        };

        let critical = severity == Severity::Critical;
        self.buffer.lock().push(event);

        if critical || self.last_flush.lock().elapsed() >= FLUSH_INTERVAL {
            self.flush()?;
        }
        Ok(())
    }

    /// Force a flush regardless of the 1s interval.
    pub fn flush(&self) -> Result<()> {
        let mut buffer = self.buffer.lock();
        if buffer.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for event in buffer.iter() {
            let line = serde_json::to_string(event)?;
            writeln!(file, "{line}")?;
        }
        file.flush()?;
        buffer.clear();
        *self.last_flush.lock() = Instant::now();
        drop(buffer);
        self.rotate_if_needed()?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let size = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if size <= MAX_LOG_SIZE {
            return Ok(());
        }
        for n in (1..MAX_ROLLED_FILES).rev() {
            let from = rolled_path(&self.path, n);
            let to = rolled_path(&self.path, n + 1);
            if from.exists() {
                let _ = fs::rename(from, to);
            }
        }
        let first_rolled = rolled_path(&self.path, 1);
        fs::rename(&self.path, first_rolled)?;
        Ok(())
    }

    /// Aggregate statistics over persisted events, optionally filtered to
    /// those at or after `since`. Flushes the in-memory buffer first so
    /// recent events are included.
    pub fn statistics(&self, since: Option<DateTime<Utc>>) -> Result<SecurityStatistics> {
        self.flush()?;
        let mut stats = SecurityStatistics::default();
        if !self.path.exists() {
            return Ok(stats);
        }
        let text = fs::read_to_string(&self.path)?;
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let event: SecurityEvent = match serde_json::from_str(line) {
                Ok(e) => e,
                Err(_) => continue,
            };
            if let Some(since) = since {
                if event.timestamp < since {
                    continue;
                }
            }
            *stats
                .by_type
                .entry(format!("{:?}", event.event_type))
                .or_insert(0) += 1;
            *stats
                .by_severity
                .entry(format!("{:?}", event.severity))
                .or_insert(0) += 1;
            if event.event_type == SecurityEventType::SuspiciousActivity {
                stats.suspicious_activities += 1;
            }
            if event.event_type.is_failure_type() {
                stats.failed_operations += 1;
            }
        }
        Ok(stats)
    }
}

fn rolled_path(base: &Path, n: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

fn current_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .or_else(|| Some("unknown".to_string()))
}
