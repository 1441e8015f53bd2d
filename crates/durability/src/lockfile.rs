//! The lock file's on-disk shape: YAML at `<base>/.locks/<name>.lock`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockMetadata {
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ppid: Option<u32>,
    pub hostname: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockTiming {
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub renewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockOperation {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingProcess {
    pub pid: u32,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConcurrency {
    #[serde(default)]
    pub waiting_processes: Vec<WaitingProcess>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFile {
    pub version: u32,
    pub lock_id: Uuid,
    pub metadata: LockMetadata,
    pub timing: LockTiming,
    pub operation: LockOperation,
    #[serde(default)]
    pub concurrency: LockConcurrency,
}

impl LockFile {
    pub fn new(op_type: impl Into<String>, expiry: chrono::Duration) -> Self {
        let now = Utc::now();
        LockFile {
            version: 1,
            lock_id: Uuid::new_v4(),
            metadata: LockMetadata {
                pid: std::process::id(),
                ppid: parent_pid(),
                hostname: hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| "unknown".to_string()),
                user: std::env::var("USER")
                    .or_else(|_| std::env::var("USERNAME"))
                    .unwrap_or_else(|_| "unknown".to_string()),
            },
            timing: LockTiming {
                acquired_at: now,
                expires_at: now + expiry,
                renewed_at: None,
            },
            operation: LockOperation { op_type: op_type.into(), stack_trace: None },
            concurrency: LockConcurrency::default(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.timing.expires_at
    }

    pub fn renew(&mut self, expiry: chrono::Duration) {
        let now = Utc::now();
        self.timing.renewed_at = Some(now);
        self.timing.expires_at = now + expiry;
    }

    pub fn add_waiter(&mut self, pid: u32) {
        if self.concurrency.waiting_processes.iter().any(|w| w.pid == pid) {
            return;
        }
        self.concurrency.waiting_processes.push(WaitingProcess { pid, since: Utc::now() });
    }
}

#[cfg(unix)]
fn parent_pid() -> Option<u32> {
    Some(unsafe { libc::getppid() } as u32)
}

#[cfg(not(unix))]
fn parent_pid() -> Option<u32> {
    None
}
