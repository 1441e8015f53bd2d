//! Write-Ahead Log: an append-only JSON-lines journal of pending
//! operations, replayed on the next start to finish a transaction that
//! committed to the log but never made it to `apply`.
//!
//! The WAL is empty iff there is no in-flight or crash-interrupted
//! transaction — [`Wal::clear`] is the only thing that should ever make it
//! empty again, and only the transaction coordinator calls it, only after a
//! successful commit or a fully-successful recovery replay.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalOp {
    Write,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalEntry {
    pub timestamp: u64,
    pub op: WalOp,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_id: Option<String>,
}

impl WalEntry {
    pub fn write(key: impl Into<String>, value: serde_json::Value, transaction_id: Option<String>) -> Self {
        WalEntry {
            timestamp: now_ms(),
            op: WalOp::Write,
            key: key.into(),
            value: Some(value),
            previous_value: None,
            transaction_id,
        }
    }

    pub fn delete(key: impl Into<String>, transaction_id: Option<String>) -> Self {
        WalEntry {
            timestamp: now_ms(),
            op: WalOp::Delete,
            key: key.into(),
            value: None,
            previous_value: None,
            transaction_id,
        }
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Configuration for one WAL instance.
#[derive(Debug, Clone)]
pub struct WalConfig {
    pub max_writes_per_window: u32,
    pub window: Duration,
    pub rotate_max_size: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            max_writes_per_window: 100,
            window: Duration::from_millis(1000),
            rotate_max_size: 10 * 1024 * 1024,
        }
    }
}

impl WalConfig {
    /// Test-mode configuration: the spec calls for a "test-mode indicator"
    /// that raises the WAL rate limit so tests that append in a tight loop
    /// don't trip the guardrail.
    pub fn for_testing() -> Self {
        WalConfig {
            max_writes_per_window: 100_000,
            window: Duration::from_millis(1000),
            rotate_max_size: 10 * 1024 * 1024,
        }
    }
}

struct RateLimiter {
    window: Duration,
    max_writes: u32,
    recent: VecDeque<Instant>,
}

impl RateLimiter {
    fn new(max_writes: u32, window: Duration) -> Self {
        RateLimiter { window, max_writes, recent: VecDeque::new() }
    }

    fn check_and_record(&mut self) -> Result<()> {
        let now = Instant::now();
        while let Some(&front) = self.recent.front() {
            if now.duration_since(front) > self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        if self.recent.len() as u32 >= self.max_writes {
            return Err(Error::WalRateLimited {
                writes: self.recent.len() as u32,
                window_ms: self.window.as_millis() as u64,
            });
        }
        self.recent.push_back(now);
        Ok(())
    }
}

/// The write-ahead log for one base directory.
pub struct Wal {
    path: PathBuf,
    rate_limiter: Mutex<RateLimiter>,
    replaying: AtomicBool,
}

impl Wal {
    /// Open (or prepare to create) the WAL file at `path`. Rejects any path
    /// whose directory doesn't live under the process working directory,
    /// the system temp directory, or `/tmp` — a WAL anywhere else is
    /// refused at construction, not silently allowed.
    pub fn new(path: impl Into<PathBuf>, config: WalConfig) -> Result<Self> {
        let path = path.into();
        check_path_allowed(&path)?;
        Ok(Wal {
            path,
            rate_limiter: Mutex::new(RateLimiter::new(config.max_writes_per_window, config.window)),
            replaying: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, stamping its timestamp, and fsync before
    /// returning.
    pub fn append(&self, mut entry: WalEntry) -> Result<()> {
        self.rate_limiter.lock().check_and_record()?;
        entry.timestamp = now_ms();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(&entry)?;
        writeln!(file, "{line}")?;
        file.sync_data()?;
        Ok(())
    }

    /// Read every entry in append order, skipping malformed lines (a torn
    /// tail from a crash mid-write is tolerated, not fatal).
    pub fn replay(&self) -> Result<Vec<WalEntry>> {
        if self
            .replaying
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::WalReplayReentrant);
        }
        let result = self.replay_inner();
        self.replaying.store(false, Ordering::SeqCst);
        result
    }

    fn replay_inner(&self) -> Result<Vec<WalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(line = line_no, error = %e, "WAL line unreadable, skipping");
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = line_no, error = %e, "malformed WAL line skipped"),
            }
        }
        Ok(entries)
    }

    /// Truncate/delete the WAL file.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Copy the current WAL to `wal-<ISO-timestamp>.backup` alongside it.
    pub fn create_backup(&self) -> Result<PathBuf> {
        if !self.path.exists() {
            return Ok(self.path.clone());
        }
        let ts = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let backup_name = format!("wal-{ts}.backup");
        let backup_path = self
            .path
            .parent()
            .map(|p| p.join(&backup_name))
            .unwrap_or_else(|| PathBuf::from(&backup_name));
        fs::copy(&self.path, &backup_path)?;
        Ok(backup_path)
    }

    /// If the WAL has grown past `max_size`, snapshot it to a backup file
    /// and clear it.
    pub fn rotate(&self, max_size: u64) -> Result<bool> {
        if self.size() <= max_size {
            return Ok(false);
        }
        self.create_backup()?;
        self.clear()?;
        Ok(true)
    }
}

fn check_path_allowed(path: &Path) -> Result<()> {
    let dir = path.parent().unwrap_or(path);
    let candidates = [
        std::env::current_dir().ok(),
        Some(std::env::temp_dir()),
        Some(PathBuf::from("/tmp")),
    ];
    let dir_abs = dir
        .canonicalize()
        .or_else(|_| std::env::current_dir().map(|cwd| cwd.join(dir)))
        .unwrap_or_else(|_| dir.to_path_buf());

    for candidate in candidates.into_iter().flatten() {
        let candidate_abs = candidate.canonicalize().unwrap_or(candidate);
        if dir_abs.starts_with(&candidate_abs) {
            return Ok(());
        }
    }
    Err(Error::WalPathNotAllowed(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn wal_at(dir: &Path) -> Wal {
        Wal::new(dir.join(".wal").join("wal.log"), WalConfig::for_testing()).unwrap()
    }

    #[test]
    fn append_then_replay_preserves_order() {
        let dir = tempdir().unwrap();
        let wal = wal_at(dir.path());
        wal.append(WalEntry::write("/a", json!({"v": 1}), None)).unwrap();
        wal.append(WalEntry::write("/b", json!({"v": 2}), None)).unwrap();
        wal.append(WalEntry::delete("/c", None)).unwrap();

        let entries = wal.replay().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].key, "/a");
        assert_eq!(entries[1].key, "/b");
        assert_eq!(entries[2].op, WalOp::Delete);
    }

    #[test]
    fn clear_empties_wal() {
        let dir = tempdir().unwrap();
        let wal = wal_at(dir.path());
        wal.append(WalEntry::write("/a", json!(1), None)).unwrap();
        wal.clear().unwrap();
        assert!(!wal.exists());
        assert_eq!(wal.replay().unwrap(), vec![]);
    }

    #[test]
    fn malformed_tail_line_is_skipped() {
        let dir = tempdir().unwrap();
        let wal = wal_at(dir.path());
        wal.append(WalEntry::write("/a", json!(1), None)).unwrap();
        let mut file = OpenOptions::new().append(true).open(wal.path()).unwrap();
        write!(file, "{{not valid json\n").unwrap();

        let entries = wal.replay().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn rejects_path_outside_allowed_roots() {
        let result = Wal::new("/etc/checklist/.wal/wal.log", WalConfig::for_testing());
        assert!(result.is_err());
    }

    #[test]
    fn rate_limit_trips_after_threshold() {
        let dir = tempdir().unwrap();
        let wal = Wal::new(
            dir.path().join(".wal/wal.log"),
            WalConfig { max_writes_per_window: 2, window: Duration::from_millis(1000), rotate_max_size: 1024 },
        )
        .unwrap();
        wal.append(WalEntry::write("/a", json!(1), None)).unwrap();
        wal.append(WalEntry::write("/b", json!(1), None)).unwrap();
        let result = wal.append(WalEntry::write("/c", json!(1), None));
        assert!(result.is_err());
    }

    #[test]
    fn rotate_backs_up_and_clears_when_over_threshold() {
        let dir = tempdir().unwrap();
        let wal = wal_at(dir.path());
        wal.append(WalEntry::write("/a", json!({"pad": "x".repeat(200)}), None)).unwrap();
        let rotated = wal.rotate(10).unwrap();
        assert!(rotated);
        assert!(!wal.exists());
        let backups: Vec<_> = fs::read_dir(dir.path().join(".wal"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("backup"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn create_backup_on_missing_wal_is_a_no_op() {
        let dir = tempdir().unwrap();
        let wal = wal_at(dir.path());
        let path = wal.create_backup().unwrap();
        assert_eq!(path, wal.path());
    }
}
