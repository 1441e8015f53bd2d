//! Cross-process advisory file lock with stale detection and heartbeat
//! renewal.
//!
//! One named lock lives at `<base>/.locks/<name>.lock`. Acquisition uses
//! `O_CREAT|O_EXCL` (via [`std::fs::OpenOptions::create_new`]) as the
//! atomic primitive, with a read-back check as a hedge against filesystems
//! where that create isn't perfectly atomic (the spec calls this out
//! explicitly for non-POSIX targets).

use chrono::{Duration as ChronoDuration, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lockfile::LockFile;
use crate::pid::is_process_alive;

#[derive(Debug, Clone)]
pub struct LockConfig {
    pub acquire_timeout: Duration,
    pub retry_interval: Duration,
    pub lock_expiry: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            acquire_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(100),
            lock_expiry: Duration::from_secs(30),
        }
    }
}

impl LockConfig {
    pub fn for_testing() -> Self {
        LockConfig {
            acquire_timeout: Duration::from_millis(500),
            retry_interval: Duration::from_millis(10),
            lock_expiry: Duration::from_millis(200),
        }
    }

    fn heartbeat_interval(&self) -> Duration {
        self.lock_expiry / 3
    }
}

/// A held lock. Dropping it releases the lock and stops the heartbeat
/// thread — this is the "release on all exit paths" mechanism the spec
/// asks for; `?` early-returns through a scope still run the `Drop` impl.
pub struct LockGuard {
    manager: LockManager,
    name: String,
    lock_id: uuid::Uuid,
    stop_heartbeat: Arc<AtomicBool>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.stop_heartbeat.store(true, Ordering::SeqCst);
        if let Some(handle) = self.heartbeat.take() {
            let _ = handle.join();
        }
        if let Err(e) = self.manager.release(&self.name, self.lock_id) {
            warn!(lock = %self.name, error = %e, "best-effort lock release failed");
        }
    }
}

/// Manages advisory locks under one `.locks/` directory.
#[derive(Clone)]
pub struct LockManager {
    locks_dir: PathBuf,
    config: LockConfig,
}

impl LockManager {
    pub fn new(locks_dir: impl Into<PathBuf>, config: LockConfig) -> Self {
        LockManager { locks_dir: locks_dir.into(), config }
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir.join(format!("{name}.lock"))
    }

    /// Acquire the named lock, retrying until `timeout` elapses.
    pub fn acquire(&self, name: &str, timeout: Duration, op_type: &str) -> Result<LockGuard> {
        fs::create_dir_all(&self.locks_dir)?;
        let deadline = Instant::now() + timeout;
        let path = self.lock_path(name);
        let expiry = ChronoDuration::from_std(self.config.lock_expiry).unwrap_or_default();

        loop {
            if Instant::now() >= deadline {
                return Err(Error::LockTimeout(timeout));
            }

            if !path.exists() {
                let candidate = LockFile::new(op_type, expiry);
                if self.try_create(&path, &candidate)? {
                    if self.confirm_ownership(&path, candidate.lock_id)? {
                        return Ok(self.start_heartbeat(name, candidate.lock_id));
                    }
                    // Someone else's write raced ours onto the same path.
                    std::thread::sleep(self.config.retry_interval);
                    continue;
                }
                // create_new lost the race; fall through to read the
                // winner's lock file on the next loop iteration.
                continue;
            }

            match self.read_lock(&path) {
                Ok(mut existing) => {
                    if self.is_stale(&existing) {
                        debug!(lock = %name, pid = existing.metadata.pid, "reclaiming stale lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    existing.add_waiter(std::process::id());
                    let _ = self.write_lock(&path, &existing);
                    std::thread::sleep(self.config.retry_interval);
                }
                Err(_) => {
                    // Unreadable/corrupt lock file: treat like it doesn't
                    // exist yet and try to reclaim it.
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    pub fn with_lock<T>(&self, name: &str, op_type: &str, timeout: Duration, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.acquire(name, timeout, op_type)?;
        f()
    }

    fn try_create(&self, path: &Path, lock: &LockFile) -> Result<bool> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let yaml = serde_yaml::to_string(lock)?;
                file.write_all(yaml.as_bytes())?;
                file.sync_data()?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn confirm_ownership(&self, path: &Path, our_id: uuid::Uuid) -> Result<bool> {
        match self.read_lock(path) {
            Ok(persisted) => Ok(persisted.lock_id == our_id),
            Err(_) => Ok(false),
        }
    }

    fn read_lock(&self, path: &Path) -> Result<LockFile> {
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    fn write_lock(&self, path: &Path, lock: &LockFile) -> Result<()> {
        let yaml = serde_yaml::to_string(lock)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    fn is_stale(&self, lock: &LockFile) -> bool {
        let now = Utc::now();
        if lock.is_expired(now) {
            return true;
        }
        let ours = lock.metadata.pid == std::process::id();
        !ours && !is_process_alive(lock.metadata.pid)
    }

    fn start_heartbeat(&self, name: &str, lock_id: uuid::Uuid) -> LockGuard {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let path = self.lock_path(name);
        let interval = self.config.heartbeat_interval();
        let expiry = ChronoDuration::from_std(self.config.lock_expiry).unwrap_or_default();
        let manager = self.clone();

        let handle = std::thread::spawn(move || {
            while !stop_clone.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                if stop_clone.load(Ordering::SeqCst) {
                    break;
                }
                if let Ok(mut lock) = manager.read_lock(&path) {
                    if lock.lock_id == lock_id {
                        lock.renew(expiry);
                        let _ = manager.write_lock(&path, &lock);
                    }
                }
            }
        });

        LockGuard {
            manager: self.clone(),
            name: name.to_string(),
            lock_id,
            stop_heartbeat: stop,
            heartbeat: Some(handle),
        }
    }

    /// Delete the lock file if (and only if) we own it. Releasing a lock we
    /// don't own is a no-op, not an error.
    fn release(&self, name: &str, lock_id: uuid::Uuid) -> Result<()> {
        let path = self.lock_path(name);
        match self.read_lock(&path) {
            Ok(lock) if lock.lock_id == lock_id => {
                fs::remove_file(&path)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_then_release_removes_lock_file() {
        let dir = tempdir().unwrap();
        let manager = LockManager::new(dir.path(), LockConfig::for_testing());
        let path = dir.path().join("state.lock");
        {
            let _guard = manager.acquire("state", Duration::from_secs(1), "save").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn second_acquirer_times_out_while_first_holds() {
        let dir = tempdir().unwrap();
        let manager = LockManager::new(dir.path(), LockConfig::for_testing());
        let _first = manager.acquire("state", Duration::from_secs(2), "save").unwrap();

        let second = manager.acquire("state", Duration::from_millis(150), "save");
        assert!(matches!(second, Err(Error::LockTimeout(_))));
    }

    #[test]
    fn stale_lock_with_dead_pid_is_reclaimed() {
        let dir = tempdir().unwrap();
        let manager = LockManager::new(dir.path(), LockConfig::for_testing());
        fs::create_dir_all(dir.path()).unwrap();

        let mut stale = LockFile::new("save", ChronoDuration::seconds(300));
        stale.metadata.pid = u32::MAX - 2; // implausible pid, not alive
        let path = dir.path().join("state.lock");
        fs::write(&path, serde_yaml::to_string(&stale).unwrap()).unwrap();

        let guard = manager.acquire("state", Duration::from_secs(1), "save").unwrap();
        drop(guard);
    }

    #[test]
    fn expired_lock_is_reclaimed_even_if_pid_alive() {
        let dir = tempdir().unwrap();
        let manager = LockManager::new(dir.path(), LockConfig::for_testing());

        let mut stale = LockFile::new("save", ChronoDuration::milliseconds(-1));
        stale.metadata.pid = std::process::id();
        let path = dir.path().join("state.lock");
        fs::write(&path, serde_yaml::to_string(&stale).unwrap()).unwrap();

        let guard = manager.acquire("state", Duration::from_secs(1), "save").unwrap();
        drop(guard);
    }

    #[test]
    fn with_lock_releases_after_closure_errors() {
        let dir = tempdir().unwrap();
        let manager = LockManager::new(dir.path(), LockConfig::for_testing());
        let path = dir.path().join("state.lock");

        let result: Result<()> = manager.with_lock("state", "save", Duration::from_secs(1), || {
            Err(Error::Backup { reason: "boom".to_string() })
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn release_of_unowned_lock_is_a_no_op() {
        let dir = tempdir().unwrap();
        let manager = LockManager::new(dir.path(), LockConfig::for_testing());
        let path = dir.path().join("state.lock");
        let foreign = LockFile::new("save", ChronoDuration::seconds(30));
        fs::write(&path, serde_yaml::to_string(&foreign).unwrap()).unwrap();

        manager.release("state", uuid::Uuid::new_v4()).unwrap();
        assert!(path.exists());
    }
}
