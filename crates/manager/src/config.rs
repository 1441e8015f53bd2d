//! Configuration for one [`crate::StateManager`] instance: directory,
//! lock timing, WAL rate limit, and backup rotation, each with spec
//! defaults and a `for_testing()` override (teacher convention: shortened
//! timers, raised WAL rate limit — the spec's "test-mode indicator").

use std::path::PathBuf;
use std::time::Duration;

use cs_durability::{LockConfig, RotationPolicy, WalConfig};

use crate::layout::DEFAULT_BASE_DIR;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub base_dir: PathBuf,
    pub lock: LockConfig,
    pub wal: WalConfig,
    pub backup: RotationPolicy,
    /// Timeout used specifically by `loadState` (spec: 10s, vs. 5s default
    /// elsewhere).
    pub load_lock_timeout: Duration,
    /// Timeout used by every other lock-guarded operation.
    pub default_lock_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            lock: LockConfig::default(),
            wal: WalConfig::default(),
            backup: RotationPolicy::default(),
            load_lock_timeout: Duration::from_secs(10),
            default_lock_timeout: Duration::from_secs(5),
        }
    }
}

impl ManagerConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        ManagerConfig { base_dir: base_dir.into(), ..Default::default() }
    }

    /// Shortened timers and a raised WAL rate limit, for fast tests that
    /// exercise lock contention and retry paths without real-world delays.
    pub fn for_testing(base_dir: impl Into<PathBuf>) -> Self {
        ManagerConfig {
            base_dir: base_dir.into(),
            lock: LockConfig::for_testing(),
            wal: WalConfig::for_testing(),
            backup: RotationPolicy::default(),
            load_lock_timeout: Duration::from_millis(750),
            default_lock_timeout: Duration::from_millis(500),
        }
    }
}
