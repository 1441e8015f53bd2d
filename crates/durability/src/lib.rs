//! Durability primitives: write-ahead log, cross-process advisory lock, and
//! backup manager.
//!
//! Nothing in this crate knows what a "transaction" or a "state manager"
//! is — it persists bytes, serializes access to a named resource, and keeps
//! a rotating set of snapshots. The orchestration lives above it, in
//! `cs-transaction` and `cs-manager`.

pub mod backup;
pub mod error;
pub mod lock;
pub mod lockfile;
pub mod manifest;
pub mod pid;
pub mod wal;

pub use backup::BackupManager;
pub use error::{Error, Result};
pub use lock::{LockConfig, LockGuard, LockManager};
pub use lockfile::{LockConcurrency, LockFile, LockMetadata, LockOperation, LockTiming, WaitingProcess};
pub use manifest::{BackupEntry, BackupManifest, RotationPolicy};
pub use pid::is_process_alive;
pub use wal::{Wal, WalConfig, WalEntry, WalOp};
