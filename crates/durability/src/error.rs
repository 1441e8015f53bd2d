//! Error types for the durability crate (WAL, lock manager, backup manager).

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("WAL directory {0} must live under the process working directory or a temp directory")]
    WalPathNotAllowed(PathBuf),

    #[error("WAL write rate limit exceeded: {writes} writes in the last {window_ms}ms")]
    WalRateLimited { writes: u32, window_ms: u64 },

    #[error("WAL replay already in progress")]
    WalReplayReentrant,

    #[error("lock acquisition timed out after {0:?}")]
    LockTimeout(std::time::Duration),

    #[error("backup {reason}")]
    Backup { reason: String },

    #[error("recovery failed, data loss: {data_loss}")]
    Recovery { data_loss: bool },

    #[error("cs-core error: {0}")]
    Core(#[from] cs_core::Error),
}
