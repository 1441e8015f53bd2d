//! The error taxonomy surfaced to callers of [`crate::StateManager`].
//!
//! Kind, not type, is what the spec asks for: `StateCorrupted`,
//! `LockAcquisition`, `Transaction`, `Backup`, `Recovery`, `StateError`.
//! Sub-crate errors wrap through `#[from]`; [`Error::corruption`] and
//! [`Error::is_recoverable_locally`] give callers (and `loadState`) a way
//! to dispatch on kind without matching every nested variant by hand.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

/// Policy/integrity violations the spec groups under `StateError{code}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateErrorCode {
    SecretsDetected,
    ValidationFailed,
    SchemaVersionMismatch,
    WriteFailed,
    NoState,
}

impl std::fmt::Display for StateErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StateErrorCode::SecretsDetected => "SECRETS_DETECTED",
            StateErrorCode::ValidationFailed => "VALIDATION_FAILED",
            StateErrorCode::SchemaVersionMismatch => "SCHEMA_VERSION_MISMATCH",
            StateErrorCode::WriteFailed => "WRITE_FAILED",
            StateErrorCode::NoState => "NO_STATE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cs-core error: {0}")]
    Core(#[from] cs_core::Error),

    #[error("cs-durability error: {0}")]
    Durability(#[from] cs_durability::Error),

    #[error("cs-security error: {0}")]
    Security(#[from] cs_security::Error),

    #[error("cs-transaction error: {0}")]
    Transaction(#[from] cs_transaction::Error),

    #[error("lock acquisition timed out after {0:?}")]
    LockAcquisition(Duration),

    #[error("transaction {tx_id} failed: {reason}")]
    TransactionFailed { tx_id: Uuid, reason: String },

    #[error("backup operation failed: {reason}")]
    Backup { reason: String },

    #[error("recovery failed, data loss: {data_loss}")]
    Recovery { data_loss: bool },

    #[error("state error [{code}]: {message}")]
    State { code: StateErrorCode, message: String },
}

impl Error {
    pub fn state(code: StateErrorCode, message: impl Into<String>) -> Self {
        Error::State { code, message: message.into() }
    }

    /// Extract the [`cs_core::CorruptionKind`] this error carries, if any —
    /// whether it arrived directly or via `cs-durability`'s own wrapping of
    /// `cs-core`.
    pub fn corruption(&self) -> Option<&cs_core::CorruptionKind> {
        match self {
            Error::Core(cs_core::Error::StateCorrupted(kind)) => Some(kind),
            Error::Durability(cs_durability::Error::Core(cs_core::Error::StateCorrupted(kind))) => Some(kind),
            _ => None,
        }
    }

    pub fn is_corrupted(&self) -> bool {
        self.corruption().is_some()
    }
}
