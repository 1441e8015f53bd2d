//! Error types shared by every crate that touches the state document itself.

use thiserror::Error;

/// Result alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a persisted document was rejected.
///
/// Mirrors the three ways a state file stops being trustworthy: it never
/// parsed, it parsed but didn't match the schema, or it parsed and matched
/// the schema but its checksum doesn't cover its own bytes.
#[derive(Debug, Error)]
pub enum CorruptionKind {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("schema invalid: {}", .0.join("; "))]
    SchemaInvalid(Vec<String>),

    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("state corrupted: {0}")]
    StateCorrupted(#[from] CorruptionKind),

    #[error("unsupported schema version {version}; supported: {supported:?}")]
    UnsupportedSchemaVersion { version: String, supported: Vec<String> },

    #[error("cannot migrate from {from} to {to}")]
    UnmigratableVersion { from: String, to: String },
}
