//! Error types for the security crate (encryption, key management, secrets
//! policy).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("encryption key not initialized")]
    KeyNotInitialized,

    #[error("key file at {0} is malformed")]
    MalformedKeyFile(std::path::PathBuf),

    #[error("AEAD encryption failed")]
    EncryptionFailed,

    #[error("AEAD decryption failed (wrong key, tampered data, or corrupt envelope)")]
    DecryptionFailed,

    #[error("refusing to persist state: secrets detected ({count} match(es))")]
    SecretsDetected { count: usize },
}
