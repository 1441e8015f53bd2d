//! Error types for the transaction coordinator.

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cs-core error: {0}")]
    Core(#[from] cs_core::Error),

    #[error("cs-durability error: {0}")]
    Durability(#[from] cs_durability::Error),

    #[error("no such transaction {0}")]
    NotFound(Uuid),

    #[error("transaction {0} is not active")]
    NotActive(Uuid),

    #[error("transaction {tx_id} failed: {reason}")]
    Failed { tx_id: Uuid, reason: String },
}
