//! An in-memory transaction: a snapshot of pre-transaction state plus the
//! operations accumulated against it. Never persisted as a whole — only its
//! operations reach disk, via the WAL, one [`Operation`] at a time.

use chrono::{DateTime, Utc};
use cs_core::StateDocument;
use uuid::Uuid;

use crate::operation::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
}

pub struct Transaction {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub operations: Vec<Operation>,
    /// Deep copy of the state as it stood at `begin`. Never a reference to
    /// the live state — rollback hands this back to the caller verbatim.
    pub snapshot: StateDocument,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn begin(snapshot: StateDocument) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            operations: Vec::new(),
            snapshot,
            status: TransactionStatus::Active,
        }
    }
}
