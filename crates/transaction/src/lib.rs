//! Transaction coordinator: orders validation, WAL append, apply, commit,
//! and WAL clear for one logical write against the state document, with
//! rollback on any failure in between.
//!
//! This crate owns the WAL integration (one [`cs_durability::Wal`] per
//! coordinator) and the transaction audit log; it does not know how to
//! persist the state document itself — that's [`StateDocument`] plus the
//! caller-supplied `apply` closure, which lives in `cs-manager`.

pub mod audit;
pub mod coordinator;
pub mod error;
pub mod operation;
pub mod transaction;

pub use audit::{AuditEvent, AuditEventType, TransactionAuditLog};
pub use coordinator::TransactionCoordinator;
pub use cs_core::StateDocument;
pub use cs_durability::{WalConfig, WalEntry, WalOp};
pub use error::{Error, Result};
pub use operation::{Operation, OperationType};
pub use transaction::{Transaction, TransactionStatus};
