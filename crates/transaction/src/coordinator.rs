//! Transaction coordinator: owns the in-memory transaction table and one
//! embedded [`cs_durability::Wal`]. Orders validation → WAL append → apply →
//! commit → WAL clear, with rollback on any failure along the way.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use cs_core::StateDocument;
use cs_durability::{Wal, WalConfig, WalEntry};
use parking_lot::Mutex;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::audit::{AuditEventType, TransactionAuditLog};
use crate::error::{Error, Result};
use crate::operation::{Operation, OperationType};
use crate::transaction::{Transaction, TransactionStatus};

pub struct TransactionCoordinator {
    transactions: Mutex<HashMap<Uuid, Transaction>>,
    wal: Wal,
    audit: TransactionAuditLog,
    recovering: AtomicBool,
}

impl TransactionCoordinator {
    pub fn new(wal_path: impl Into<PathBuf>, wal_config: WalConfig, audit_log_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(TransactionCoordinator {
            transactions: Mutex::new(HashMap::new()),
            wal: Wal::new(wal_path, wal_config)?,
            audit: TransactionAuditLog::new(audit_log_path),
            recovering: AtomicBool::new(false),
        })
    }

    /// Deep-copy `current` as the transaction's snapshot and return a fresh
    /// transaction id.
    pub fn begin(&self, current: &StateDocument) -> Result<Uuid> {
        let tx = Transaction::begin(current.clone());
        let id = tx.id;
        self.transactions.lock().insert(id, tx);
        self.audit.record(AuditEventType::Begin, Some(id), "transaction begun", None)?;
        Ok(id)
    }

    /// Append a WAL entry for `(type, path, data)` durably, then record the
    /// operation against the transaction. The WAL write happens first so a
    /// crash between the two still leaves a recoverable record.
    pub fn add_operation(
        &self,
        tx_id: Uuid,
        op_type: OperationType,
        path: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Result<()> {
        let path = path.into();
        self.require_active(tx_id)?;

        let op = Operation::new(op_type, path.clone(), data.clone());
        let entry = match op_type.as_wal_op() {
            cs_durability::WalOp::Delete => WalEntry::delete(path, Some(tx_id.to_string())),
            cs_durability::WalOp::Write => {
                WalEntry::write(path, data.unwrap_or(serde_json::Value::Null), Some(tx_id.to_string()))
            }
        };
        self.wal.append(entry)?;

        let mut table = self.transactions.lock();
        let tx = table.get_mut(&tx_id).ok_or(Error::NotFound(tx_id))?;
        tx.operations.push(op);
        drop(table);

        self.audit.record(AuditEventType::Operation, Some(tx_id), "operation added", None)?;
        Ok(())
    }

    /// Run the caller's validator over the transaction's accumulated
    /// operations. A `false` result or a validator panic-equivalent (an
    /// `Err`) is logged and reported as `false`; it does not end the
    /// transaction.
    pub fn validate(&self, tx_id: Uuid, validator: impl FnOnce(&[Operation]) -> Result<bool>) -> Result<bool> {
        let table = self.transactions.lock();
        let tx = table.get(&tx_id).ok_or(Error::NotFound(tx_id))?;
        let ops = tx.operations.clone();
        drop(table);

        match validator(&ops) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.audit.record(AuditEventType::ValidationFailed, Some(tx_id), "validation returned false", None)?;
                Ok(false)
            }
            Err(e) => {
                self.audit.record(
                    AuditEventType::ValidationError,
                    Some(tx_id),
                    "validator raised an error",
                    Some(json!({"error": e.to_string()})),
                )?;
                Ok(false)
            }
        }
    }

    /// Apply the transaction's operations via the caller-supplied `apply`,
    /// commit on success (clearing the WAL), or roll back and surface the
    /// failure.
    pub fn commit(
        &self,
        tx_id: Uuid,
        apply: impl FnOnce(&[Operation]) -> Result<StateDocument>,
    ) -> Result<StateDocument> {
        self.require_active(tx_id)?;
        let started = Instant::now();
        let ops = {
            let table = self.transactions.lock();
            table.get(&tx_id).ok_or(Error::NotFound(tx_id))?.operations.clone()
        };

        match apply(&ops) {
            Ok(new_state) => {
                {
                    let mut table = self.transactions.lock();
                    if let Some(tx) = table.get_mut(&tx_id) {
                        tx.status = TransactionStatus::Committed;
                    }
                    table.remove(&tx_id);
                }
                self.wal.clear()?;
                self.audit.record(
                    AuditEventType::Commit,
                    Some(tx_id),
                    "transaction committed",
                    Some(json!({
                        "operationCount": ops.len(),
                        "durationMs": started.elapsed().as_millis() as u64,
                    })),
                )?;
                Ok(new_state)
            }
            Err(e) => {
                let reason = e.to_string();
                let _ = self.rollback(tx_id);
                Err(Error::Failed { tx_id, reason })
            }
        }
    }

    /// Mark rolled-back, return the pre-transaction snapshot. Does not
    /// touch the WAL — a crash-interrupted transaction's WAL entries must
    /// survive for the next start's recovery pass.
    pub fn rollback(&self, tx_id: Uuid) -> Result<StateDocument> {
        let mut table = self.transactions.lock();
        let mut tx = table.remove(&tx_id).ok_or(Error::NotFound(tx_id))?;
        tx.status = TransactionStatus::RolledBack;
        let snapshot = tx.snapshot.clone();
        drop(table);
        self.audit.record(AuditEventType::Rollback, Some(tx_id), "transaction rolled back", None)?;
        Ok(snapshot)
    }

    /// Roll back every still-active transaction and forget them all.
    pub fn cleanup(&self) -> Result<()> {
        let ids: Vec<Uuid> = self.transactions.lock().keys().copied().collect();
        for id in ids {
            let _ = self.rollback(id);
        }
        Ok(())
    }

    /// Replay the WAL into `apply`, one entry at a time, in append order.
    /// Single-flight: a concurrent call short-circuits to `Ok(0)` rather
    /// than racing this one.
    pub fn recover_from_wal(&self, mut apply: impl FnMut(&WalEntry) -> Result<()>) -> Result<usize> {
        if self
            .recovering
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(0);
        }
        let result = self.recover_from_wal_inner(&mut apply);
        self.recovering.store(false, Ordering::SeqCst);
        result
    }

    fn recover_from_wal_inner(&self, apply: &mut impl FnMut(&WalEntry) -> Result<()>) -> Result<usize> {
        if !self.wal.exists() {
            return Ok(0);
        }
        self.wal.create_backup()?;
        let entries = self.wal.replay()?;
        let total = entries.len();
        let mut applied = 0usize;
        for entry in &entries {
            match apply(entry) {
                Ok(()) => applied += 1,
                Err(e) => warn!(key = %entry.key, error = %e, "WAL entry failed to apply during recovery"),
            }
        }

        let all_ok = applied == total;
        if all_ok {
            self.wal.clear()?;
        }

        self.audit.record(
            AuditEventType::Recovery,
            None,
            "WAL recovery attempted",
            Some(json!({"total": total, "applied": applied, "walCleared": all_ok})),
        )?;
        Ok(applied)
    }

    pub fn has_incomplete_transactions(&self) -> bool {
        self.wal.exists()
    }

    pub fn wal_size(&self) -> u64 {
        self.wal.size()
    }

    pub fn rotate_wal(&self, max_size: u64) -> Result<bool> {
        Ok(self.wal.rotate(max_size)?)
    }

    pub fn wal(&self) -> &Wal {
        &self.wal
    }

    fn require_active(&self, tx_id: Uuid) -> Result<()> {
        let table = self.transactions.lock();
        match table.get(&tx_id) {
            Some(tx) if tx.status == TransactionStatus::Active => Ok(()),
            Some(_) => Err(Error::NotActive(tx_id)),
            None => Err(Error::NotFound(tx_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_core::StateDocument;
    use serde_json::json;
    use tempfile::tempdir;

    fn coordinator(dir: &std::path::Path) -> TransactionCoordinator {
        TransactionCoordinator::new(
            dir.join(".wal/wal.log"),
            WalConfig::for_testing(),
            dir.join("logs/audit.log"),
        )
        .unwrap()
    }

    #[test]
    fn begin_add_commit_happy_path() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path());
        let state = StateDocument::bootstrap("1.0.0");

        let tx_id = coord.begin(&state).unwrap();
        coord.add_operation(tx_id, OperationType::Write, "/a", Some(json!({"v": 1}))).unwrap();
        assert!(coord.validate(tx_id, |_ops| Ok(true)).unwrap());

        let result = coord.commit(tx_id, |ops| {
            assert_eq!(ops.len(), 1);
            let mut new_state = state.clone();
            new_state.schema_version = "1.0.1".to_string();
            Ok(new_state)
        });
        assert!(result.is_ok());
        assert!(!coord.wal().exists());
    }

    #[test]
    fn validate_false_does_not_end_transaction() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path());
        let state = StateDocument::bootstrap("1.0.0");
        let tx_id = coord.begin(&state).unwrap();

        assert!(!coord.validate(tx_id, |_ops| Ok(false)).unwrap());
        // Still active: a second validate call succeeds rather than NotFound.
        assert!(coord.validate(tx_id, |_ops| Ok(true)).unwrap());
    }

    #[test]
    fn apply_failure_rolls_back_and_surfaces_transaction_error() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path());
        let state = StateDocument::bootstrap("1.0.0");
        let tx_id = coord.begin(&state).unwrap();
        coord.add_operation(tx_id, OperationType::Write, "/a", Some(json!(1))).unwrap();

        let result = coord.commit(tx_id, |_ops| Err(Error::NotFound(Uuid::new_v4())));
        assert!(matches!(result, Err(Error::Failed { .. })));
        // Rolled back: re-committing the same id now fails with NotFound.
        assert!(matches!(coord.commit(tx_id, |_| unreachable!()), Err(Error::NotFound(_))));
    }

    #[test]
    fn rollback_returns_pre_transaction_snapshot_without_clearing_wal() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path());
        let mut state = StateDocument::bootstrap("1.0.0");
        state.schema_version = "1.0.0".to_string();
        let tx_id = coord.begin(&state).unwrap();
        coord.add_operation(tx_id, OperationType::Write, "/a", Some(json!(1))).unwrap();

        let restored = coord.rollback(tx_id).unwrap();
        assert_eq!(restored.schema_version, "1.0.0");
        assert!(coord.wal().exists());
    }

    #[test]
    fn recover_from_wal_delivers_entries_in_order_and_clears_on_full_success() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path());
        let state = StateDocument::bootstrap("1.0.0");
        let tx_id = coord.begin(&state).unwrap();
        coord.add_operation(tx_id, OperationType::Write, "/a", Some(json!({"v": 1}))).unwrap();
        coord.add_operation(tx_id, OperationType::Write, "/b", Some(json!({"v": 2}))).unwrap();
        coord.add_operation(tx_id, OperationType::Delete, "/c", None).unwrap();
        // Crash before commit: drop without committing.
        drop(coord);

        let coord2 = coordinator(dir.path());
        let mut seen = Vec::new();
        let applied = coord2
            .recover_from_wal(|entry| {
                seen.push(entry.key.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(applied, 3);
        assert_eq!(seen, vec!["/a", "/b", "/c"]);
        assert!(!coord2.wal().exists());
    }

    #[test]
    fn recover_from_wal_leaves_wal_when_any_apply_fails() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path());
        let state = StateDocument::bootstrap("1.0.0");
        let tx_id = coord.begin(&state).unwrap();
        coord.add_operation(tx_id, OperationType::Write, "/a", Some(json!(1))).unwrap();
        coord.add_operation(tx_id, OperationType::Write, "/b", Some(json!(2))).unwrap();
        drop(coord);

        let coord2 = coordinator(dir.path());
        let mut count = 0;
        let applied = coord2
            .recover_from_wal(|_entry| {
                count += 1;
                if count == 2 {
                    Err(Error::NotFound(Uuid::new_v4()))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        assert_eq!(applied, 1);
        assert!(coord2.wal().exists());
    }

    #[test]
    fn missing_wal_recovers_to_zero() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path());
        assert_eq!(coord.recover_from_wal(|_| Ok(())).unwrap(), 0);
    }

    #[test]
    fn cleanup_rolls_back_all_active_transactions() {
        let dir = tempdir().unwrap();
        let coord = coordinator(dir.path());
        let state = StateDocument::bootstrap("1.0.0");
        let a = coord.begin(&state).unwrap();
        let b = coord.begin(&state).unwrap();

        coord.cleanup().unwrap();

        assert!(matches!(coord.rollback(a), Err(Error::NotFound(_))));
        assert!(matches!(coord.rollback(b), Err(Error::NotFound(_))));
    }
}
