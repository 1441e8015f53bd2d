//! Durable, crash-consistent single-document state store for checklist
//! workflows.
//!
//! This crate is a thin facade over the workspace: [`cs_manager`] wires
//! everything else (document model, WAL, locking, encryption, transaction
//! coordination, backups) into [`StateManager`], the type most callers need.
//! Reach into `cs_core`, `cs_durability`, `cs_security`, or `cs_transaction`
//! directly only for lower-level access — e.g. constructing a
//! [`MigrationHook`] for [`StateManager::with_migration_hook`].

pub use cs_manager::*;
