//! State manager: the crate most callers depend on directly.
//!
//! Wires [`cs_core`]'s document model, [`cs_durability`]'s WAL/lock/backup
//! primitives, [`cs_security`]'s encryption and secrets detection, and
//! [`cs_transaction`]'s commit/rollback coordinator into one
//! [`StateManager`] exposing `initializeState` / `loadState` / `saveState`
//! and the rest of the top-level operations.

pub mod config;
pub mod error;
pub mod layout;
pub mod manager;
mod pointer;

pub use config::ManagerConfig;
pub use cs_core::{IdentityMigration, MigrationHook, StateDocument};
pub use error::{Error, Result, StateErrorCode};
pub use layout::DirectoryLayout;
pub use manager::StateManager;
