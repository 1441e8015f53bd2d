//! Data model, canonicalization, checksumming, and schema validation for the
//! checklist state document.
//!
//! This crate has no I/O of its own — it owns the document shape and the
//! pure functions over it (`canonicalize`, `calculate_checksum`,
//! `validate`). Everything that touches a filesystem, a lock, or a key lives
//! in a sibling crate.

pub mod canonical;
pub mod checksum;
pub mod error;
pub mod types;
pub mod validator;

pub use canonical::{canonical_json_string, canonical_yaml_string, canonicalize, without_field};
pub use checksum::{calculate_checksum, verify_checksum};
pub use error::{CorruptionKind, Error, Result};
pub use types::*;
pub use validator::{
    can_migrate, is_missing_schema_version, is_valid_schema_version, validate, validate_schema_only,
    validate_typed,
};

/// Schema versions this build of the engine can load directly (no
/// migration needed).
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1.0.0"];

/// The schema version newly initialized documents are stamped with.
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

/// A pluggable hook for value-level schema migrations.
///
/// This crate (and the manager built on top of it) only handles the
/// version-bump mechanics of a migration — rewriting `schemaVersion`,
/// recomputing the checksum, and persisting the result. Translating the
/// document's *values* between schema shapes is a separate concern; a host
/// application supplies one via this trait. [`IdentityMigration`] is the
/// default: it changes nothing but the version stamp.
pub trait MigrationHook: Send + Sync {
    fn migrate(&self, from: &str, to: &str, doc: &mut serde_json::Value) -> Result<()>;
}

/// No-op migration: bumps the version field only, changes no values.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityMigration;

impl MigrationHook for IdentityMigration {
    fn migrate(&self, _from: &str, _to: &str, _doc: &mut serde_json::Value) -> Result<()> {
        Ok(())
    }
}
