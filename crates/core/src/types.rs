//! The checklist state document and its nested value types.
//!
//! This is the single entity this whole system exists to persist durably.
//! See [`StateDocument`] for the root; everything else here hangs off it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Checksum value that marks a freshly-initialized document as unverified.
///
/// Verification is skipped for a document carrying this sentinel so that
/// `initializeState` can write a document before it has ever computed a
/// "real" checksum over itself.
pub const ZERO_SENTINEL_CHECKSUM: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

/// Field name excluded from the canonicalized document before checksumming.
pub const CHECKSUM_FIELD: &str = "checksum";

/// The root persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    /// Empty when the source document omitted `schemaVersion` entirely —
    /// see [`crate::validator::is_missing_schema_version`].
    #[serde(default)]
    pub schema_version: String,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub active_instance: Option<ActiveInstance>,
    #[serde(default)]
    pub completed_steps: Vec<CompletedStep>,
    #[serde(default)]
    pub recovery: RecoveryInfo,
    #[serde(default)]
    pub conflicts: ConflictInfo,
}

impl StateDocument {
    /// A fresh document: no active instance, no steps, no recovery history,
    /// checksum disabled via the zero sentinel.
    pub fn bootstrap(schema_version: impl Into<String>) -> Self {
        StateDocument {
            schema_version: schema_version.into(),
            checksum: ZERO_SENTINEL_CHECKSUM.to_string(),
            active_instance: None,
            completed_steps: Vec::new(),
            recovery: RecoveryInfo::default(),
            conflicts: ConflictInfo::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveInstance {
    pub id: Uuid,
    pub template_id: String,
    pub template_version: String,
    pub project_path: String,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_step_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepResult {
    Success,
    Failure,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exit_code: Option<i32>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedStep {
    pub step_id: String,
    pub completed_at: DateTime<Utc>,
    pub execution_time: u64,
    pub result: StepResult,
    #[serde(default)]
    pub command_results: Vec<CommandResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionType {
    ChecksumMismatch,
    SchemaInvalid,
    ParseError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMethod {
    Backup,
    Reset,
    Manual,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_corruption: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub corruption_type: Option<CorruptionType>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recovery_method: Option<RecoveryMethod>,
    #[serde(default)]
    pub data_loss: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_wal_recovery: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recovered_operations: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    Local,
    Remote,
    Merge,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolution: Option<ConflictResolution>,
}
