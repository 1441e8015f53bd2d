//! One pending mutation inside a transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Write,
    Delete,
    /// `saveState` addresses the whole document with path `/`.
    Save,
}

impl OperationType {
    /// The WAL only distinguishes write vs. delete; `Save` behaves like a
    /// write of the whole document.
    pub fn as_wal_op(self) -> cs_durability::WalOp {
        match self {
            OperationType::Delete => cs_durability::WalOp::Delete,
            OperationType::Write | OperationType::Save => cs_durability::WalOp::Write,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl Operation {
    pub fn new(op_type: OperationType, path: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Operation {
            id: Uuid::new_v4(),
            op_type,
            path: path.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}
