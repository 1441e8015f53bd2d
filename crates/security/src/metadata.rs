//! Encryption metadata sidecar: `<base>/.encryption-metadata.json`.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionMetadata {
    pub version: u32,
    pub key_id: String,
    pub encrypted_fields: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rotated_at: Option<DateTime<Utc>>,
}

impl EncryptionMetadata {
    pub fn new(key_id: impl Into<String>) -> Self {
        EncryptionMetadata {
            version: 1,
            key_id: key_id.into(),
            encrypted_fields: Vec::new(),
            created_at: Utc::now(),
            rotated_at: None,
        }
    }

    pub fn load_or_default(path: impl AsRef<Path>, key_id: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let text = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(EncryptionMetadata::new(key_id))
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn record_rotation(&mut self, new_key_id: impl Into<String>) {
        self.key_id = new_key_id.into();
        self.rotated_at = Some(Utc::now());
    }

    pub fn set_encrypted_fields(&mut self, fields: Vec<String>) {
        self.encrypted_fields = fields;
    }
}
