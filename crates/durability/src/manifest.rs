//! Backup manifest: `<base>/backups/manifest.yaml`, newest-first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub checksum: String,
    pub size: u64,
    pub schema_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationPolicy {
    pub max_count: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_age_ms: Option<i64>,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        RotationPolicy { max_count: 3, max_age_ms: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub version: u32,
    #[serde(default)]
    pub backups: Vec<BackupEntry>,
    #[serde(default)]
    pub rotation_policy: RotationPolicy,
}

impl Default for BackupManifest {
    fn default() -> Self {
        BackupManifest { version: 1, backups: Vec::new(), rotation_policy: RotationPolicy::default() }
    }
}

impl BackupManifest {
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let text = fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&text)?)
        } else {
            Ok(BackupManifest::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Sort newest-first by `createdAt`.
    pub fn sort_newest_first(&mut self) {
        self.backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    pub fn push_and_sort(&mut self, entry: BackupEntry) {
        self.backups.push(entry);
        self.sort_newest_first();
    }
}
