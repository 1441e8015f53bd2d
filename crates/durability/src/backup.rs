//! Backup manager: manifest-driven snapshot rotation and multi-candidate
//! recovery.

use chrono::Utc;
use cs_core::StateDocument;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::manifest::{BackupEntry, BackupManifest, RotationPolicy};

pub struct BackupManager {
    backups_dir: PathBuf,
    manifest_path: PathBuf,
    policy: RotationPolicy,
}

impl BackupManager {
    pub fn new(backups_dir: impl Into<PathBuf>, policy: RotationPolicy) -> Self {
        let backups_dir = backups_dir.into();
        let manifest_path = backups_dir.join("manifest.yaml");
        BackupManager { backups_dir, manifest_path, policy }
    }

    fn load_manifest(&self) -> Result<BackupManifest> {
        BackupManifest::load_or_default(&self.manifest_path)
    }

    fn save_manifest(&self, manifest: &BackupManifest) -> Result<()> {
        manifest.save(&self.manifest_path)
    }

    /// Serialize `state` to a new timestamped snapshot, append a manifest
    /// entry, then rotate away anything past `maxCount`.
    pub fn create_backup(&self, state: &StateDocument) -> Result<PathBuf> {
        fs::create_dir_all(&self.backups_dir)?;

        let value = serde_json::to_value(state)?;
        let yaml = cs_core::canonical_yaml_string(&value)?;

        let ms = Utc::now().timestamp_millis();
        let filename = format!("state.yaml.{ms}");
        let path = self.backups_dir.join(&filename);
        fs::write(&path, &yaml)?;
        let size = yaml.len() as u64;

        let mut manifest = self.load_manifest()?;
        manifest.rotation_policy = self.policy.clone();
        manifest.push_and_sort(BackupEntry {
            filename: filename.clone(),
            created_at: Utc::now(),
            checksum: state.checksum.clone(),
            size,
            schema_version: state.schema_version.clone(),
        });
        self.save_manifest(&manifest)?;
        self.rotate(&mut manifest)?;

        Ok(path)
    }

    fn rotate(&self, manifest: &mut BackupManifest) -> Result<()> {
        let max = self.policy.max_count as usize;
        if manifest.backups.len() <= max {
            return Ok(());
        }
        let to_remove: Vec<BackupEntry> = manifest.backups.split_off(max);
        for entry in &to_remove {
            let path = self.backups_dir.join(&entry.filename);
            let _ = fs::remove_file(path);
        }
        self.save_manifest(manifest)
    }

    /// Try every backup newest-first; return the first that parses and
    /// validates.
    pub fn recover_from_latest_backup(&self) -> Result<StateDocument> {
        let manifest = self.load_manifest()?;
        for entry in &manifest.backups {
            if let Ok(doc) = self.recover_from_backup(&entry.filename) {
                return Ok(doc);
            }
        }
        Err(Error::Recovery { data_loss: true })
    }

    /// Parse and validate a specific backup file.
    pub fn recover_from_backup(&self, filename: &str) -> Result<StateDocument> {
        let path = self.backups_dir.join(filename);
        let text = fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_yaml::from_str(&text)?;
        cs_core::validate(&value).map_err(|_| Error::Recovery { data_loss: false })
    }

    /// Delete manifest entries (and their files) older than `max_age`,
    /// returning how many were removed.
    pub fn cleanup_old_backups(&self, max_age: Duration) -> Result<usize> {
        let mut manifest = self.load_manifest()?;
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default();
        let (keep, remove): (Vec<_>, Vec<_>) =
            manifest.backups.drain(..).partition(|e| e.created_at >= cutoff);
        manifest.backups = keep;
        for entry in &remove {
            let _ = fs::remove_file(self.backups_dir.join(&entry.filename));
        }
        self.save_manifest(&manifest)?;
        Ok(remove.len())
    }

    pub fn verify_backup(&self, filename: &str) -> bool {
        self.recover_from_backup(filename).is_ok()
    }

    pub fn verify_all_backups(&self) -> Result<HashMap<String, bool>> {
        let manifest = self.load_manifest()?;
        let mut result = HashMap::new();
        for entry in &manifest.backups {
            result.insert(entry.filename.clone(), self.verify_backup(&entry.filename));
        }
        Ok(result)
    }

    pub fn manifest(&self) -> Result<BackupManifest> {
        self.load_manifest()
    }
}
