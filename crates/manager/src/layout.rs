//! On-disk directory layout under a configurable base (default
//! `.checklist/`): owns path computation, directory creation with 0755
//! permissions, and `cleanup()`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DEFAULT_BASE_DIR: &str = ".checklist";

#[derive(Debug, Clone)]
pub struct DirectoryLayout {
    base: PathBuf,
}

impl DirectoryLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        DirectoryLayout { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn state_file(&self) -> PathBuf {
        self.base.join("state.yaml")
    }

    pub fn state_tmp_file(&self) -> PathBuf {
        self.base.join("state.yaml.tmp")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.base.join("backups")
    }

    pub fn backup_manifest(&self) -> PathBuf {
        self.backups_dir().join("manifest.yaml")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.base.join(".locks")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base.join(".cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base.join("logs")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir().join("audit.log")
    }

    pub fn security_audit_log(&self) -> PathBuf {
        self.base.join("security-audit.log")
    }

    pub fn wal_dir(&self) -> PathBuf {
        self.base.join(".wal")
    }

    pub fn wal_file(&self) -> PathBuf {
        self.wal_dir().join("wal.log")
    }

    pub fn encryption_key_file(&self) -> PathBuf {
        self.base.join(".encryption-key")
    }

    pub fn encryption_metadata_file(&self) -> PathBuf {
        self.base.join(".encryption-metadata.json")
    }

    /// Create every directory in the layout with 0755 permissions.
    pub fn create(&self) -> Result<()> {
        for dir in [
            self.base.clone(),
            self.backups_dir(),
            self.locks_dir(),
            self.cache_dir(),
            self.logs_dir(),
            self.wal_dir(),
        ] {
            fs::create_dir_all(&dir)?;
            set_mode_0755(&dir)?;
        }
        Ok(())
    }

    /// Purge files under `.cache/`, `.locks/`, `logs/`, `backups/` but keep
    /// the directories themselves.
    pub fn cleanup(&self) -> Result<()> {
        for dir in [self.cache_dir(), self.locks_dir(), self.logs_dir(), self.backups_dir()] {
            if !dir.exists() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    fs::remove_dir_all(path)?;
                } else {
                    fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode_0755(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(dir)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(dir, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode_0755(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_makes_every_directory() {
        let dir = tempdir().unwrap();
        let layout = DirectoryLayout::new(dir.path().join(".checklist"));
        layout.create().unwrap();

        assert!(layout.backups_dir().is_dir());
        assert!(layout.locks_dir().is_dir());
        assert!(layout.cache_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
        assert!(layout.wal_dir().is_dir());
    }

    #[test]
    fn cleanup_purges_files_but_keeps_directories() {
        let dir = tempdir().unwrap();
        let layout = DirectoryLayout::new(dir.path().join(".checklist"));
        layout.create().unwrap();
        fs::write(layout.cache_dir().join("x"), "y").unwrap();
        fs::write(layout.backups_dir().join("state.yaml.123"), "y").unwrap();

        layout.cleanup().unwrap();

        assert!(layout.cache_dir().is_dir());
        assert!(layout.backups_dir().is_dir());
        assert_eq!(fs::read_dir(layout.cache_dir()).unwrap().count(), 0);
        assert_eq!(fs::read_dir(layout.backups_dir()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn directories_are_0755() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let layout = DirectoryLayout::new(dir.path().join(".checklist"));
        layout.create().unwrap();
        let mode = fs::metadata(layout.base()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }
}
