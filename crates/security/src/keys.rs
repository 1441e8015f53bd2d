//! Encryption key file: a base64-encoded 256-bit key at `<base>/.encryption-key`,
//! chmod 0400.
//!
//! The key is process-global in the sense that one [`KeyHandle`] should be
//! constructed once per base directory and shared (the manager crate owns
//! that lifetime) — but it is an explicit, passed-around handle rather than
//! a hidden static, so tests can run several independent instances in one
//! process without racing each other's keys.

use crate::error::{Error, Result};
use base64::Engine;
use rand::RngCore;
use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::{generate_key, KEY_LEN};

/// An in-memory handle to the current encryption key plus the path it was
/// loaded from (or will be written to).
#[derive(Clone)]
pub struct KeyHandle {
    key: [u8; KEY_LEN],
    path: PathBuf,
}

/// First four bytes of the key, as an 8-hex-char identifier, for the
/// encryption metadata file. Not secret — just a label to detect stale
/// ciphertext after a rotation.
pub fn key_id(key: &[u8; KEY_LEN]) -> String {
    let mut out = String::with_capacity(8);
    for byte in &key[..4] {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

impl KeyHandle {
    /// Load the key at `path`, generating and persisting a new one if it
    /// doesn't exist yet. Concurrent first-use within one process should
    /// funnel through a single call site (the manager does this at
    /// startup) so "load-or-generate-once" holds.
    pub fn load_or_generate(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            Self::load(&path)
        } else {
            let key = generate_key();
            write_key_file(&path, &key)?;
            Ok(KeyHandle { key, path })
        }
    }

    /// Load an existing key file; fails if it is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let encoded = fs::read_to_string(&path)?;
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        if decoded.len() != KEY_LEN {
            return Err(Error::MalformedKeyFile(path));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&decoded);
        Ok(KeyHandle { key, path })
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> String {
        key_id(&self.key)
    }

    /// Replace the key file with a freshly generated key, writing via a
    /// temp-file-plus-rename so a crash mid-rotation leaves either the old
    /// key or the new key intact, never a half-written file.
    pub fn rotate(&mut self) -> Result<()> {
        let new_key = generate_key();
        write_key_file(&self.path, &new_key)?;
        self.key = new_key;
        Ok(())
    }
}

fn write_key_file(path: &Path, key: &[u8; KEY_LEN]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(key);

    let mut tmp_name = path.as_os_str().to_owned();
    let mut rand_suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut rand_suffix);
    tmp_name.push(format!(".tmp.{:08x}", u32::from_le_bytes(rand_suffix)));
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, encoded.as_bytes())?;
    set_readonly_owner(&tmp_path)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(unix)]
fn set_readonly_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o400);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_readonly_owner(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generates_key_on_first_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".encryption-key");
        let handle = KeyHandle::load_or_generate(&path).unwrap();
        assert!(path.exists());
        assert_eq!(handle.key().len(), KEY_LEN);
    }

    #[test]
    fn reloads_same_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".encryption-key");
        let first = KeyHandle::load_or_generate(&path).unwrap();
        let second = KeyHandle::load_or_generate(&path).unwrap();
        assert_eq!(first.key(), second.key());
    }

    #[test]
    fn rotate_changes_key_and_file_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".encryption-key");
        let mut handle = KeyHandle::load_or_generate(&path).unwrap();
        let before = *handle.key();
        handle.rotate().unwrap();
        assert_ne!(before, *handle.key());

        let reloaded = KeyHandle::load(&path).unwrap();
        assert_eq!(reloaded.key(), handle.key());
    }

    #[test]
    fn malformed_key_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".encryption-key");
        std::fs::write(&path, "not-base64-or-wrong-length").unwrap();
        assert!(KeyHandle::load(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_chmod_0400() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join(".encryption-key");
        KeyHandle::load_or_generate(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o400);
    }

    #[test]
    fn failed_rotation_leaves_prior_key_untouched() {
        // Simulate a crash-before-rename by writing the temp file and
        // aborting before `fs::rename` — the original key path is
        // untouched because the write happens to a distinct temp path.
        let dir = tempdir().unwrap();
        let path = dir.path().join(".encryption-key");
        let handle = KeyHandle::load_or_generate(&path).unwrap();
        let original = *handle.key();

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp.deadbeef");
        std::fs::write(PathBuf::from(tmp_name), b"garbage").ok();

        let reloaded = KeyHandle::load(&path).unwrap();
        assert_eq!(*reloaded.key(), original);
    }
}
