//! Key rotation orchestration: decrypt under the old key, swap the key
//! file, re-encrypt under the new key, update metadata.
//!
//! Order matters. Decryption happens first so a failure there never
//! touches the key file. The key file write is a temp-file-plus-rename
//! (see [`crate::keys`]), so a crash or error during that step leaves the
//! prior key file intact. Once the new key file is in place, re-encryption
//! under the new key is the only remaining step; if it fails, the document
//! passed in is left as the caller's problem to retry — the encrypted
//! fields are still readable, just under the new key the caller must now
//! use.

use crate::error::Result;
use crate::fields::{decrypt_object, encrypt_object};
use crate::keys::KeyHandle;
use crate::metadata::EncryptionMetadata;
use serde_json::Value;

/// Rotate `key_handle` to a fresh key, re-encrypting every sensitive field
/// in `doc` under it, and updating `metadata` accordingly.
pub fn rotate_key(
    key_handle: &mut KeyHandle,
    metadata: &mut EncryptionMetadata,
    doc: &Value,
) -> Result<Value> {
    let old_key = *key_handle.key();
    let decrypted = decrypt_object(&old_key, doc)?;

    key_handle.rotate()?;
    let new_key = *key_handle.key();

    let (re_encrypted, paths) = encrypt_object(&new_key, &decrypted)?;
    metadata.set_encrypted_fields(paths);
    metadata.record_rotation(key_handle.id());

    Ok(re_encrypted)
}
