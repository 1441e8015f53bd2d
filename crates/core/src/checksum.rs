//! SHA-256 checksum computation and verification over the canonicalized
//! document.

use crate::canonical::{canonical_json_string, without_field};
use crate::error::{CorruptionKind, Result};
use crate::types::{StateDocument, CHECKSUM_FIELD, ZERO_SENTINEL_CHECKSUM};
use sha2::{Digest, Sha256};

/// Compute `"sha256:" + hex` over the canonicalized document with the
/// `checksum` field itself removed.
pub fn calculate_checksum(doc: &StateDocument) -> Result<String> {
    let value = serde_json::to_value(doc)?;
    let without_checksum = without_field(&value, CHECKSUM_FIELD);
    let canonical = canonical_json_string(&without_checksum);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();

    Ok(format!("sha256:{}", hex::encode(digest)))
}

/// Verify `doc.checksum` against a freshly computed checksum, unless the
/// stored checksum is the zero sentinel (verification disabled).
pub fn verify_checksum(doc: &StateDocument) -> Result<()> {
    if doc.checksum == ZERO_SENTINEL_CHECKSUM {
        return Ok(());
    }
    let computed = calculate_checksum(doc)?;
    if computed != doc.checksum {
        return Err(CorruptionKind::ChecksumMismatch {
            expected: doc.checksum.clone(),
            actual: computed,
        }
        .into());
    }
    Ok(())
}

/// Minimal hex encoder so we don't pull in the `hex` crate for eight lines
/// of formatting.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for byte in bytes.as_ref() {
            write!(out, "{:02x}", byte).expect("writing to a String cannot fail");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_sha256_prefixed_hex() {
        let doc = StateDocument::bootstrap("1.0.0");
        let checksum = calculate_checksum(&doc).unwrap();
        assert!(checksum.starts_with("sha256:"));
        assert_eq!(checksum.len(), "sha256:".len() + 64);
    }

    #[test]
    fn zero_sentinel_skips_verification() {
        let doc = StateDocument::bootstrap("1.0.0");
        assert_eq!(doc.checksum, ZERO_SENTINEL_CHECKSUM);
        verify_checksum(&doc).unwrap();
    }

    #[test]
    fn real_checksum_round_trips() {
        let mut doc = StateDocument::bootstrap("1.0.0");
        doc.checksum = calculate_checksum(&doc).unwrap();
        verify_checksum(&doc).unwrap();
    }

    #[test]
    fn tampering_is_detected() {
        let mut doc = StateDocument::bootstrap("1.0.0");
        doc.checksum = calculate_checksum(&doc).unwrap();
        doc.schema_version = "9.9.9".to_string();
        let err = verify_checksum(&doc).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::StateCorrupted(CorruptionKind::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn checksum_stable_under_field_reordering() {
        // Two documents that differ only in Rust struct field order (which
        // does not exist for StateDocument, so instead we prove canonical
        // JSON text is reproducible across repeated computation).
        let doc = StateDocument::bootstrap("1.0.0");
        let a = calculate_checksum(&doc).unwrap();
        let b = calculate_checksum(&doc).unwrap();
        assert_eq!(a, b);
    }
}
