//! Field-level envelope encryption: walks the document, replacing values at
//! designated sensitive paths with an authenticated-encryption envelope.

use crate::crypto::{self, KEY_LEN};
use crate::error::{Error, Result};
use base64::Engine;
use serde_json::{Map, Value};

/// Dot-notation sensitive paths; `*` matches exactly one path segment
/// (including numeric array indices).
pub const SENSITIVE_PATHS: &[&str] = &[
    "activeInstance.apiKeys",
    "activeInstance.credentials",
    "activeInstance.tokens",
    "activeInstance.secrets",
    "completedSteps.*.secrets",
    "completedSteps.*.credentials",
    "config.apiKey",
    "config.databaseUrl",
    "config.authToken",
];

const ALGORITHM: &str = "aes-256-gcm";

fn matches_pattern(path: &[String], pattern: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    if path.len() != pattern_segments.len() {
        return false;
    }
    path.iter()
        .zip(pattern_segments.iter())
        .all(|(seg, pat)| *pat == "*" || seg == pat)
}

fn is_sensitive_path(path: &[String]) -> bool {
    SENSITIVE_PATHS.iter().any(|p| matches_pattern(path, p))
}

/// Does `value` already look like an encrypted-field envelope?
pub fn is_envelope(value: &Value) -> bool {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return false,
    };
    obj.get("encrypted") == Some(&Value::Bool(true))
        && obj.get("algorithm").and_then(Value::as_str) == Some(ALGORITHM)
        && obj.get("iv").and_then(Value::as_str).is_some()
        && obj.get("authTag").and_then(Value::as_str).is_some()
        && obj.get("data").and_then(Value::as_str).is_some()
}

fn encrypt_leaf(key: &[u8; KEY_LEN], value: &Value) -> Result<Value> {
    let plaintext = serde_json::to_vec(value)?;
    let sealed = crypto::seal(key, &plaintext).map_err(|_| Error::EncryptionFailed)?;

    let mut envelope = Map::new();
    envelope.insert("encrypted".to_string(), Value::Bool(true));
    envelope.insert("algorithm".to_string(), Value::String(ALGORITHM.to_string()));
    envelope.insert(
        "iv".to_string(),
        Value::String(base64::engine::general_purpose::STANDARD.encode(sealed.iv)),
    );
    envelope.insert(
        "authTag".to_string(),
        Value::String(base64::engine::general_purpose::STANDARD.encode(sealed.tag)),
    );
    envelope.insert(
        "data".to_string(),
        Value::String(base64::engine::general_purpose::STANDARD.encode(&sealed.ciphertext)),
    );
    Ok(Value::Object(envelope))
}

fn decrypt_leaf(key: &[u8; KEY_LEN], envelope: &Value) -> Result<Value> {
    let obj = envelope.as_object().ok_or(Error::DecryptionFailed)?;
    let get_b64 = |field: &str| -> Result<Vec<u8>> {
        let s = obj
            .get(field)
            .and_then(Value::as_str)
            .ok_or(Error::DecryptionFailed)?;
        Ok(base64::engine::general_purpose::STANDARD.decode(s)?)
    };
    let iv = get_b64("iv")?;
    let tag = get_b64("authTag")?;
    let data = get_b64("data")?;

    let plaintext = crypto::open(key, &iv, &tag, &data)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Walk `doc`, encrypting every value at a sensitive path that is not
/// already an envelope. Returns the transformed document and the list of
/// paths that were (newly) encrypted.
pub fn encrypt_object(key: &[u8; KEY_LEN], doc: &Value) -> Result<(Value, Vec<String>)> {
    let mut encrypted_paths = Vec::new();
    let transformed = walk_encrypt(key, doc, &mut Vec::new(), &mut encrypted_paths)?;
    Ok((transformed, encrypted_paths))
}

fn walk_encrypt(
    key: &[u8; KEY_LEN],
    value: &Value,
    path: &mut Vec<String>,
    encrypted_paths: &mut Vec<String>,
) -> Result<Value> {
    if is_envelope(value) {
        return Ok(value.clone());
    }
    if !path.is_empty() && is_sensitive_path(path) {
        encrypted_paths.push(path.join("."));
        return encrypt_leaf(key, value);
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                path.push(k.clone());
                out.insert(k.clone(), walk_encrypt(key, v, path, encrypted_paths)?);
                path.pop();
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                out.push(walk_encrypt(key, item, path, encrypted_paths)?);
                path.pop();
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// Walk `doc`, decrypting every envelope found, regardless of its path.
pub fn decrypt_object(key: &[u8; KEY_LEN], doc: &Value) -> Result<Value> {
    if is_envelope(doc) {
        return decrypt_leaf(key, doc);
    }
    match doc {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), decrypt_object(key, v)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(decrypt_object(key, item)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_key;
    use serde_json::json;

    #[test]
    fn pattern_with_wildcard_matches_any_segment() {
        let path = vec!["completedSteps".to_string(), "3".to_string(), "secrets".to_string()];
        assert!(is_sensitive_path(&path));
    }

    #[test]
    fn non_sensitive_path_is_untouched() {
        let path = vec!["activeInstance".to_string(), "projectPath".to_string()];
        assert!(!is_sensitive_path(&path));
    }

    #[test]
    fn encrypt_then_decrypt_round_trips_whole_document() {
        let key = generate_key();
        let doc = json!({
            "activeInstance": {
                "apiKeys": {"stripe": "sk_live_abcdef"},
                "projectPath": "/tmp/proj"
            },
            "completedSteps": [
                {"stepId": "a", "secrets": ["x"]},
                {"stepId": "b"}
            ]
        });

        let (encrypted, paths) = encrypt_object(&key, &doc).unwrap();
        assert!(paths.contains(&"activeInstance.apiKeys".to_string()));
        assert!(paths.contains(&"completedSteps.0.secrets".to_string()));

        // The non-sensitive sibling is untouched.
        assert_eq!(
            encrypted["activeInstance"]["projectPath"],
            json!("/tmp/proj")
        );
        assert!(is_envelope(&encrypted["activeInstance"]["apiKeys"]));

        let decrypted = decrypt_object(&key, &encrypted).unwrap();
        assert_eq!(decrypted, doc);
    }

    #[test]
    fn already_encrypted_envelope_is_not_re_encrypted() {
        let key = generate_key();
        let doc = json!({"activeInstance": {"apiKeys": {"a": "b"}}});
        let (once, _) = encrypt_object(&key, &doc).unwrap();
        let (twice, paths_twice) = encrypt_object(&key, &once).unwrap();
        assert!(paths_twice.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let key = generate_key();
        let other = generate_key();
        let doc = json!({"activeInstance": {"apiKeys": {"a": "b"}}});
        let (encrypted, _) = encrypt_object(&key, &doc).unwrap();
        assert!(decrypt_object(&other, &encrypted).is_err());
    }
}
