//! Low-level AES-256-GCM AEAD primitive.
//!
//! A fresh random 96-bit IV is generated per call to [`seal`]; the 128-bit
//! authentication tag travels alongside the ciphertext and is verified on
//! [`open`]. Key material never leaves this module except as opaque bytes.

use crate::error::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Output of a single seal operation: IV, ciphertext (tag appended by the
/// `aes-gcm` crate), split back into ciphertext and tag for the envelope
/// format.
pub struct Sealed {
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Sealed> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| Error::EncryptionFailed)?;
    let tag_offset = sealed.len() - TAG_LEN;
    let tag_bytes = sealed.split_off(tag_offset);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);

    Ok(Sealed { iv, tag, ciphertext: sealed })
}

/// Decrypt and verify `ciphertext`+`tag` under `key` and `iv`.
pub fn open(key: &[u8; KEY_LEN], iv: &[u8], tag: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(Error::DecryptionFailed);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);

    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|_| Error::DecryptionFailed)
}

/// Generate a fresh random 256-bit key.
pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = generate_key();
        let plaintext = b"hello, sensitive world";
        let sealed = seal(&key, plaintext).unwrap();
        let opened = open(&key, &sealed.iv, &sealed.tag, &sealed.ciphertext).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let key = generate_key();
        let sealed = seal(&key, b"payload").unwrap();
        let mut tampered = sealed.ciphertext.clone();
        if let Some(byte) = tampered.first_mut() {
            *byte ^= 0xFF;
        }
        assert!(open(&key, &sealed.iv, &sealed.tag, &tampered).is_err());
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let key = generate_key();
        let other = generate_key();
        let sealed = seal(&key, b"payload").unwrap();
        assert!(open(&other, &sealed.iv, &sealed.tag, &sealed.ciphertext).is_err());
    }

    #[test]
    fn two_seals_use_different_ivs() {
        let key = generate_key();
        let a = seal(&key, b"same plaintext").unwrap();
        let b = seal(&key, b"same plaintext").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
