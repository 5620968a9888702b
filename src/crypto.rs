//! AES-256-GCM primitives for the credential store.
//!
//! Every write seals the plaintext with a fresh random 96-bit nonce; nonce
//! and ciphertext are kept as separate fields on the store entry. A wrong
//! key or tampered ciphertext fails GCM authentication and surfaces as an
//! error, never as garbled plaintext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

use crate::error::CredentialError;

/// Key length in bytes (256 bits for AES-256).
pub const KEY_LENGTH: usize = 32;

/// Nonce length in bytes (96 bits for AES-GCM).
pub const NONCE_LENGTH: usize = 12;

/// Generate a new random 256-bit key from the OS entropy source.
pub fn generate_key() -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// Parse a key from hex (64 characters) or base64 format.
pub fn parse_key(key_str: &str) -> Result<[u8; KEY_LENGTH], CredentialError> {
    let trimmed = key_str.trim();

    // Try hex first (64 characters = 32 bytes)
    if trimmed.len() == KEY_LENGTH * 2 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes =
            hex::decode(trimmed).map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes);
        return Ok(key);
    }

    // Try base64
    let bytes = BASE64.decode(trimmed).map_err(|_| {
        CredentialError::InvalidKey("key is neither valid hex nor base64".to_string())
    })?;

    if bytes.len() != KEY_LENGTH {
        return Err(CredentialError::InvalidKey(format!(
            "key must be {} bytes, got {}",
            KEY_LENGTH,
            bytes.len()
        )));
    }

    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Encrypt a plaintext secret, returning `(nonce, ciphertext)`.
pub fn seal(
    key: &[u8; KEY_LENGTH],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), CredentialError> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CredentialError::InvalidKey("encryption failed".to_string()))?;

    Ok((nonce_bytes.to_vec(), ciphertext))
}

/// Decrypt a `(nonce, ciphertext)` pair produced by [`seal`].
///
/// `identity` names the entry in the error when authentication fails.
pub fn open(
    key: &[u8; KEY_LENGTH],
    nonce: &[u8],
    ciphertext: &[u8],
    identity: &str,
) -> Result<Vec<u8>, CredentialError> {
    if nonce.len() != NONCE_LENGTH {
        return Err(CredentialError::DecryptionFailed {
            identity: identity.to_string(),
        });
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CredentialError::DecryptionFailed {
            identity: identity.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; KEY_LENGTH] {
        let mut key = [0u8; KEY_LENGTH];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let plaintext = b"my-secret-api-key-12345";

        let (nonce, ciphertext) = seal(&key, plaintext).unwrap();
        assert_ne!(ciphertext, plaintext.to_vec());

        let opened = open(&key, &nonce, &ciphertext, "TEST_KEY").unwrap();
        assert_eq!(opened, plaintext.to_vec());
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = test_key();
        let mut key2 = test_key();
        key2[0] = 255;

        let (nonce, ciphertext) = seal(&key1, b"secret").unwrap();
        let result = open(&key2, &nonce, &ciphertext, "TEST_KEY");

        assert!(matches!(
            result,
            Err(CredentialError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn test_different_seals_differ() {
        let key = test_key();

        let (nonce1, ct1) = seal(&key, b"same-data").unwrap();
        let (nonce2, ct2) = seal(&key, b"same-data").unwrap();

        // Fresh random nonce per seal
        assert_ne!(nonce1, nonce2);
        assert_ne!(ct1, ct2);

        assert_eq!(open(&key, &nonce1, &ct1, "a").unwrap(), b"same-data");
        assert_eq!(open(&key, &nonce2, &ct2, "a").unwrap(), b"same-data");
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = test_key();
        let (nonce, mut ciphertext) = seal(&key, b"secret").unwrap();
        ciphertext[0] ^= 0x01;

        assert!(open(&key, &nonce, &ciphertext, "TEST_KEY").is_err());
    }

    #[test]
    fn test_parse_key_hex() {
        let hex_key = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
        let key = parse_key(hex_key).unwrap();

        for (i, byte) in key.iter().enumerate() {
            assert_eq!(*byte, i as u8);
        }
    }

    #[test]
    fn test_parse_key_base64() {
        let key_bytes = test_key();
        let base64_key = BASE64.encode(key_bytes);
        assert_eq!(parse_key(&base64_key).unwrap(), key_bytes);
    }

    #[test]
    fn test_parse_key_invalid() {
        assert!(parse_key("abc").is_err());
        assert!(parse_key(
            "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"
        )
        .is_err());
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(generate_key(), generate_key());
    }

    #[test]
    fn test_unicode_content() {
        let key = test_key();
        let plaintext = "Hello, 世界! 🎉";

        let (nonce, ciphertext) = seal(&key, plaintext.as_bytes()).unwrap();
        let opened = open(&key, &nonce, &ciphertext, "TEST_KEY").unwrap();

        assert_eq!(String::from_utf8(opened).unwrap(), plaintext);
    }
}
