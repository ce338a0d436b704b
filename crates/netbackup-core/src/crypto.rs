//! Symmetric authenticated encryption for stored device credentials (§3,
//! §4.B).
//!
//! Ciphertext is self-identifying: `v1:<base64 nonce>:<base64 ciphertext>`.
//! The process-wide key is parsed once from the `fernet_key` configuration
//! value and never logged.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::domain::NetBackupError;

const VERSION_PREFIX: &str = "v1";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

/// A decoded 256-bit symmetric key ready for AEAD use.
pub struct CredentialKey {
    cipher: XChaCha20Poly1305,
}

impl CredentialKey {
    /// Parse `fernet_key` into key material. Accepts any string that
    /// base64-decodes (standard or URL-safe, with or without padding) to
    /// exactly 32 bytes — the original's 44-char URL-safe base64 Fernet key
    /// decodes to 32 raw bytes the same way.
    pub fn from_config_value(raw: &str) -> Result<Self, NetBackupError> {
        let decoded = decode_key_material(raw)?;
        if decoded.len() != KEY_LEN {
            return Err(NetBackupError::Configuration(format!(
                "fernet_key must decode to {KEY_LEN} bytes, got {}",
                decoded.len()
            )));
        }
        let key = Key::from_slice(&decoded);
        Ok(Self {
            cipher: XChaCha20Poly1305::new(key),
        })
    }

    /// Encrypt `plaintext`, returning a self-identifying ciphertext string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, NetBackupError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| NetBackupError::Credential("encryption failed".to_string()))?;

        Ok(format!(
            "{VERSION_PREFIX}:{}:{}",
            STANDARD.encode(nonce_bytes),
            STANDARD.encode(ciphertext)
        ))
    }

    /// Decrypt a ciphertext string produced by [`encrypt`](Self::encrypt).
    /// Tampering with either the nonce or the ciphertext fails closed.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, NetBackupError> {
        let mut parts = ciphertext.splitn(3, ':');
        let (version, nonce_b64, ct_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(v), Some(n), Some(c)) => (v, n, c),
            _ => {
                return Err(NetBackupError::Credential(
                    "malformed ciphertext: expected v1:<nonce>:<ciphertext>".to_string(),
                ))
            }
        };
        if version != VERSION_PREFIX {
            return Err(NetBackupError::Credential(format!(
                "unsupported ciphertext version: {version}"
            )));
        }

        let nonce_bytes = STANDARD
            .decode(nonce_b64)
            .map_err(|_| NetBackupError::Credential("malformed ciphertext nonce".to_string()))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(NetBackupError::Credential(
                "malformed ciphertext nonce length".to_string(),
            ));
        }
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ct_bytes = STANDARD
            .decode(ct_b64)
            .map_err(|_| NetBackupError::Credential("malformed ciphertext body".to_string()))?;

        let plaintext = self
            .cipher
            .decrypt(nonce, ct_bytes.as_slice())
            .map_err(|_| NetBackupError::Credential("decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| NetBackupError::Credential("decrypted payload is not UTF-8".to_string()))
    }
}

fn decode_key_material(raw: &str) -> Result<Vec<u8>, NetBackupError> {
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
    STANDARD
        .decode(raw)
        .or_else(|_| URL_SAFE.decode(raw))
        .or_else(|_| URL_SAFE_NO_PAD.decode(raw))
        .map_err(|_| NetBackupError::Configuration("fernet_key is not valid base64".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CredentialKey {
        let raw = STANDARD.encode([7u8; KEY_LEN]);
        CredentialKey::from_config_value(&raw).unwrap()
    }

    #[test]
    fn round_trips_plaintext() {
        let key = test_key();
        let ciphertext = key.encrypt("hunter2").unwrap();
        assert!(ciphertext.starts_with("v1:"));
        let plaintext = key.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, "hunter2");
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let key = test_key();
        let mut ciphertext = key.encrypt("hunter2").unwrap();
        let last = ciphertext.pop().unwrap();
        let replacement = if last == 'A' { 'B' } else { 'A' };
        ciphertext.push(replacement);
        assert!(key.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn rejects_keys_of_the_wrong_length() {
        let raw = STANDARD.encode([1u8; 16]);
        assert!(CredentialKey::from_config_value(&raw).is_err());
    }

    #[test]
    fn rejects_malformed_ciphertext_shape() {
        let key = test_key();
        assert!(key.decrypt("not-the-right-shape").is_err());
        assert!(key.decrypt("v2:bm9uY2U=:Y2lwaGVy").is_err());
    }
}
