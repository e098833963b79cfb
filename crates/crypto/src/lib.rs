//! Leadflow Crypto - Field-level encryption
//!
//! Transparent AES-256-GCM encryption of individual text fields (lead email
//! and phone). Stored envelopes have the form `nonceHex:cipherHex` with a
//! fresh random nonce per call; a nonce is never reused under the same key.
//!
//! Values without the envelope separator are treated as legacy unencrypted
//! data and returned unchanged on decrypt. That tolerance exists for
//! migration of pre-encryption records only - new writes always produce a
//! full envelope.

pub mod error;

pub use error::{CryptoError, CryptoResult};

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use std::fmt;

/// Minimum accepted length of the supplied key material
pub const MIN_KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Symmetric cipher for individual PII fields.
///
/// Key material is supplied once at process start; construction fails fast
/// when it is absent or under-length. There is no built-in default key.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    /// Build a cipher from externally supplied key material.
    ///
    /// The 256-bit AES key is the SHA-256 digest of the material, so
    /// operators may supply any passphrase of at least [`MIN_KEY_LEN`]
    /// characters.
    pub fn new(key_material: &str) -> CryptoResult<Self> {
        if key_material.len() < MIN_KEY_LEN {
            return Err(CryptoError::KeyTooShort { min: MIN_KEY_LEN });
        }

        let digest = Sha256::digest(key_material.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);

        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt a field value into a `nonceHex:cipherHex` envelope.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptFailed)?;

        Ok(format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext)))
    }

    /// Decrypt an envelope back to plaintext.
    ///
    /// A value that does not parse as an envelope (no separator, non-hex
    /// halves, wrong nonce length) is returned unchanged - it predates
    /// encryption. Authentication failure on a well-formed envelope is an
    /// error.
    pub fn decrypt(&self, stored: &str) -> CryptoResult<String> {
        let Some((nonce_hex, cipher_hex)) = stored.split_once(':') else {
            return Ok(stored.to_string());
        };

        let (Ok(nonce_bytes), Ok(cipher_bytes)) = (hex::decode(nonce_hex), hex::decode(cipher_hex))
        else {
            return Ok(stored.to_string());
        };

        if nonce_bytes.len() != NONCE_LEN {
            return Ok(stored.to_string());
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), cipher_bytes.as_ref())
            .map_err(|_| CryptoError::DecryptFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailed)
    }
}

impl fmt::Debug for FieldCipher {
    // Never print key material
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldCipher")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "correct-horse-battery-staple-0123456789";

    fn cipher() -> FieldCipher {
        FieldCipher::new(TEST_KEY).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let cipher = cipher();

        for plaintext in ["a", "maya@example.com", "+49 170 1234567", "ünïcødé ✓"] {
            let envelope = cipher.encrypt(plaintext).unwrap();
            assert_ne!(envelope, plaintext);
            assert_eq!(cipher.decrypt(&envelope).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_envelope_shape() {
        let cipher = cipher();
        let envelope = cipher.encrypt("maya@example.com").unwrap();

        let (nonce_hex, cipher_hex) = envelope.split_once(':').unwrap();
        assert_eq!(nonce_hex.len(), NONCE_LEN * 2);
        assert!(hex::decode(nonce_hex).is_ok());
        assert!(hex::decode(cipher_hex).is_ok());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = cipher();

        let first = cipher.encrypt("same plaintext").unwrap();
        let second = cipher.encrypt("same plaintext").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_legacy_value_passes_through() {
        let cipher = cipher();

        // No separator: pre-encryption data
        assert_eq!(cipher.decrypt("maya@example.com").unwrap(), "maya@example.com");
        // Separator but not hex: also legacy
        assert_eq!(cipher.decrypt("tel:+491701234567").unwrap(), "tel:+491701234567");
    }

    #[test]
    fn test_tampered_envelope_fails() {
        let cipher = cipher();
        let envelope = cipher.encrypt("maya@example.com").unwrap();

        let (nonce_hex, cipher_hex) = envelope.split_once(':').unwrap();
        let mut flipped = cipher_hex.to_string();
        let last = if flipped.ends_with('0') { "1" } else { "0" };
        flipped.replace_range(flipped.len() - 1.., last);

        let tampered = format!("{}:{}", nonce_hex, flipped);
        assert_eq!(cipher.decrypt(&tampered), Err(CryptoError::DecryptFailed));
    }

    #[test]
    fn test_wrong_key_fails() {
        let envelope = cipher().encrypt("maya@example.com").unwrap();
        let other = FieldCipher::new("a-completely-different-key-material-xyz").unwrap();

        assert_eq!(other.decrypt(&envelope), Err(CryptoError::DecryptFailed));
    }

    #[test]
    fn test_under_length_key_rejected() {
        assert_eq!(
            FieldCipher::new("too-short").unwrap_err(),
            CryptoError::KeyTooShort { min: MIN_KEY_LEN }
        );
        assert_eq!(
            FieldCipher::new("").unwrap_err(),
            CryptoError::KeyTooShort { min: MIN_KEY_LEN }
        );
    }

    #[test]
    fn test_debug_leaks_nothing() {
        let output = format!("{:?}", cipher());
        assert_eq!(output, "FieldCipher");
    }
}
