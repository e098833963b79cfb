//! Crypto errors
//!
//! Error messages never contain plaintext or key material.

use thiserror::Error;

/// Errors from the field cipher
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption key missing or shorter than {min} characters")]
    KeyTooShort { min: usize },

    #[error("Field encryption failed")]
    EncryptFailed,

    #[error("Field decryption failed")]
    DecryptFailed,
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
