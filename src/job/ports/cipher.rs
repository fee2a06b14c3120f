//! Credential cipher port.

use crate::job::domain::{ConnectionSecret, EncryptedCredential};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for cipher operations.
pub type CipherResult<T> = Result<T, CipherError>;

/// Reversible encryption of connection URLs.
///
/// Ciphertext is the only credential form that may be persisted. Decryption
/// happens inside the worker process only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialCipher: Send + Sync {
    /// Encrypts a plaintext connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encrypt`] when the key service fails.
    async fn encrypt(&self, plaintext: &ConnectionSecret) -> CipherResult<EncryptedCredential>;

    /// Decrypts a stored ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decrypt`] when the ciphertext is malformed, was
    /// produced under another key, or the key service fails.
    async fn decrypt(&self, ciphertext: &EncryptedCredential) -> CipherResult<ConnectionSecret>;
}

/// Errors returned by cipher implementations.
///
/// Messages never include plaintext or key material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Encryption failed.
    #[error("failed to encrypt credentials: {0}")]
    Encrypt(String),

    /// Decryption failed.
    #[error("failed to decrypt credentials: {0}")]
    Decrypt(String),

    /// The configured key is unusable.
    #[error("invalid cipher key: {0}")]
    InvalidKey(String),
}
