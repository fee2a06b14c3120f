//! Local-key credential cipher.

use crate::job::{
    domain::{ConnectionSecret, EncryptedCredential},
    ports::{CipherError, CipherResult, CredentialCipher},
};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use std::fmt;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher with a locally held key.
///
/// Ciphertext is `base64(nonce || ciphertext || tag)` with a fresh random
/// nonce per call, so encrypting the same URL twice yields different output.
#[derive(Clone)]
pub struct LocalKeyCipher {
    cipher: Aes256Gcm,
}

impl LocalKeyCipher {
    /// Creates a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] when the key is not valid base64
    /// or has the wrong length.
    pub fn from_base64_key(encoded: &str) -> CipherResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| CipherError::InvalidKey(err.to_string()))?;
        Self::from_key_bytes(&bytes)
    }

    /// Creates a cipher from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] when `bytes` is not 32 bytes long.
    pub fn from_key_bytes(bytes: &[u8]) -> CipherResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let cipher =
            Aes256Gcm::new_from_slice(bytes).map_err(|err| CipherError::InvalidKey(err.to_string()))?;
        Ok(Self { cipher })
    }

    /// Creates a cipher with a freshly generated random key, returned
    /// alongside the key in base64 form.
    #[must_use]
    pub fn generate() -> (Self, String) {
        let mut key = [0_u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        let encoded = STANDARD.encode(key);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        (Self { cipher }, encoded)
    }

    fn seal(&self, plaintext: &[u8]) -> CipherResult<String> {
        let mut nonce_bytes = [0_u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CipherError::Encrypt("AEAD encryption failed".to_owned()))?;
        let mut framed = Vec::with_capacity(NONCE_LEN + sealed.len());
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&sealed);
        Ok(STANDARD.encode(framed))
    }

    fn open(&self, encoded: &str) -> CipherResult<Vec<u8>> {
        let framed = STANDARD
            .decode(encoded)
            .map_err(|_| CipherError::Decrypt("ciphertext is not valid base64".to_owned()))?;
        if framed.len() <= NONCE_LEN {
            return Err(CipherError::Decrypt("ciphertext is truncated".to_owned()));
        }
        let (nonce_bytes, sealed) = framed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CipherError::Decrypt("authentication failed".to_owned()))
    }
}

impl fmt::Debug for LocalKeyCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeyCipher")
            .field("key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl CredentialCipher for LocalKeyCipher {
    async fn encrypt(&self, plaintext: &ConnectionSecret) -> CipherResult<EncryptedCredential> {
        self.seal(plaintext.expose().as_bytes())
            .map(EncryptedCredential::new)
    }

    async fn decrypt(&self, ciphertext: &EncryptedCredential) -> CipherResult<ConnectionSecret> {
        let bytes = self.open(ciphertext.as_str())?;
        let plaintext = String::from_utf8(bytes)
            .map_err(|_| CipherError::Decrypt("plaintext is not UTF-8".to_owned()))?;
        Ok(ConnectionSecret::new(plaintext))
    }
}
