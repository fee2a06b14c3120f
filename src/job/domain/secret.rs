//! Credential-bearing value types.

use super::redaction::redact_connection_url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Plaintext connection URL that may embed credentials.
///
/// Deliberately implements neither `Serialize` nor `Display`; `Debug`
/// prints `<redacted>`. The only way to read the value is [`Self::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSecret(String);

impl ConnectionSecret {
    /// Wraps a plaintext connection URL.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plaintext value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns a loggable form of the URL with user info removed.
    #[must_use]
    pub fn redacted(&self) -> String {
        redact_connection_url(&self.0)
    }
}

impl fmt::Debug for ConnectionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Ciphertext produced by a credential cipher, safe to persist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedCredential(String);

impl EncryptedCredential {
    /// Wraps an encoded ciphertext.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the encoded ciphertext.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EncryptedCredential {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
