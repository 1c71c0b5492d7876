//! Body sealing for chat envelopes.
//!
//! Defines the [`BodyCipher`] trait applied to the envelope's `message`
//! field. Sender name and timestamp are never sealed, so the log keeps
//! readable metadata while the content is protected.
//!
//! Two implementations exist:
//! - [`Plaintext`]: no key configured, seal/open are identity.
//! - [`sealed::SealedCipher`]: XChaCha20-Poly1305 under a shared key.

pub mod keys;
pub mod sealed;

use std::sync::Arc;

use keys::SymmetricKey;

/// Errors that can occur during body sealing and opening.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The configured key text is unusable.
    #[error("invalid symmetric key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// The token could not be opened (wrong key, corrupted or tampered data).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Seals and opens message bodies.
///
/// # Invariant
///
/// `open(seal(p)) == p` for every plaintext `p` under the same cipher, and
/// a token sealed under a different key never opens to its plaintext.
pub trait BodyCipher: Send + Sync {
    /// Seal a plaintext body into a transportable token.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailed`] if the AEAD rejects the input.
    fn seal(&self, plaintext: &str) -> Result<String, CryptoError>;

    /// Open a token produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptionFailed`] for tokens from another key
    /// or tokens that are corrupted.
    fn open(&self, token: &str) -> Result<String, CryptoError>;

    /// Returns `true` if bodies are actually encrypted.
    fn is_sealing(&self) -> bool;
}

/// Pass-through cipher used when no key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl BodyCipher for Plaintext {
    fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(plaintext.to_string())
    }

    fn open(&self, token: &str) -> Result<String, CryptoError> {
        Ok(token.to_string())
    }

    fn is_sealing(&self) -> bool {
        false
    }
}

/// Build the cipher for an optional key.
///
/// `None` selects [`Plaintext`].
#[must_use]
pub fn cipher_for(key: Option<SymmetricKey>) -> Arc<dyn BodyCipher> {
    match key {
        Some(key) => Arc::new(sealed::SealedCipher::new(key)),
        None => Arc::new(Plaintext),
    }
}
