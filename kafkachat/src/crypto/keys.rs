//! Symmetric key material for body sealing.
//!
//! A key is 32 random bytes. Its textual form is URL-safe base64 with
//! padding (44 characters), which is what `kafkachat-keygen` prints and what
//! the `symmetric_key` config field / `--key` flag accept.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::CryptoError;

/// Length of a raw symmetric key in bytes.
pub const KEY_LEN: usize = 32;

/// A shared symmetric key.
///
/// All participants of an encrypted chat hold the same key. The raw bytes
/// are zeroized on drop and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Generate a new random key using the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Build a key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Parse the textual (URL-safe base64) form of a key.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the text is not base64 or does
    /// not decode to exactly 32 bytes.
    pub fn parse(text: &str) -> Result<Self, CryptoError> {
        let mut decoded = URL_SAFE
            .decode(text.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("not URL-safe base64: {e}")))?;

        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "key must decode to {KEY_LEN} bytes, got {len}"
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Returns the textual form of this key.
    #[must_use]
    pub fn encode(&self) -> String {
        URL_SAFE.encode(self.bytes)
    }

    pub(crate) const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for SymmetricKey {}
