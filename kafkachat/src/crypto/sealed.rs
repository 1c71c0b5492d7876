//! XChaCha20-Poly1305 body sealing.
//!
//! Token layout before base64: `[version: u8][nonce: 24 bytes][ciphertext + tag]`,
//! encoded as URL-safe base64 with padding. Every seal draws a fresh random
//! nonce, so the same body sealed twice gives two different tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;

use super::keys::SymmetricKey;
use super::{BodyCipher, CryptoError};

/// Current token format version.
const TOKEN_VERSION: u8 = 1;

/// XChaCha20 nonce length.
const NONCE_LEN: usize = 24;

/// Poly1305 tag length.
const TAG_LEN: usize = 16;

/// Associated data bound into every token.
const TOKEN_AAD: &[u8] = b"kafkachat:body:v1";

/// Seals bodies under a shared [`SymmetricKey`].
#[derive(Debug, Clone)]
pub struct SealedCipher {
    key: SymmetricKey,
}

impl SealedCipher {
    /// Create a cipher for the given key.
    #[must_use]
    pub const fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    fn aead(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.key.as_bytes()))
    }
}

impl BodyCipher for SealedCipher {
    fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .aead()
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: TOKEN_AAD,
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut raw = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        raw.push(TOKEN_VERSION);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(raw))
    }

    fn open(&self, token: &str) -> Result<String, CryptoError> {
        let raw = URL_SAFE
            .decode(token.trim())
            .map_err(|e| CryptoError::DecryptionFailed(format!("token is not base64: {e}")))?;

        if raw.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(CryptoError::DecryptionFailed(format!(
                "token too short: {} bytes",
                raw.len()
            )));
        }
        if raw[0] != TOKEN_VERSION {
            return Err(CryptoError::DecryptionFailed(format!(
                "unsupported token version {}",
                raw[0]
            )));
        }

        let (nonce, ciphertext) = raw[1..].split_at(NONCE_LEN);
        let plaintext = self
            .aead()
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: TOKEN_AAD,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed("authentication failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::DecryptionFailed("plaintext is not UTF-8".to_string()))
    }

    fn is_sealing(&self) -> bool {
        true
    }
}
