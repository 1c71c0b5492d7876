//! Serialization and deserialization for the record payload.
//!
//! Each record value is a single UTF-8 JSON object with exactly the three
//! envelope fields. Decoding only rejects structural problems: bytes that
//! are not UTF-8, text that is not JSON, or a missing/non-string field.
//! Unknown extra fields are ignored.

use serde_json::error::Category;

use crate::envelope::Envelope;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The record value is not valid UTF-8.
    #[error("record is not valid UTF-8: {0}")]
    InvalidUtf8(String),
    /// The text is not well-formed JSON.
    #[error("malformed envelope: {0}")]
    Malformed(String),
    /// Well-formed JSON that does not have the envelope shape.
    #[error("envelope has the wrong shape: {0}")]
    InvalidShape(String),
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes an [`Envelope`] as JSON text.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the envelope cannot be serialized.
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes an [`Envelope`] from raw record bytes.
///
/// # Errors
///
/// Returns `CodecError::InvalidUtf8` for non-UTF-8 input, otherwise the
/// errors of [`decode_str`].
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|e| CodecError::InvalidUtf8(e.to_string()))?;
    decode_str(text)
}

/// Decodes an [`Envelope`] from JSON text.
///
/// # Errors
///
/// Returns `CodecError::Malformed` if the text is not JSON, or
/// `CodecError::InvalidShape` if a field is missing or has the wrong type.
pub fn decode_str(text: &str) -> Result<Envelope, CodecError> {
    serde_json::from_str(text).map_err(|e| match e.classify() {
        Category::Data => CodecError::InvalidShape(e.to_string()),
        Category::Io | Category::Syntax | Category::Eof => CodecError::Malformed(e.to_string()),
    })
}
