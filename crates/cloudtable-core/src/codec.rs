//! Reversible transcoding between domain values and service key strings
//!
//! Table services accept only a restricted alphabet in key properties, so
//! every row key, column key and value is turned into bytes by its [`Codec`]
//! impl and then into URL-safe, unpadded base64 by [`encode`]. The URL-safe
//! alphabet (`A-Z a-z 0-9 - _`) never produces `/`, `\`, `#`, `?` or control
//! characters. Distinct byte strings always encode to distinct strings.

use std::borrow::Cow;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Codec failures. Both mean a stored string was not written by this codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Not valid URL-safe base64
    #[error("invalid base64 in stored key or value: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Decoded bytes are not valid for a `String`
    #[error("stored text is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Result type alias for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Encode raw bytes into the service key alphabet.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Invert [`encode`].
pub fn decode(encoded: &str) -> CodecResult<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(encoded)?)
}

/// A domain type that can be stored as a row key, column key or value.
pub trait Codec: Sized {
    /// Raw byte form of the value.
    fn to_bytes(&self) -> Cow<'_, [u8]>;

    /// Rebuild the value from its raw byte form.
    fn from_bytes(bytes: Vec<u8>) -> CodecResult<Self>;

    /// Encoded service string for this value.
    fn encode(&self) -> String {
        encode(&self.to_bytes())
    }

    /// Decode a service string produced by [`Codec::encode`].
    fn decode(encoded: &str) -> CodecResult<Self> {
        Self::from_bytes(decode(encoded)?)
    }
}

impl Codec for Vec<u8> {
    fn to_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }

    fn from_bytes(bytes: Vec<u8>) -> CodecResult<Self> {
        Ok(bytes)
    }
}

impl Codec for String {
    fn to_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }

    fn from_bytes(bytes: Vec<u8>) -> CodecResult<Self> {
        Ok(String::from_utf8(bytes)?)
    }
}
