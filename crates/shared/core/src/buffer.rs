//! Immutable byte buffer with utf8/base64 text codecs
//!
//! Buffers share their storage: cloning never copies bytes, and
//! concatenating a single buffer hands back that same buffer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Text encodings a buffer can be decoded from and encoded to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Utf8,
    Base64,
}

impl FromStr for Encoding {
    type Err = EncodingError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "base64" => Ok(Encoding::Base64),
            _ => Err(EncodingError::Unsupported(name.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "utf8"),
            Encoding::Base64 => write!(f, "base64"),
        }
    }
}

/// Encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unsupported encoding: {0}")]
    Unsupported(String),

    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

/// Immutable, fixed-length binary value
///
/// Equality is by content. Two handles may alias the same storage, which
/// [`ByteBuffer::ptr_eq`] can observe.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteBuffer {
    bytes: Arc<[u8]>,
}

impl ByteBuffer {
    /// Create from raw bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Create from the UTF-8 bytes of `text`
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Create from base64 text
    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        STANDARD
            .decode(text)
            .map(Self::from_bytes)
            .map_err(|e| EncodingError::InvalidBase64(e.to_string()))
    }

    /// Create from text in the given encoding
    pub fn decode(text: &str, encoding: Encoding) -> Result<Self, EncodingError> {
        match encoding {
            Encoding::Utf8 => Ok(Self::from_text(text)),
            Encoding::Base64 => Self::from_base64(text),
        }
    }

    /// Render as text in the given encoding
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD under `Utf8`.
    pub fn encode(&self, encoding: Encoding) -> String {
        match encoding {
            Encoding::Utf8 => String::from_utf8_lossy(&self.bytes).into_owned(),
            Encoding::Base64 => STANDARD.encode(&self.bytes),
        }
    }

    /// Render as text in the encoding named `name` (`"utf8"` or `"base64"`)
    pub fn encode_as(&self, name: &str) -> Result<String, EncodingError> {
        Ok(self.encode(name.parse()?))
    }

    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Concatenate buffers in list order
    ///
    /// An empty list yields an empty buffer and a single-element list yields
    /// that same buffer (aliased, not copied).
    pub fn concat(buffers: &[ByteBuffer]) -> ByteBuffer {
        match buffers {
            [] => ByteBuffer::default(),
            [only] => only.clone(),
            many => {
                let total = many.iter().map(ByteBuffer::byte_length).sum();
                let mut joined = Vec::with_capacity(total);
                for buffer in many {
                    joined.extend_from_slice(buffer.as_bytes());
                }
                ByteBuffer::from_bytes(joined)
            }
        }
    }

    /// Whether both handles share the same storage
    pub fn ptr_eq(a: &ByteBuffer, b: &ByteBuffer) -> bool {
        Arc::ptr_eq(&a.bytes, &b.bytes)
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&str> for ByteBuffer {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_round_trip_multibyte() {
        let text = "héllo wörld · 日本語 🚀 \u{10FFFF}";
        let buffer = ByteBuffer::from_text(text);
        assert_eq!(buffer.byte_length(), text.len());
        assert_eq!(buffer.encode(Encoding::Utf8), text);
    }

    #[test]
    fn test_base64_round_trip_arbitrary_bytes() {
        let bytes: Vec<u8> = (0..=255u8).rev().collect();
        let buffer = ByteBuffer::from_bytes(bytes.clone());
        let encoded = buffer.encode(Encoding::Base64);
        let decoded = ByteBuffer::from_base64(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), bytes.as_slice());
    }

    #[test]
    fn test_known_base64() {
        let buffer = ByteBuffer::decode("aGk=", Encoding::Base64).unwrap();
        assert_eq!(buffer.encode(Encoding::Utf8), "hi");
        assert_eq!(ByteBuffer::from_text("hi").encode_as("base64").unwrap(), "aGk=");
    }

    #[test]
    fn test_invalid_base64() {
        let result = ByteBuffer::from_base64("not base64!");
        assert!(matches!(result, Err(EncodingError::InvalidBase64(_))));
    }

    #[test]
    fn test_unsupported_encoding() {
        let buffer = ByteBuffer::from_text("x");
        assert_eq!(
            buffer.encode_as("latin1"),
            Err(EncodingError::Unsupported("latin1".to_string()))
        );
        assert!("hex".parse::<Encoding>().is_err());
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
    }

    #[test]
    fn test_concat_empty() {
        let joined = ByteBuffer::concat(&[]);
        assert_eq!(joined.byte_length(), 0);
        assert!(joined.is_empty());
    }

    #[test]
    fn test_concat_single_aliases() {
        let buffer = ByteBuffer::from_text("only");
        let joined = ByteBuffer::concat(std::slice::from_ref(&buffer));
        assert!(ByteBuffer::ptr_eq(&joined, &buffer));
    }

    #[test]
    fn test_concat_many() {
        let a = ByteBuffer::from_text("foo");
        let b = ByteBuffer::from_bytes(vec![0u8, 255]);
        let c = ByteBuffer::from_text("bar");
        let joined = ByteBuffer::concat(&[a.clone(), b.clone(), c.clone()]);

        assert_eq!(
            joined.byte_length(),
            a.byte_length() + b.byte_length() + c.byte_length()
        );
        assert_eq!(joined.as_bytes(), b"foo\x00\xffbar");
        assert!(!ByteBuffer::ptr_eq(&joined, &a));
    }

    #[test]
    fn test_equality_by_content() {
        let a = ByteBuffer::from_text("same");
        let b = ByteBuffer::from_bytes(b"same".to_vec());
        assert_eq!(a, b);
        assert!(!ByteBuffer::ptr_eq(&a, &b));
    }
}
