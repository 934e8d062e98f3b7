//! Tether Core
//!
//! Pure value types shared by every tether layer.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod buffer;
pub mod environment;
pub mod url_match;

// Re-export commonly used types at crate root
pub use buffer::{ByteBuffer, Encoding, EncodingError};
pub use environment::{Capability, Environment};
pub use url_match::{PatternError, UrlPattern, url_matches};
