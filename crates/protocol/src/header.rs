//! Datagram framing header.
//!
//! Every datagram submitted to the daemon is framed as:
//!
//! ```text
//! {"format": "json", "version": 1}\n{...segment document...}
//! ```
//!
//! The header is the only part of the payload the daemon interprets; the
//! segment body stays opaque all the way to the upload call.

use serde::Deserialize;

/// Framing header preceding the newline separator on each datagram.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    /// Serialization format of the body. Only "json" is accepted,
    /// compared case-insensitively.
    #[serde(default)]
    pub format: String,

    /// Framing protocol version. Must be exactly 1.
    #[serde(default)]
    pub version: i32,
}

impl Header {
    /// Parse a header from raw bytes. Returns `None` on malformed JSON.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok()
    }

    /// Whether this header designates an acceptable datagram.
    ///
    /// `format` is matched case-insensitively; `version` exactly.
    pub fn is_valid(&self) -> bool {
        self.format.eq_ignore_ascii_case("json") && self.version == 1
    }
}

/// Split a datagram into `(header, body)` at the first newline.
///
/// Returns `None` when the separator is missing. The body may be empty;
/// callers reject that case separately so it can be counted.
pub fn split_header_body(datagram: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = datagram.iter().position(|&b| b == b'\n')?;
    Some((&datagram[..pos], &datagram[pos + 1..]))
}

#[cfg(test)]
#[path = "header_test.rs"]
mod header_test;
