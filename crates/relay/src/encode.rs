//! Encoding of raw RFC 2822 messages for the Gmail insert API
//!
//! Standard base64 (padded) with `/` replaced by `_` and `+` by `-`.
//! This is not the RFC 4648 URL-safe engine: the substitution happens
//! after encoding and the `=` padding is kept.

use base64::prelude::*;

/// A raw message in the form the destination insert call expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage(String);

impl EncodedMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Encode a raw RFC 2822 byte stream
pub fn encode(raw: &[u8]) -> EncodedMessage {
    let encoded = BASE64_STANDARD
        .encode(raw)
        .replace('/', "_")
        .replace('+', "-");
    EncodedMessage(encoded)
}
