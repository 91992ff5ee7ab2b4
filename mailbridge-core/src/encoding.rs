//! Base64 helpers for binary payloads.
//!
//! The channel carries JSON text only, so file content crosses it as
//! standard base64. These are the round-trip pair both sides rely on.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{BridgeError, BridgeResult};

/// Encode raw bytes as base64 text for the wire.
pub fn bytes_to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text back into raw bytes.
pub fn base64_to_bytes(text: &str) -> BridgeResult<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| BridgeError::Serialization(format!("invalid base64: {e}")))
}
