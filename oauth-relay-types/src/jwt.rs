/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Compact JWT decoding **without** signature verification.
//!
//! A [`DecodedToken`] is only a structural view of the token. Nothing read
//! from it may be trusted for an authorization decision until the raw token
//! has been verified against the issuer's key set.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::CodecError;

/// Header and payload of a compact token, as JSON objects.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    pub header: Map<String, Value>,
    pub payload: Map<String, Value>,
}

impl DecodedToken {
    /// Key identifier from the header.
    pub fn kid(&self) -> Option<&str> {
        self.header.get("kid").and_then(Value::as_str)
    }

    /// `iss` claim.
    pub fn issuer(&self) -> Option<&str> {
        self.payload.get("iss").and_then(Value::as_str)
    }

    /// `sub` claim.
    pub fn subject(&self) -> Option<&str> {
        self.payload.get("sub").and_then(Value::as_str)
    }

    /// Any payload claim by name.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// Split a compact token into header and payload and decode both.
///
/// The token must have exactly three `.`-separated segments; the signature
/// segment may be empty (unsigned tokens) but is never inspected here.
pub fn decode_compact(token: &str) -> Result<DecodedToken, CodecError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(CodecError::token(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let header = decode_json_segment(segments[0], "header")?;
    let payload = decode_json_segment(segments[1], "payload")?;

    Ok(DecodedToken { header, payload })
}

fn decode_json_segment(segment: &str, which: &str) -> Result<Map<String, Value>, CodecError> {
    if segment.is_empty() {
        return Err(CodecError::token(format!("empty {which} segment")));
    }

    let bytes = decode_segment(segment)
        .map_err(|e| CodecError::token(format!("{which} is not base64: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CodecError::token(format!("{which} is not a JSON object"))),
        Err(e) => Err(CodecError::token(format!("{which} is not JSON: {e}"))),
    }
}

/// Decode one base64 segment. Providers are supposed to use the URL-safe
/// alphabet without padding, but the standard alphabet and padded segments
/// are accepted as well.
pub(crate) fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD.decode(normalized)
}
