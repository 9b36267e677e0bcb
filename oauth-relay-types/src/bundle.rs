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

//! The token bundle returned by the provider's token endpoint, and its
//! base64 transport encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CodecError;

/// Successful response from the provider's `/oauth2/token` endpoint.
///
/// Only the fields the relay consumes are typed; everything else the
/// provider returned is kept in `extra` so the bundle forwarded to the
/// browser is the provider's complete response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenBundle {
    /// Bundle with only an access token; used by tests and fixtures.
    pub fn with_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: None,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: None,
            extra: Map::new(),
        }
    }
}

/// Base64 (standard alphabet) of the bundle's JSON.
pub fn encode_bundle(bundle: &TokenBundle) -> String {
    // Serializing a struct of strings, integers and a JSON map cannot fail.
    let json = serde_json::to_vec(bundle).unwrap_or_default();
    STANDARD.encode(json)
}

/// Inverse of [`encode_bundle`].
pub fn decode_bundle(encoded: &str) -> Result<TokenBundle, CodecError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CodecError::bundle(format!("not base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| CodecError::bundle(format!("not a token bundle: {e}")))
}
