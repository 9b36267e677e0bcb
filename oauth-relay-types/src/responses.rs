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

//! JSON bodies returned by the relay backend.
//!
//! - `POST /oauth/refresh` success: `{ "token": "<base64 bundle>", "acls": [...] }`
//! - Any failure: `{ "error": "<human readable message>" }`

use serde::{Deserialize, Serialize};

/// Successful refresh: the re-encoded bundle plus the access-control list
/// (group claims) taken from the verified access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshResponse {
    pub token: String,
    #[serde(default)]
    pub acls: Vec<String>,
}

/// Error body. Server-side faults all share one generic message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Body returned when the refreshed access token fails verification.
    pub fn token_invalid() -> Self {
        Self::new("Token is invalid")
    }

    /// Body returned when the provider refuses the refresh token.
    pub fn refresh_rejected() -> Self {
        Self::new("Refresh token rejected")
    }

    /// Body for unexpected server faults.
    pub fn internal() -> Self {
        Self::new("Internal error. Please check the server configuration.")
    }
}

/// Either shape the refresh endpoint can produce, for consumers that parse
/// the body before looking at the status code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RefreshReply {
    Refreshed(RefreshResponse),
    Failed(ErrorResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refresh_reply_distinguishes_shapes() {
        let ok: RefreshReply =
            serde_json::from_value(json!({ "token": "abc", "acls": ["admins"] })).unwrap();
        assert_eq!(
            ok,
            RefreshReply::Refreshed(RefreshResponse {
                token: "abc".into(),
                acls: vec!["admins".into()]
            })
        );

        let failed: RefreshReply = serde_json::from_value(json!({ "error": "Token is invalid" })).unwrap();
        assert_eq!(failed, RefreshReply::Failed(ErrorResponse::token_invalid()));
    }

    #[test]
    fn acls_default_to_empty() {
        let ok: RefreshResponse = serde_json::from_value(json!({ "token": "abc" })).unwrap();
        assert!(ok.acls.is_empty());
    }
}
