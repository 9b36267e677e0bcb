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

//! Payload posted from the relay's popup pages to the opener window.

use serde::{Deserialize, Serialize};

/// `type` discriminant of the only message the bridge recognizes.
pub const OAUTH_TOKEN_MESSAGE: &str = "oauth-token";

/// A message sent through `window.opener.postMessage`.
///
/// ```json
/// { "type": "oauth-token", "token": "<base64 bundle>", "state": "..." }
/// ```
///
/// The logout page sends the same type with an empty `token` and `idToken`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "oauth-token")]
    OAuthToken {
        #[serde(default)]
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(rename = "idToken", default, skip_serializing_if = "Option::is_none")]
        id_token: Option<String>,
    },
}

impl BridgeMessage {
    /// Message carrying a freshly exchanged bundle.
    pub fn token(token: String, state: Option<String>) -> Self {
        Self::OAuthToken {
            token,
            state,
            id_token: None,
        }
    }

    /// Message the logout page posts once the provider session is gone.
    pub fn logged_out() -> Self {
        Self::OAuthToken {
            token: String::new(),
            state: None,
            id_token: Some(String::new()),
        }
    }

    /// Parse an arbitrary `MessageEvent.data` value. Anything that is not an
    /// `oauth-token` message yields `None`.
    pub fn from_value(data: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }
}
