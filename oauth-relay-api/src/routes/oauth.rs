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

//! OAuth route handlers: callback, refresh, logout.
//!
//! The callback and logout endpoints are opened in a popup by the browser
//! client. They answer with a small HTML page that hands its result to the
//! opener through `postMessage` and then closes itself. The refresh endpoint
//! is a plain JSON API.

use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use oauth_relay_types::{decode_compact, encode_bundle, BridgeMessage, RefreshResponse, TokenBundle};
use serde::Deserialize;

use crate::error::AppError;
use crate::oauth::VerificationResult;
use crate::state::AppState;

const EXCHANGE_FAILED: &str = "Error exchanging code for token";
const TOKEN_INVALID: &str = "Token is invalid";
const MISSING_CODE: &str = "Missing authorization code";
const SIGN_IN_REFUSED: &str = "Sign-in was not completed";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET /oauth/callback?code=...&state=...
///
/// Exchanges the code, verifies the returned access token and posts the
/// base64 bundle to the opener together with the caller's `state`. Any
/// failure renders a static error page that posts nothing.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Html<String> {
    tracing::info!("Handling callback");

    if let Some(error) = query.error.as_deref() {
        tracing::warn!(
            "Provider redirected with error {error}: {}",
            query.error_description.as_deref().unwrap_or("")
        );
        return error_page(SIGN_IN_REFUSED);
    }

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        tracing::warn!("Callback without an authorization code");
        return error_page(MISSING_CODE);
    };

    let bundle = match state.exchange.exchange_code(code).await {
        Ok(bundle) => bundle,
        Err(e) => {
            tracing::warn!("Error exchanging code for token: {e}");
            return error_page(EXCHANGE_FAILED);
        }
    };

    if let VerificationResult::Invalid { reason } = verify_bundle(&state, &bundle).await {
        tracing::warn!("Token is invalid: {reason}");
        return error_page(TOKEN_INVALID);
    }

    let message = BridgeMessage::token(encode_bundle(&bundle), query.state);
    match bridge_page("Logging you in...", &message, Some(1000)) {
        Ok(page) => page,
        Err(e) => {
            tracing::error!("Failed to render callback page: {e}");
            error_page(EXCHANGE_FAILED)
        }
    }
}

/// POST /oauth/refresh
///
/// The body is the raw refresh token. Responds with the new bundle and the
/// verified access token's groups as `acls`.
pub async fn refresh(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<RefreshResponse>, AppError> {
    tracing::info!("Handling refresh");

    let refresh_token = body.trim();
    if refresh_token.is_empty() {
        return Err(AppError::bad_request("Refresh token is required"));
    }

    let bundle = state.exchange.exchange_refresh_token(refresh_token).await?;

    match verify_bundle(&state, &bundle).await {
        VerificationResult::Valid { subject_id, groups } => {
            tracing::debug!("Refreshed token for {subject_id}");
            Ok(Json(RefreshResponse {
                token: encode_bundle(&bundle),
                acls: groups,
            }))
        }
        VerificationResult::Invalid { reason } => {
            tracing::warn!("Refreshed token is invalid: {reason}");
            Err(AppError::token_invalid())
        }
    }
}

/// GET /oauth/logout
///
/// Target of the provider's `logout_uri` redirect. Tells the opener the
/// session is gone.
pub async fn logout() -> Html<String> {
    tracing::info!("Handling logout");
    bridge_page("Logging you out...", &BridgeMessage::logged_out(), None)
        .unwrap_or_else(|_| error_page("Logged out"))
}

async fn verify_bundle(state: &AppState, bundle: &TokenBundle) -> VerificationResult {
    match decode_compact(&bundle.access_token) {
        Ok(decoded) => state.verifier.verify(&decoded, &bundle.access_token).await,
        Err(e) => VerificationResult::Invalid {
            reason: e.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Page helpers
// ---------------------------------------------------------------------------

/// Serialize `message` for embedding inside a `<script>` element.
fn script_json(message: &BridgeMessage) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(message)?.replace('<', "\\u003c"))
}

/// Page that posts `message` to the opener (restricted to this page's own
/// origin) and closes itself, immediately or after `close_after_ms`.
fn bridge_page(
    text: &str,
    message: &BridgeMessage,
    close_after_ms: Option<u32>,
) -> Result<Html<String>, serde_json::Error> {
    let json = script_json(message)?;
    let close = match close_after_ms {
        Some(ms) => format!("setTimeout(() => {{ window.close(); }}, {ms});"),
        None => "window.close();".to_string(),
    };
    Ok(Html(format!(
        "<!DOCTYPE html><html><body>{text}<script>\
         if (window.opener) {{ window.opener.postMessage({json}, window.location.origin); }} \
         {close}</script></body></html>"
    )))
}

fn error_page(text: &str) -> Html<String> {
    Html(format!("<!DOCTYPE html><html><body>{text}</body></html>"))
}
