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

//! Authorization code and refresh token grants against the provider's
//! token endpoint.

use oauth_relay_types::TokenBundle;
use serde::Deserialize;
use thiserror::Error;

use crate::config::OAuthConfig;

/// Why a grant produced no bundle.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The provider answered with an OAuth `error` field (e.g. `invalid_grant`),
    /// whatever the HTTP status.
    #[error("provider returned {code}")]
    Provider {
        code: String,
        description: Option<String>,
    },
    /// Network failure, timeout, or a status with no OAuth error body.
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    /// A success status whose body is not a token response.
    #[error("unreadable token response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Performs both grants with the relay's client credentials.
#[derive(Clone)]
pub struct ExchangeClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl ExchangeClient {
    /// `http` should carry the provider timeout.
    pub fn new(http: reqwest::Client, oauth: &OAuthConfig) -> Self {
        Self {
            http,
            token_url: oauth.endpoints().token_url(),
            client_id: oauth.client_id.clone(),
            client_secret: oauth.client_secret.clone(),
            redirect_uri: oauth.redirect_uri.clone(),
        }
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenBundle, ExchangeError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
        ];
        self.post_grant(&params).await
    }

    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenBundle, ExchangeError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        self.post_grant(&params).await
    }

    async fn post_grant(&self, params: &[(&str, &str)]) -> Result<TokenBundle, ExchangeError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        // Cognito reports grant failures as 400 with an error body, but some
        // providers use 200; check the body first.
        if let Ok(err) = serde_json::from_str::<ProviderErrorBody>(&body) {
            tracing::warn!(
                "Token endpoint returned {}: {}",
                err.error,
                err.error_description.as_deref().unwrap_or("")
            );
            return Err(ExchangeError::Provider {
                code: err.error,
                description: err.error_description,
            });
        }

        if !status.is_success() {
            tracing::error!("OAuth token request failed. Status: {status}, Body: {body}");
            return Err(ExchangeError::Transport(format!("HTTP {status}")));
        }

        serde_json::from_str(&body).map_err(|e| ExchangeError::Malformed(e.to_string()))
    }
}
