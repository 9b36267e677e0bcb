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

//! REST client for the relay backend's refresh endpoint.

use oauth_relay_types::{ErrorResponse, RefreshReply, RefreshResponse};
use reqwest::{header, Client};

use crate::error::ApiError;

/// Calls the relay backend on the page's own origin.
#[derive(Debug, Clone)]
pub struct RelayApiClient {
    base_url: String,
    http: Client,
}

impl RelayApiClient {
    /// * `base_url` - the page origin, e.g. `"https://app.example.com"`
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// `POST <path>` with the raw refresh token as the body.
    pub async fn refresh(&self, path: &str, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let response = self
            .http
            .post(self.url(path))
            .header(header::CONTENT_TYPE, "text/plain")
            .header(header::ACCEPT, "application/json")
            .body(refresh_token.to_string())
            .send()
            .await?;
        parse_refresh_response(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn parse_refresh_response(response: reqwest::Response) -> Result<RefreshResponse, ApiError> {
    let status = response.status().as_u16();
    match status {
        // Older relays answer a failed refresh with 200 and an `error` body.
        200 => match response.json::<RefreshReply>().await {
            Ok(RefreshReply::Refreshed(refreshed)) => Ok(refreshed),
            Ok(RefreshReply::Failed(failed)) => Err(ApiError::Rejected(failed.error)),
            Err(e) => Err(ApiError::Decode(e.to_string())),
        },
        401 => {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            Err(ApiError::Rejected(message))
        }
        _ => {
            let text = response.text().await.unwrap_or_default();
            Err(ApiError::ServerError { status, body: text })
        }
    }
}
