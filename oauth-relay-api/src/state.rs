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

//! Shared application state passed to every Axum handler via `State`.

use std::sync::Arc;

use crate::config::Config;
use crate::oauth::{ExchangeClient, JwksCache, TokenVerifier};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Token endpoint grants with the relay's client credentials.
    pub exchange: ExchangeClient,
    /// Access token verification against the issuer's published keys.
    pub verifier: TokenVerifier,
}

impl AppState {
    /// Builds one outbound HTTP client (with the provider timeout) shared by
    /// the token grants and the key fetches.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.provider_timeout)
            .build()?;

        let jwks = JwksCache::new(http.clone(), config.jwks_cache_ttl);

        Ok(Self {
            exchange: ExchangeClient::new(http, &config.oauth),
            verifier: TokenVerifier::new(jwks, &config.oauth),
            config: Arc::new(config),
        })
    }
}
