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

//! Settings the embedding application passes to the session controller.

use std::time::Duration;

use oauth_relay_types::ProviderEndpoints;

/// sessionStorage key holding the JSON-encoded refresh token.
pub const DEFAULT_STORAGE_KEY: &str = "refreshToken";
pub const DEFAULT_POPUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_POPUP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Where the provider and the relay live, and how long popups may take.
///
/// Relay paths are appended to the page origin. Use
/// [`SessionConfig::with_api_prefix`] when the relay is mounted somewhere
/// other than `/api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub client_id: String,
    /// Hosted domain of the provider, e.g. `auth.example.com`.
    pub provider_host: String,
    /// Sent as `scope`; empty lets the provider apply the client's defaults.
    pub scopes: Vec<String>,
    pub callback_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    pub popup_timeout: Duration,
    pub popup_poll_interval: Duration,
    pub storage_key: String,
}

impl SessionConfig {
    pub fn new(client_id: impl Into<String>, provider_host: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            provider_host: provider_host.into(),
            scopes: Vec::new(),
            callback_path: String::new(),
            refresh_path: String::new(),
            logout_path: String::new(),
            popup_timeout: DEFAULT_POPUP_TIMEOUT,
            popup_poll_interval: DEFAULT_POPUP_POLL_INTERVAL,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
        .with_api_prefix("/api")
    }

    /// Point the three relay paths at `prefix` (`""` for the root).
    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        self.callback_path = format!("{prefix}/oauth/callback");
        self.refresh_path = format!("{prefix}/oauth/refresh");
        self.logout_path = format!("{prefix}/oauth/logout");
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints::new(&self.provider_host)
    }
}
