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

//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use oauth_relay_types::ProviderEndpoints;

const DEFAULT_GROUPS_CLAIM: &str = "cognito:groups";

/// Configuration for the relay backend.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server (e.g. "0.0.0.0:8080").
    pub listen_addr: String,
    /// Prefix the routes are additionally mounted under (default `/api`).
    /// An empty prefix mounts them only at the root.
    pub api_prefix: String,
    /// How long a fetched key set is served before it is refetched.
    pub jwks_cache_ttl: Duration,
    /// Timeout applied to every outbound call to the provider.
    pub provider_timeout: Duration,
    pub oauth: OAuthConfig,
}

/// Client registration at the identity provider.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Must match the callback registered with the provider.
    pub redirect_uri: String,
    /// Hosted domain of the provider, e.g. `auth.example.com`.
    pub provider_host: String,
    /// Claim holding the user's group memberships.
    pub groups_claim: String,
    /// When set, tokens from any other issuer are rejected before any key
    /// set is fetched.
    pub trusted_issuer: Option<String>,
}

impl OAuthConfig {
    pub fn endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints::new(&self.provider_host)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required
    /// - `OAUTH_CLIENT_ID`
    /// - `OAUTH_CLIENT_SECRET`
    /// - `OAUTH_PROVIDER_HOST` (falls back to `COGNITO_DOMAIN`)
    /// - `OAUTH_REDIRECT_URL`, or `DOMAIN` to derive
    ///   `https://<DOMAIN>/api/oauth/callback`
    ///
    /// # Optional
    /// - `LISTEN_ADDR` (default: `"0.0.0.0:8080"`)
    /// - `API_PREFIX` (default: `"/api"`)
    /// - `OAUTH_GROUPS_CLAIM` (default: `"cognito:groups"`)
    /// - `OAUTH_ISSUER`
    /// - `JWKS_CACHE_TTL_SECS` (default: `"300"`)
    /// - `PROVIDER_TIMEOUT_SECS` (default: `"10"`)
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|s| !s.trim().is_empty());

        let client_id =
            var("OAUTH_CLIENT_ID").ok_or("OAUTH_CLIENT_ID environment variable is required")?;
        let client_secret = var("OAUTH_CLIENT_SECRET")
            .ok_or("OAUTH_CLIENT_SECRET environment variable is required")?;
        let provider_host = var("OAUTH_PROVIDER_HOST")
            .or_else(|| var("COGNITO_DOMAIN"))
            .ok_or("OAUTH_PROVIDER_HOST (or COGNITO_DOMAIN) environment variable is required")?;

        let api_prefix = normalize_prefix(&var("API_PREFIX").unwrap_or_else(|| "/api".to_string()));

        let redirect_uri = match var("OAUTH_REDIRECT_URL") {
            Some(url) => url,
            None => {
                let domain = var("DOMAIN").ok_or("OAUTH_REDIRECT_URL or DOMAIN is required")?;
                format!("https://{domain}{api_prefix}/oauth/callback")
            }
        };

        let jwks_cache_ttl = Duration::from_secs(
            var("JWKS_CACHE_TTL_SECS")
                .unwrap_or_else(|| "300".to_string())
                .parse::<u64>()
                .map_err(|_| "JWKS_CACHE_TTL_SECS must be a valid integer")?,
        );
        let provider_timeout = Duration::from_secs(
            var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|| "10".to_string())
                .parse::<u64>()
                .map_err(|_| "PROVIDER_TIMEOUT_SECS must be a valid integer")?,
        );

        Ok(Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            api_prefix,
            jwks_cache_ttl,
            provider_timeout,
            oauth: OAuthConfig {
                client_id,
                client_secret,
                redirect_uri,
                provider_host,
                groups_claim: var("OAUTH_GROUPS_CLAIM")
                    .unwrap_or_else(|| DEFAULT_GROUPS_CLAIM.to_string()),
                trusted_issuer: var("OAUTH_ISSUER"),
            },
        })
    }
}

/// `"api/"` → `"/api"`, `"/"` → `""`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|k| map.get(k).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("OAUTH_CLIENT_ID", "client"),
        ("OAUTH_CLIENT_SECRET", "secret"),
        ("OAUTH_PROVIDER_HOST", "auth.example.com"),
        ("OAUTH_REDIRECT_URL", "https://app.example.com/api/oauth/callback"),
    ];

    #[test]
    fn defaults_applied() {
        let config = load(REQUIRED).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.provider_timeout, Duration::from_secs(10));
        assert_eq!(config.oauth.groups_claim, "cognito:groups");
        assert_eq!(config.oauth.trusted_issuer, None);
    }

    #[test]
    fn missing_client_id_is_an_error() {
        let err = load(&REQUIRED[1..]).unwrap_err();
        assert!(err.contains("OAUTH_CLIENT_ID"));
    }

    #[test]
    fn cognito_domain_is_accepted_as_provider_host() {
        let config = load(&[
            ("OAUTH_CLIENT_ID", "client"),
            ("OAUTH_CLIENT_SECRET", "secret"),
            ("COGNITO_DOMAIN", "pool.auth.us-east-1.amazoncognito.com"),
            ("DOMAIN", "app.example.com"),
        ])
        .unwrap();
        assert_eq!(config.oauth.provider_host, "pool.auth.us-east-1.amazoncognito.com");
        assert_eq!(
            config.oauth.redirect_uri,
            "https://app.example.com/api/oauth/callback"
        );
    }

    #[test]
    fn redirect_required_without_domain() {
        let err = load(&REQUIRED[..3]).unwrap_err();
        assert!(err.contains("DOMAIN"));
    }

    #[test]
    fn invalid_ttl_is_an_error() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("JWKS_CACHE_TTL_SECS", "soon"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix("api/"), "/api");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("/v1/auth/"), "/v1/auth");
    }
}
