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

//! Endpoint layout of a Cognito-style hosted identity provider.

use url::Url;

/// URLs of the provider's hosted endpoints, derived from its host name.
///
/// A bare host (`auth.example.com`) is served over `https`; a host that
/// already carries a scheme (`http://127.0.0.1:9000`) is used as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    base: String,
}

impl ProviderEndpoints {
    pub fn new(provider_host: &str) -> Self {
        let host = provider_host.trim().trim_end_matches('/');
        let base = if host.starts_with("https://") || host.starts_with("http://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        Self { base }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// `POST` endpoint for both authorization-code and refresh-token grants.
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.base)
    }

    /// Authorization endpoint the login popup is pointed at.
    ///
    /// Parameters are URL-encoded; `scope` is omitted when `scopes` is empty
    /// and `state` when `None`.
    pub fn authorize_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
        state: Option<&str>,
    ) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&format!("{}/oauth2/authorize", self.base))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("response_type", "code");
            pairs.append_pair("client_id", client_id);
            pairs.append_pair("redirect_uri", redirect_uri);
            if !scopes.is_empty() {
                pairs.append_pair("scope", &scopes.join(" "));
            }
            if let Some(s) = state {
                pairs.append_pair("state", s);
            }
        }
        Ok(url.to_string())
    }

    /// Hosted logout endpoint; the provider redirects to `logout_uri` when done.
    pub fn logout_url(&self, client_id: &str, logout_uri: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&format!("{}/logout", self.base))?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("logout_uri", logout_uri);
        Ok(url.to_string())
    }
}

/// Location of an issuer's published key set.
pub fn jwks_url(issuer: &str) -> String {
    format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
}
