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

//! Access token signature and claims verification.

use std::collections::HashMap;
use std::sync::Arc;

use jsonwebtoken::{decode, Validation};
use oauth_relay_types::DecodedToken;
use serde_json::Value;

use super::jwks::JwksCache;
use crate::config::OAuthConfig;

/// Outcome of verifying one token. Verification never errors: every failure
/// is an `Invalid` with a short reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Valid { subject_id: String, groups: Vec<String> },
    Invalid { reason: String },
}

impl VerificationResult {
    fn invalid(reason: &str) -> Self {
        Self::Invalid {
            reason: reason.to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Settings the verifier needs beyond the key material.
#[derive(Debug, Clone)]
pub struct VerifyOptions<'a> {
    /// Claim holding the group list, e.g. `cognito:groups`.
    pub groups_claim: &'a str,
    /// Only tokens from this issuer are accepted when set.
    pub trusted_issuer: Option<&'a str>,
}

/// Verify `raw` against the issuer's published keys. `token` must be
/// `decode_compact(raw)`; its claims are only read once `raw` has passed.
///
/// Checks, in order: issuer present and trusted, key set resolvable, `kid`
/// present in the set, signature with the key's own algorithm, `exp`, and
/// `iss`. On success the subject and the configured groups claim are
/// returned.
pub async fn verify_token(
    jwks: &JwksCache,
    token: &DecodedToken,
    raw: &str,
    options: &VerifyOptions<'_>,
) -> VerificationResult {
    let Some(issuer) = token.issuer().filter(|i| !i.is_empty()) else {
        tracing::info!("Invalid token. No issuer.");
        return VerificationResult::invalid("token has no issuer");
    };

    if let Some(trusted) = options.trusted_issuer {
        if issuer.trim_end_matches('/') != trusted.trim_end_matches('/') {
            tracing::warn!("Invalid token. Untrusted issuer {issuer}.");
            return VerificationResult::invalid("untrusted issuer");
        }
    }

    let Some(kid) = token.kid() else {
        tracing::info!("Invalid token. Header has no kid.");
        return VerificationResult::invalid("no key found");
    };

    let key = match jwks.get_key(issuer, kid).await {
        Ok(Some(key)) => key,
        Ok(None) => {
            tracing::info!("Invalid token. No key found for kid {kid}.");
            return VerificationResult::invalid("no key found");
        }
        Err(e) => {
            tracing::warn!("Invalid token. Unable to resolve keys for {issuer}: {e}");
            return VerificationResult::invalid("unable to resolve signing keys");
        }
    };

    let mut validation = Validation::new(key.algorithm);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    // Access tokens carry `client_id` rather than `aud`.
    validation.validate_aud = false;
    validation.validate_exp = true;

    if let Err(e) = decode::<HashMap<String, Value>>(raw, &key.key, &validation) {
        tracing::info!("Invalid token. Verification failed: {e}");
        return VerificationResult::invalid("signature/claims verification failed");
    }

    VerificationResult::Valid {
        subject_id: token.subject().unwrap_or_default().to_string(),
        groups: groups_from_claim(token.claim(options.groups_claim)),
    }
}

/// [`verify_token`] bound to a key cache and the relay's settings.
#[derive(Clone)]
pub struct TokenVerifier {
    jwks: Arc<JwksCache>,
    groups_claim: String,
    trusted_issuer: Option<String>,
}

impl TokenVerifier {
    pub fn new(jwks: Arc<JwksCache>, oauth: &OAuthConfig) -> Self {
        Self {
            jwks,
            groups_claim: oauth.groups_claim.clone(),
            trusted_issuer: oauth.trusted_issuer.clone(),
        }
    }

    pub async fn verify(&self, token: &DecodedToken, raw: &str) -> VerificationResult {
        let options = VerifyOptions {
            groups_claim: &self.groups_claim,
            trusted_issuer: self.trusted_issuer.as_deref(),
        };
        verify_token(&self.jwks, token, raw, &options).await
    }
}

/// A groups claim is normally an array of strings; a single string is
/// treated as a one-element list and anything else as no groups.
fn groups_from_claim(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}
