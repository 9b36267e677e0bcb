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

//! JWKS (JSON Web Key Set) resolution with a per-issuer cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use oauth_relay_types::provider::jwks_url;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// A cached set younger than this is not refetched on an unknown `kid`.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

/// Failure to obtain an issuer's key set.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("JWKS fetch failed: {0}")]
    Network(String),
    #[error("JWKS fetch returned HTTP {0}")]
    Status(u16),
    #[error("Failed to parse JWKS: {0}")]
    Malformed(String),
}

/// A JWK entry from the JWKS endpoint.
#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    alg: Option<String>,
    // RSA fields
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    // EC fields
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JwkEntry>,
}

/// Key material for one `kid`, together with the only algorithm it may
/// verify.
#[derive(Clone)]
pub struct VerificationKey {
    pub algorithm: Algorithm,
    pub key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Verification keys of one issuer, indexed by key identifier.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, VerificationKey>,
}

impl KeySet {
    pub fn insert(&mut self, kid: impl Into<String>, key: VerificationKey) {
        self.keys.insert(kid.into(), key);
    }

    /// Exact match on `kid`; there is no fallback to other keys.
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.keys.keys()).finish()
    }
}

/// Fetch `<issuer>/.well-known/jwks.json` and convert every usable key.
///
/// Keys without a `kid`, of an unsupported type, or with missing components
/// are skipped.
pub async fn fetch_key_set(http: &reqwest::Client, issuer: &str) -> Result<KeySet, ResolveError> {
    let url = jwks_url(issuer);
    tracing::debug!("Fetching JWKS from {url}");

    let resp = http
        .get(&url)
        .send()
        .await
        .map_err(|e| ResolveError::Network(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(ResolveError::Status(resp.status().as_u16()));
    }

    let doc: JwksDocument = resp
        .json()
        .await
        .map_err(|e| ResolveError::Malformed(e.to_string()))?;

    let mut set = KeySet::default();
    for jwk in &doc.keys {
        let Some(kid) = jwk.kid.as_deref().filter(|k| !k.is_empty()) else {
            continue;
        };

        match decoding_key(jwk) {
            Some(key) => set.insert(
                kid,
                VerificationKey {
                    algorithm: jwk_algorithm(jwk),
                    key,
                },
            ),
            None => tracing::warn!("Skipping unusable JWK {kid} (kty {})", jwk.kty),
        }
    }

    Ok(set)
}

fn decoding_key(jwk: &JwkEntry) -> Option<DecodingKey> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref().filter(|s| !s.is_empty())?;
            let e = jwk.e.as_deref().filter(|s| !s.is_empty())?;
            DecodingKey::from_rsa_components(n, e).ok()
        }
        "EC" => {
            let x = jwk.x.as_deref().filter(|s| !s.is_empty())?;
            let y = jwk.y.as_deref().filter(|s| !s.is_empty())?;
            DecodingKey::from_ec_components(x, y).ok()
        }
        _ => None,
    }
}

/// Determine the JWT algorithm for a JWK entry.
fn jwk_algorithm(jwk: &JwkEntry) -> Algorithm {
    if let Some(alg) = &jwk.alg {
        match alg.as_str() {
            "RS384" => return Algorithm::RS384,
            "RS512" => return Algorithm::RS512,
            "ES256" => return Algorithm::ES256,
            "ES384" => return Algorithm::ES384,
            "RS256" => return Algorithm::RS256,
            _ if jwk.kty == "RSA" => return Algorithm::RS256,
            _ => {}
        }
    }
    // Default based on key type.
    match jwk.kty.as_str() {
        "EC" => match jwk.crv.as_deref() {
            Some("P-384") => Algorithm::ES384,
            _ => Algorithm::ES256,
        },
        _ => Algorithm::RS256,
    }
}

struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Caches key sets per issuer.
///
/// Entries older than the TTL are refetched on access. When that refetch
/// fails the previous set keeps being served. Concurrent misses may fetch
/// the same issuer twice; the last write wins.
pub struct JwksCache {
    http: reqwest::Client,
    ttl: Duration,
    min_refetch_interval: Duration,
    entries: RwLock<HashMap<String, CachedKeySet>>,
}

impl JwksCache {
    pub fn new(http: reqwest::Client, ttl: Duration) -> Arc<Self> {
        Self::with_refetch_interval(http, ttl, MIN_REFETCH_INTERVAL)
    }

    /// Like [`JwksCache::new`], with a custom minimum age before an unknown
    /// `kid` forces a refetch.
    pub fn with_refetch_interval(
        http: reqwest::Client,
        ttl: Duration,
        min_refetch_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            http,
            ttl,
            min_refetch_interval,
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Create a test-only JwksCache with a pre-loaded issuer (no HTTP fetching
    /// until the entry expires).
    #[cfg(test)]
    pub fn with_keys(issuer: &str, keys: KeySet) -> Arc<Self> {
        let cache = Self::new(reqwest::Client::new(), Duration::from_secs(3600));
        cache.entries.try_write().expect("fresh lock").insert(
            issuer.to_string(),
            CachedKeySet {
                keys: Arc::new(keys),
                fetched_at: Instant::now(),
            },
        );
        cache
    }

    /// Key set for `issuer`, from cache when fresh.
    pub async fn key_set(&self, issuer: &str) -> Result<Arc<KeySet>, ResolveError> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(issuer) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.keys.clone());
                }
            }
        }

        self.refresh(issuer).await
    }

    /// Look up `kid` in the issuer's key set. An unknown `kid` triggers one
    /// refetch when the cached set is older than the minimum refetch interval
    /// (60 s by default), so
    /// rotated keys are picked up; `Ok(None)` means the key does not exist.
    pub async fn get_key(
        &self,
        issuer: &str,
        kid: &str,
    ) -> Result<Option<VerificationKey>, ResolveError> {
        let keys = self.key_set(issuer).await?;
        if let Some(key) = keys.get(kid) {
            return Ok(Some(key.clone()));
        }

        let stale_enough = {
            let entries = self.entries.read().await;
            entries
                .get(issuer)
                .map(|e| e.fetched_at.elapsed() >= self.min_refetch_interval)
                .unwrap_or(true)
        };
        if !stale_enough {
            return Ok(None);
        }

        tracing::info!("kid {kid} not in cached JWKS for {issuer}; refetching");
        let keys = self.refresh(issuer).await?;
        Ok(keys.get(kid).cloned())
    }

    /// Fetch and store the issuer's key set, falling back to the previous
    /// set when the fetch fails.
    async fn refresh(&self, issuer: &str) -> Result<Arc<KeySet>, ResolveError> {
        match fetch_key_set(&self.http, issuer).await {
            Ok(keys) => {
                let keys = Arc::new(keys);
                self.entries.write().await.insert(
                    issuer.to_string(),
                    CachedKeySet {
                        keys: keys.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(keys)
            }
            Err(err) => {
                let entries = self.entries.read().await;
                match entries.get(issuer) {
                    Some(previous) => {
                        tracing::warn!("{err}; serving cached JWKS for {issuer}");
                        Ok(previous.keys.clone())
                    }
                    None => Err(err),
                }
            }
        }
    }
}
