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

//! Provider-facing OAuth2 helpers: JWKS caching, access token verification,
//! and the token endpoint grants.

pub mod exchange;
pub mod jwks;
pub mod verify;

pub use exchange::{ExchangeClient, ExchangeError};
pub use jwks::{JwksCache, KeySet, ResolveError, VerificationKey};
pub use verify::{verify_token, TokenVerifier, VerificationResult, VerifyOptions};
