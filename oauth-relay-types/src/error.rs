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

//! Decode errors for compact tokens and transport bundles.

use thiserror::Error;

/// Failure to decode a token or a bundle. Both are fatal to the flow that
/// produced them; there is no partial result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The compact token is missing segments or a segment is not
    /// base64-encoded JSON.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The base64 bundle could not be decoded into a token response.
    #[error("malformed bundle: {0}")]
    MalformedBundle(String),
}

impl CodecError {
    pub(crate) fn token(detail: impl std::fmt::Display) -> Self {
        Self::MalformedToken(detail.to_string())
    }

    pub(crate) fn bundle(detail: impl std::fmt::Display) -> Self {
        Self::MalformedBundle(detail.to_string())
    }
}
