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

//! Shared wire types for the OAuth popup relay.
//!
//! This crate defines the contract between the relay backend and the browser
//! session controller: the token bundle forwarded from the identity provider,
//! the `postMessage` bridge payload, the refresh endpoint response, and the
//! token codec used on both sides.
//! It has no axum or browser bindings.

pub mod bundle;
pub mod error;
pub mod jwt;
pub mod message;
pub mod provider;
pub mod responses;
pub mod user;

pub use bundle::{decode_bundle, encode_bundle, TokenBundle};
pub use error::CodecError;
pub use jwt::{decode_compact, DecodedToken};
pub use message::{BridgeMessage, OAUTH_TOKEN_MESSAGE};
pub use provider::ProviderEndpoints;
pub use responses::{ErrorResponse, RefreshReply, RefreshResponse};
pub use user::{parse_tokens, ParsedTokens, User};
