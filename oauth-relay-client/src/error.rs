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

//! Error types for the session controller and the relay API client.

use std::fmt;

use thiserror::Error;

/// Why a popup flow ended without an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// No message arrived within the popup timeout.
    TimedOut,
    /// The user closed the popup.
    Closed,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => f.write_str("timed out"),
            Self::Closed => f.write_str("closed by the user"),
        }
    }
}

/// Errors returned by [`SessionController`](crate::SessionController) login
/// and logout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Login was attempted from a page not served over `https:`.
    #[error("Login requires a page served over https.")]
    InsecureTransport,

    /// Another login or logout popup is still pending.
    #[error("Another login or logout is already in progress.")]
    OperationInFlight,

    /// The browser refused to open the popup.
    #[error("The popup was blocked by the browser.")]
    PopupBlocked,

    #[error("The popup was abandoned: {0}")]
    PopupAbandoned(AbandonReason),

    /// The popup posted a bundle that could not be decoded.
    #[error("Malformed token bundle: {0}")]
    MalformedBundle(String),

    /// The provider host does not produce a valid URL.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors from calls to the relay backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The relay refused the refresh token or the refreshed token (HTTP 401).
    #[error("Refresh rejected: {0}")]
    Rejected(String),

    /// Any other non-success status, with its body.
    #[error("Server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    /// A network or transport error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A 200 whose body is not a refresh response.
    #[error("Unexpected response: {0}")]
    Decode(String),
}
