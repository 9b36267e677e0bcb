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

//! Application error type that implements Axum's `IntoResponse`.
//!
//! Every error is returned as a JSON [`ErrorResponse`] paired with the
//! appropriate HTTP status code. Internal errors never echo their detail to
//! the caller; the detail is logged instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use oauth_relay_types::ErrorResponse;

/// Application-level error that pairs an HTTP status code with an [`ErrorResponse`].
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl AppError {
    pub fn new(status: StatusCode, body: ErrorResponse) -> Self {
        Self { status, body }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorResponse::new(message))
    }

    pub fn token_invalid() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorResponse::token_invalid())
    }

    pub fn refresh_rejected() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorResponse::refresh_rejected())
    }

    /// Generic 500. `detail` goes to the log, not to the response.
    pub fn internal(detail: &str) -> Self {
        tracing::error!("Internal error: {detail}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::internal())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<crate::oauth::ExchangeError> for AppError {
    fn from(err: crate::oauth::ExchangeError) -> Self {
        match err {
            crate::oauth::ExchangeError::Provider { code, .. } => {
                tracing::warn!("Provider rejected the grant: {code}");
                Self::refresh_rejected()
            }
            other => Self::internal(&other.to_string()),
        }
    }
}
