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

//! Axum router configuration for the relay API.

pub mod oauth;

use std::any::Any;

use axum::{
    http::{header, HeaderName, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::error::AppError;
use crate::state::AppState;

/// The three relay endpoints, unprefixed.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/oauth/callback", get(oauth::callback))
        .route("/oauth/refresh", post(oauth::refresh))
        .route("/oauth/logout", get(oauth::logout))
}

/// Full application: the endpoints mounted under `api_prefix` and at the
/// root, with CORS, request tracing and panic recovery.
pub fn app(state: AppState) -> Router {
    let prefix = state.config.api_prefix.clone();

    let routes = if prefix.is_empty() {
        router()
    } else {
        Router::new().nest(&prefix, router()).merge(router())
    };

    routes
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// `Access-Control-Allow-Origin: *` with the methods and headers the
/// browser client and API gateways send.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-amz-date"),
            HeaderName::from_static("x-amz-security-token"),
        ])
}

fn handle_panic(_err: Box<dyn Any + Send + 'static>) -> Response {
    AppError::internal("request handler panicked").into_response()
}
