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

//! OAuth popup relay server entry point.
//!
//! A standalone Axum service that exchanges authorization codes and refresh
//! tokens with the identity provider and hands verified bundles to the
//! browser.

use oauth_relay_api::config::Config;
use oauth_relay_api::routes;
use oauth_relay_api::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().expect("failed to load configuration");
    let listen_addr = config.listen_addr.clone();

    tracing::info!(
        "Relaying for client {} via {}",
        config.oauth.client_id,
        config.oauth.endpoints().base_url()
    );

    let state = AppState::new(config).expect("failed to build HTTP client");
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!("OAuth relay listening on {listen_addr}");

    axum::serve(listener, app).await.expect("server error");
}
