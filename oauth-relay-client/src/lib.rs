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

//! Browser session controller for the OAuth popup relay.
//!
//! Works on WASM (browser) and native targets. On native the browser is
//! supplied through the [`browser`] traits, which is how the tests drive it.
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use oauth_relay_client::{SessionConfig, SessionController};
//! use oauth_relay_client::browser::{BrowserHost, MemoryStore};
//!
//! # async fn example(host: Rc<dyn BrowserHost>) -> Result<(), oauth_relay_client::SessionError> {
//! let config = SessionConfig::new("client123", "auth.example.com");
//! let session = SessionController::start(config, host, Rc::new(MemoryStore::new())).await;
//!
//! session.on_login(|user| log::info!("Logged in as {}", user.name));
//! if !session.is_signed_in() {
//!     session.login().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod platform;
pub mod session;

pub use api::RelayApiClient;
pub use config::SessionConfig;
pub use error::{AbandonReason, ApiError, SessionError};
pub use oauth_relay_types;
pub use session::{RefreshOutcome, SessionController, SessionEvent, SessionPhase, SessionState};
