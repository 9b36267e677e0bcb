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

//! The parts of the browser the session controller talks to.
//!
//! On wasm32 these are implemented over `web_sys` in [`web`]. Everywhere else
//! the embedding code (or a test) supplies its own implementations; an
//! in-memory [`SessionStore`] is provided.

#[cfg(target_arch = "wasm32")]
pub mod web;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A window opened by [`BrowserHost::open_popup`].
pub trait PopupHandle {
    fn is_closed(&self) -> bool;
    fn close(&self);
}

/// The page the controller runs in.
pub trait BrowserHost {
    /// `window.location.origin`, e.g. `https://app.example.com`.
    fn origin(&self) -> String;
    /// `window.location.protocol`, including the colon.
    fn protocol(&self) -> String;
    /// Open `url` in a new browsing context. `None` when the popup was
    /// blocked.
    fn open_popup(&self, url: &str) -> Option<Box<dyn PopupHandle>>;
}

/// String key/value storage scoped to the browser tab (`sessionStorage`).
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// [`SessionStore`] held in memory. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }
}

/// Read the JSON-encoded refresh token. Unparseable or empty entries read
/// as absent.
pub fn load_refresh_token(store: &dyn SessionStore, key: &str) -> Option<String> {
    let raw = store.get(key)?;
    match serde_json::from_str::<String>(&raw) {
        Ok(token) if !token.is_empty() => Some(token),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Ignoring unreadable stored refresh token: {e}");
            None
        }
    }
}

pub fn store_refresh_token(store: &dyn SessionStore, key: &str, token: &str) {
    match serde_json::to_string(token) {
        Ok(json) => store.set(key, &json),
        Err(e) => log::error!("Failed to encode refresh token: {e}"),
    }
}

pub fn clear_refresh_token(store: &dyn SessionStore, key: &str) {
    store.remove(key);
}
