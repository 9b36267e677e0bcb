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

//! `web_sys` implementations of the browser traits.

use std::rc::Rc;

use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{MessageEvent, Storage, Window};

use super::{BrowserHost, PopupHandle, SessionStore};
use crate::config::SessionConfig;
use crate::session::SessionController;

/// The current page.
#[derive(Clone)]
pub struct WebHost {
    window: Window,
}

impl WebHost {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl BrowserHost for WebHost {
    fn origin(&self) -> String {
        self.window.location().origin().unwrap_or_default()
    }

    fn protocol(&self) -> String {
        self.window.location().protocol().unwrap_or_default()
    }

    fn open_popup(&self, url: &str) -> Option<Box<dyn PopupHandle>> {
        match self.window.open_with_url_and_target(url, "_blank") {
            Ok(Some(popup)) => Some(Box::new(WebPopup(popup))),
            Ok(None) => None,
            Err(e) => {
                log::error!("window.open failed: {e:?}");
                None
            }
        }
    }
}

struct WebPopup(Window);

impl PopupHandle for WebPopup {
    fn is_closed(&self) -> bool {
        self.0.closed().unwrap_or(true)
    }

    fn close(&self) {
        let _ = self.0.close();
    }
}

/// `window.sessionStorage`.
pub struct WebSessionStore {
    storage: Storage,
}

impl WebSessionStore {
    /// `None` when storage is disabled (e.g. some private browsing modes).
    pub fn new(window: &Window) -> Option<Self> {
        window
            .session_storage()
            .ok()
            .flatten()
            .map(|storage| Self { storage })
    }
}

impl SessionStore for WebSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set_item(key, value) {
            log::error!("sessionStorage.setItem failed: {e:?}");
        }
    }

    fn remove(&self, key: &str) {
        let _ = self.storage.remove_item(key);
    }
}

/// Forwards the window's `message` events to a controller until dropped.
pub struct MessageListener {
    window: Window,
    closure: Closure<dyn FnMut(MessageEvent)>,
}

impl MessageListener {
    pub fn attach(window: &Window, controller: SessionController) -> Result<Self, JsValue> {
        let closure = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            // Messages from other scripts may not be JSON-shaped at all.
            let Ok(data) = serde_wasm_bindgen::from_value::<Value>(event.data()) else {
                return;
            };
            controller.handle_message(&event.origin(), &data);
        });
        window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())?;

        Ok(Self {
            window: window.clone(),
            closure,
        })
    }
}

impl Drop for MessageListener {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("message", self.closure.as_ref().unchecked_ref());
    }
}

/// Wire a controller to the current window (location, sessionStorage and
/// `message` events), then silently refresh from the stored token.
///
/// Keep the returned listener alive for as long as the controller is used.
pub async fn start_in_window(
    config: SessionConfig,
) -> Result<(SessionController, MessageListener), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let store = WebSessionStore::new(&window)
        .ok_or_else(|| JsValue::from_str("sessionStorage is unavailable"))?;

    let controller = SessionController::new(
        config,
        Rc::new(WebHost::new(window.clone())),
        Rc::new(store),
    );
    let listener = MessageListener::attach(&window, controller.clone())?;
    controller.refresh_stored().await;

    Ok((controller, listener))
}
