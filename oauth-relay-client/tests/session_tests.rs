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

//! Session controller tests against a scripted browser.

#![cfg(not(target_arch = "wasm32"))]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use oauth_relay_client::browser::{BrowserHost, MemoryStore, PopupHandle, SessionStore};
use oauth_relay_client::{
    AbandonReason, SessionConfig, SessionController, SessionError, SessionEvent, SessionPhase,
};
use oauth_relay_types::{encode_bundle, TokenBundle};
use serde_json::{json, Value};

const ORIGIN: &str = "https://app.example.com";

struct FakePopup {
    closed: Rc<Cell<bool>>,
    close_calls: Rc<Cell<u32>>,
}

impl PopupHandle for FakePopup {
    fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn close(&self) {
        self.close_calls.set(self.close_calls.get() + 1);
        self.closed.set(true);
    }
}

/// Records every popup it opens, together with what the store held at that
/// moment.
struct FakeHost {
    protocol: &'static str,
    block_popups: bool,
    store: MemoryStore,
    opened: RefCell<Vec<String>>,
    stored_at_open: RefCell<Vec<Option<String>>>,
    popup_closed: Rc<Cell<bool>>,
    popup_close_calls: Rc<Cell<u32>>,
}

impl FakeHost {
    fn new(store: &MemoryStore) -> Self {
        Self {
            protocol: "https:",
            block_popups: false,
            store: store.clone(),
            opened: RefCell::new(Vec::new()),
            stored_at_open: RefCell::new(Vec::new()),
            popup_closed: Rc::new(Cell::new(false)),
            popup_close_calls: Rc::new(Cell::new(0)),
        }
    }

    fn last_opened(&self) -> String {
        self.opened.borrow().last().cloned().expect("a popup was opened")
    }

    /// `state` query parameter of the last authorize URL.
    fn login_state(&self) -> String {
        let url = self.last_opened();
        let start = url.find("state=").expect("authorize URL has state") + "state=".len();
        url[start..].split('&').next().unwrap_or_default().to_string()
    }
}

impl BrowserHost for FakeHost {
    fn origin(&self) -> String {
        ORIGIN.to_string()
    }

    fn protocol(&self) -> String {
        self.protocol.to_string()
    }

    fn open_popup(&self, url: &str) -> Option<Box<dyn PopupHandle>> {
        if self.block_popups {
            return None;
        }
        self.opened.borrow_mut().push(url.to_string());
        self.stored_at_open
            .borrow_mut()
            .push(self.store.get("refreshToken"));
        self.popup_closed.set(false);
        Some(Box::new(FakePopup {
            closed: self.popup_closed.clone(),
            close_calls: self.popup_close_calls.clone(),
        }))
    }
}

fn unsigned_jwt(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"k1"}"#);
    let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
    format!("{header}.{body}.c2ln")
}

fn test_bundle(refresh_token: Option<&str>) -> String {
    let mut bundle = TokenBundle::with_access_token(unsigned_jwt(json!({ "sub": "u1" })));
    bundle.id_token = Some(unsigned_jwt(json!({
        "sub": "u1",
        "name": "Ada Lovelace",
        "email": "ada@example.com",
    })));
    bundle.refresh_token = refresh_token.map(str::to_string);
    encode_bundle(&bundle)
}

fn token_message(token: &str, state: &str) -> Value {
    json!({ "type": "oauth-token", "token": token, "state": state })
}

fn controller(host: &Rc<FakeHost>, store: &MemoryStore) -> SessionController {
    SessionController::new(
        SessionConfig::new("client123", "auth.example.com"),
        host.clone(),
        Rc::new(store.clone()),
    )
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_login_completes_from_callback_message() {
    let store = MemoryStore::new();
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let order = Rc::new(RefCell::new(Vec::new()));
    for tag in ["first", "second"] {
        let order = order.clone();
        session.on_login(move |user| order.borrow_mut().push(format!("{tag}:{}", user.name)));
    }
    let mut events = session.subscribe();

    let driver = async {
        sleep_secs(1).await;
        assert_eq!(session.state().phase, SessionPhase::Authenticating);
        let message = token_message(&test_bundle(Some("r1")), &host.login_state());
        session.handle_message(ORIGIN, &message);
    };
    let (result, ()) = futures::join!(session.login(), driver);

    let user = result.unwrap();
    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(user.id, "u1");
    assert!(session.is_signed_in());
    assert!(session.state().bearer_token.is_some());
    assert_eq!(store.get("refreshToken").as_deref(), Some("\"r1\""));
    assert_eq!(
        *order.borrow(),
        vec!["first:Ada Lovelace", "second:Ada Lovelace"]
    );

    let url = host.last_opened();
    assert!(url.starts_with("https://auth.example.com/oauth2/authorize?response_type=code"));
    assert!(url.contains("client_id=client123"));
    assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fapi%2Foauth%2Fcallback"));

    let mut phases = Vec::new();
    while let Ok(SessionEvent::StateChanged(state)) = events.try_recv() {
        phases.push(state.phase);
    }
    assert_eq!(
        phases,
        vec![SessionPhase::Authenticating, SessionPhase::SignedIn]
    );
}

#[tokio::test(start_paused = true)]
async fn test_foreign_origin_message_is_ignored() {
    let store = MemoryStore::new();
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let driver = async {
        sleep_secs(1).await;
        let message = token_message(&test_bundle(Some("r1")), &host.login_state());
        session.handle_message("https://evil.example.com", &message);
        assert!(!session.is_signed_in());
    };
    let (result, ()) = futures::join!(session.login(), driver);

    assert_eq!(
        result,
        Err(SessionError::PopupAbandoned(AbandonReason::TimedOut))
    );
    assert!(!session.is_signed_in());
    assert_eq!(store.get("refreshToken"), None);
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_state_is_ignored() {
    let store = MemoryStore::new();
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let driver = async {
        sleep_secs(1).await;
        session.handle_message(ORIGIN, &token_message(&test_bundle(None), "forged"));
        assert!(!session.is_signed_in());
        sleep_secs(1).await;
        host.popup_closed.set(true);
    };
    let (result, ()) = futures::join!(session.login(), driver);

    assert_eq!(
        result,
        Err(SessionError::PopupAbandoned(AbandonReason::Closed))
    );
}

#[tokio::test(start_paused = true)]
async fn test_closed_popup_abandons_login() {
    let store = MemoryStore::new();
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let driver = async {
        sleep_secs(3).await;
        host.popup_closed.set(true);
    };
    let (result, ()) = futures::join!(session.login(), driver);

    assert_eq!(
        result,
        Err(SessionError::PopupAbandoned(AbandonReason::Closed))
    );
    assert_eq!(session.state().phase, SessionPhase::SignedOut);
    assert_eq!(host.popup_close_calls.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_login_times_out_and_closes_popup() {
    let store = MemoryStore::new();
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let start = tokio::time::Instant::now();
    let result = session.login().await;

    assert_eq!(
        result,
        Err(SessionError::PopupAbandoned(AbandonReason::TimedOut))
    );
    assert!(start.elapsed() >= Duration::from_secs(300));
    assert_eq!(host.popup_close_calls.get(), 1);
    assert_eq!(session.state().phase, SessionPhase::SignedOut);

    // The controller accepts a new flow afterwards.
    let driver = async {
        sleep_secs(1).await;
        host.popup_closed.set(true);
    };
    let (retry, ()) = futures::join!(session.login(), driver);
    assert_eq!(
        retry,
        Err(SessionError::PopupAbandoned(AbandonReason::Closed))
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_login_is_rejected_while_pending() {
    let store = MemoryStore::new();
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let second = async {
        sleep_secs(1).await;
        let second = session.login().await;
        let logout = session.logout().await;
        session.handle_message(
            ORIGIN,
            &token_message(&test_bundle(None), &host.login_state()),
        );
        (second, logout)
    };
    let (first, (second, logout)) = futures::join!(session.login(), second);

    assert!(first.is_ok());
    assert_eq!(second, Err(SessionError::OperationInFlight));
    assert_eq!(logout, Err(SessionError::OperationInFlight));
    assert_eq!(host.opened.borrow().len(), 1);
}

#[tokio::test]
async fn test_login_over_http_is_rejected() {
    let store = MemoryStore::new();
    let mut fake = FakeHost::new(&store);
    fake.protocol = "http:";
    let host = Rc::new(fake);
    let session = controller(&host, &store);

    assert_eq!(session.login().await, Err(SessionError::InsecureTransport));
    assert!(host.opened.borrow().is_empty());
}

#[tokio::test]
async fn test_blocked_popup_does_not_leave_an_operation_pending() {
    let store = MemoryStore::new();
    let mut fake = FakeHost::new(&store);
    fake.block_popups = true;
    let host = Rc::new(fake);
    let session = controller(&host, &store);

    assert_eq!(session.login().await, Err(SessionError::PopupBlocked));
    assert_eq!(session.login().await, Err(SessionError::PopupBlocked));
    assert_eq!(session.state().phase, SessionPhase::SignedOut);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_bundle_fails_login() {
    let store = MemoryStore::new();
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let driver = async {
        sleep_secs(1).await;
        session.handle_message(ORIGIN, &token_message("***", &host.login_state()));
    };
    let (result, ()) = futures::join!(session.login(), driver);

    assert!(matches!(result, Err(SessionError::MalformedBundle(_))));
    assert_eq!(session.state().phase, SessionPhase::SignedOut);
}

#[tokio::test(start_paused = true)]
async fn test_logout_clears_storage_before_popup_opens() {
    let store = MemoryStore::new();
    store.set("refreshToken", "\"r1\"");
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);
    let mut events = session.subscribe();

    let driver = async {
        sleep_secs(1).await;
        assert_eq!(session.state().phase, SessionPhase::LoggingOut);
        session.handle_message(
            ORIGIN,
            &json!({ "type": "oauth-token", "token": "", "idToken": "" }),
        );
    };
    let (result, ()) = futures::join!(session.logout(), driver);

    assert_eq!(result, Ok(()));
    assert_eq!(*host.stored_at_open.borrow(), vec![None]);
    assert_eq!(store.get("refreshToken"), None);
    assert_eq!(session.state().phase, SessionPhase::SignedOut);

    let url = host.last_opened();
    assert!(url.starts_with("https://auth.example.com/logout?client_id=client123"));
    assert!(url.contains("logout_uri=https%3A%2F%2Fapp.example.com%2Fapi%2Foauth%2Flogout"));

    let mut phases = Vec::new();
    while let Ok(SessionEvent::StateChanged(state)) = events.try_recv() {
        phases.push(state.phase);
    }
    assert_eq!(phases, vec![SessionPhase::LoggingOut, SessionPhase::SignedOut]);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_logout_still_signs_out() {
    let store = MemoryStore::new();
    store.set("refreshToken", "\"r1\"");
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let driver = async {
        sleep_secs(2).await;
        host.popup_closed.set(true);
    };
    let (result, ()) = futures::join!(session.logout(), driver);

    assert_eq!(
        result,
        Err(SessionError::PopupAbandoned(AbandonReason::Closed))
    );
    assert_eq!(session.state().phase, SessionPhase::SignedOut);
    assert_eq!(store.get("refreshToken"), None);
}

#[tokio::test]
async fn test_messages_of_other_types_are_ignored() {
    let store = MemoryStore::new();
    store.set("refreshToken", "\"r1\"");
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    session.handle_message(ORIGIN, &json!({ "type": "webpack-ok" }));
    session.handle_message(ORIGIN, &json!("plain string"));
    // An unsolicited bundle, with no login pending, is dropped too.
    session.handle_message(ORIGIN, &token_message(&test_bundle(Some("r2")), "any"));

    assert!(!session.is_signed_in());
    assert_eq!(store.get("refreshToken").as_deref(), Some("\"r1\""));
}

#[tokio::test(start_paused = true)]
async fn test_logout_acknowledgement_does_not_interrupt_login() {
    let store = MemoryStore::new();
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let driver = async {
        sleep_secs(1).await;
        session.handle_message(ORIGIN, &json!({ "type": "oauth-token", "token": "", "idToken": "" }));
        assert_eq!(session.state().phase, SessionPhase::Authenticating);

        session.handle_message(
            ORIGIN,
            &token_message(&test_bundle(Some("r1")), &host.login_state()),
        );
    };
    let (result, ()) = futures::join!(session.login(), driver);

    assert_eq!(result.map(|user| user.name), Ok("Ada Lovelace".to_string()));
    assert_eq!(session.state().phase, SessionPhase::SignedIn);
    assert_eq!(store.get("refreshToken").as_deref(), Some("\"r1\""));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_logout_still_clears_stored_token() {
    let store = MemoryStore::new();
    store.set("refreshToken", "\"r0\"");
    let host = Rc::new(FakeHost::new(&store));
    let session = controller(&host, &store);

    let driver = async {
        sleep_secs(1).await;
        let logout = session.logout().await;
        host.popup_closed.set(true);
        logout
    };
    let (login, logout) = futures::join!(session.login(), driver);

    assert_eq!(logout, Err(SessionError::OperationInFlight));
    assert_eq!(
        login,
        Err(SessionError::PopupAbandoned(AbandonReason::Closed))
    );
    assert_eq!(store.get("refreshToken"), None);
}
