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

//! Browser-side session state and the popup login/logout flows.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender};
use futures::channel::oneshot;
use futures::future::{select, Either};
use oauth_relay_types::{parse_tokens, BridgeMessage, ParsedTokens, User};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

use crate::api::RelayApiClient;
use crate::browser::{
    clear_refresh_token, load_refresh_token, store_refresh_token, BrowserHost, PopupHandle,
    SessionStore,
};
use crate::config::SessionConfig;
use crate::error::{AbandonReason, ApiError, SessionError};
use crate::platform;

/// Capacity of the per-controller event channel. Slow subscribers lose the
/// oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Length of the `state` parameter sent with each login.
const LOGIN_STATE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    SignedOut,
    /// A login popup is open.
    Authenticating,
    SignedIn,
    /// A logout popup is open. The session is already cleared locally.
    LoggingOut,
}

/// Snapshot of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub authenticated: bool,
    pub user: Option<User>,
    /// Group claims reported by the relay on refresh.
    pub acls: Vec<String>,
    /// Access token to send as `Authorization: Bearer` to protected APIs.
    pub bearer_token: Option<String>,
}

impl SessionState {
    fn signed_out() -> Self {
        Self {
            phase: SessionPhase::SignedOut,
            authenticated: false,
            user: None,
            acls: Vec::new(),
            bearer_token: None,
        }
    }
}

/// Events delivered to [`SessionController::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
}

/// Result of a silent refresh. Refresh failures are never errors; the
/// session simply stays signed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(User),
    /// The relay refused the refresh token. The stored token is discarded.
    Rejected(String),
    /// Network failure, server error, or an undecodable bundle.
    Failed(String),
    /// The session was signed out while the request was in flight. The
    /// response was dropped.
    Superseded,
}

enum PendingOperation {
    Login {
        state: String,
        done: oneshot::Sender<Result<User, SessionError>>,
    },
    Logout {
        done: oneshot::Sender<()>,
    },
}

struct Inner {
    state: SessionState,
    /// Bumped on every sign-out. Refresh responses from an older epoch are
    /// dropped.
    epoch: u64,
    pending: Option<PendingOperation>,
    login_callbacks: Vec<Rc<dyn Fn(&User)>>,
}

/// Owns the browser's authentication state.
///
/// Cheap to clone; clones share state. Construct with
/// [`SessionController::start`] (or [`SessionController::new`] followed by
/// [`SessionController::refresh_stored`]) and feed every `message` event of
/// the window to [`SessionController::handle_message`]. On wasm32,
/// `browser::web::start_in_window` does all of this.
#[derive(Clone)]
pub struct SessionController {
    config: Rc<SessionConfig>,
    host: Rc<dyn BrowserHost>,
    store: Rc<dyn SessionStore>,
    api: RelayApiClient,
    events: Sender<SessionEvent>,
    _events_keepalive: Rc<InactiveReceiver<SessionEvent>>,
    inner: Rc<RefCell<Inner>>,
}

impl PartialEq for SessionController {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        host: Rc<dyn BrowserHost>,
        store: Rc<dyn SessionStore>,
    ) -> Self {
        let (mut events, receiver) = broadcast(EVENT_CHANNEL_CAPACITY);
        events.set_overflow(true);

        Self {
            api: RelayApiClient::new(&host.origin()),
            config: Rc::new(config),
            host,
            store,
            events,
            _events_keepalive: Rc::new(receiver.deactivate()),
            inner: Rc::new(RefCell::new(Inner {
                state: SessionState::signed_out(),
                epoch: 0,
                pending: None,
                login_callbacks: Vec::new(),
            })),
        }
    }

    /// Construct the controller and silently refresh the session when a
    /// refresh token survives from an earlier page load.
    pub async fn start(
        config: SessionConfig,
        host: Rc<dyn BrowserHost>,
        store: Rc<dyn SessionStore>,
    ) -> Self {
        let controller = Self::new(config, host, store);
        controller.refresh_stored().await;
        controller
    }

    /// Refresh with the stored refresh token, if there is one.
    pub async fn refresh_stored(&self) -> Option<RefreshOutcome> {
        let token = load_refresh_token(self.store.as_ref(), &self.config.storage_key)?;
        Some(self.refresh_on_load(&token).await)
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.events.new_receiver()
    }

    /// Register `callback` to run on every successful login, after earlier
    /// registrations.
    pub fn on_login<F>(&self, callback: F)
    where
        F: Fn(&User) + 'static,
    {
        self.inner
            .borrow_mut()
            .login_callbacks
            .push(Rc::new(callback));
    }

    pub fn state(&self) -> SessionState {
        self.inner.borrow().state.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.borrow().state.authenticated
    }

    pub fn user(&self) -> Option<User> {
        self.inner.borrow().state.user.clone()
    }

    /// Open the provider's hosted login in a popup and wait for the relay's
    /// callback page to post the bundle back.
    pub async fn login(&self) -> Result<User, SessionError> {
        let protocol = self.host.protocol();
        if protocol != "https:" {
            log::error!("Refusing to log in from a {protocol} page");
            return Err(SessionError::InsecureTransport);
        }

        let login_state = random_login_state();
        let redirect_uri = format!("{}{}", self.host.origin(), self.config.callback_path);
        let url = self
            .config
            .endpoints()
            .authorize_url(
                &self.config.client_id,
                &redirect_uri,
                &self.config.scopes,
                Some(&login_state),
            )
            .map_err(|e| SessionError::Config(e.to_string()))?;

        let (done, finished) = oneshot::channel();
        self.begin(PendingOperation::Login {
            state: login_state,
            done,
        })?;

        let Some(popup) = self.host.open_popup(&url) else {
            self.inner.borrow_mut().pending = None;
            return Err(SessionError::PopupBlocked);
        };
        self.update_state(|s| s.phase = SessionPhase::Authenticating);

        let result = match self.wait_for_popup(finished, popup.as_ref()).await {
            Ok(result) => result,
            Err(reason) => {
                log::warn!("Login popup abandoned: {reason}");
                Err(SessionError::PopupAbandoned(reason))
            }
        };

        if result.is_err() {
            self.update_state(|s| {
                s.phase = if s.authenticated {
                    SessionPhase::SignedIn
                } else {
                    SessionPhase::SignedOut
                };
            });
        }
        result
    }

    /// Sign out locally, then open the provider's hosted logout and wait for
    /// the relay's logout page to acknowledge it.
    ///
    /// The stored refresh token is removed before anything else happens, and
    /// the session stays signed out even if the popup is blocked or
    /// abandoned.
    pub async fn logout(&self) -> Result<(), SessionError> {
        clear_refresh_token(self.store.as_ref(), &self.config.storage_key);
        self.inner.borrow_mut().epoch += 1;

        let logout_uri = format!("{}{}", self.host.origin(), self.config.logout_path);
        let url = self
            .config
            .endpoints()
            .logout_url(&self.config.client_id, &logout_uri)
            .map_err(|e| SessionError::Config(e.to_string()))?;

        let (done, finished) = oneshot::channel();
        self.begin(PendingOperation::Logout { done })?;

        self.update_state(|s| {
            *s = SessionState::signed_out();
            s.phase = SessionPhase::LoggingOut;
        });

        let result = match self.host.open_popup(&url) {
            Some(popup) => self
                .wait_for_popup(finished, popup.as_ref())
                .await
                .map_err(SessionError::PopupAbandoned),
            None => {
                self.inner.borrow_mut().pending = None;
                Err(SessionError::PopupBlocked)
            }
        };

        if self.inner.borrow().state.phase == SessionPhase::LoggingOut {
            self.update_state(|s| s.phase = SessionPhase::SignedOut);
        }
        result
    }

    /// Handle one `message` event of the window.
    ///
    /// Messages from another origin, of another type, or carrying a `state`
    /// that does not belong to the pending login are dropped. An empty token
    /// is the logout page's acknowledgement.
    pub fn handle_message(&self, origin: &str, data: &Value) {
        if origin != self.host.origin() {
            log::debug!("Ignoring message from foreign origin {origin}");
            return;
        }

        let Some(BridgeMessage::OAuthToken { token, state, .. }) = BridgeMessage::from_value(data)
        else {
            return;
        };

        if token.is_empty() {
            if matches!(self.inner.borrow().pending, Some(PendingOperation::Login { .. })) {
                log::warn!("Ignoring logout acknowledgement while a login is in progress");
                return;
            }
            self.on_logged_out();
            return;
        }

        let expected_state = match &self.inner.borrow().pending {
            Some(PendingOperation::Login { state, .. }) => Some(state.clone()),
            _ => None,
        };
        let Some(expected_state) = expected_state else {
            log::warn!("Ignoring token message with no login in progress");
            return;
        };
        if state.as_deref() != Some(expected_state.as_str()) {
            log::warn!("Ignoring token message with a mismatched state");
            return;
        }

        let result = match parse_tokens(&token) {
            Ok(parsed) => Ok(self.apply_tokens(parsed, None)),
            Err(e) => {
                log::error!("Failed to decode token bundle: {e}");
                Err(SessionError::MalformedBundle(e.to_string()))
            }
        };

        let pending = self.inner.borrow_mut().pending.take();
        if let Some(PendingOperation::Login { done, .. }) = pending {
            let _ = done.send(result);
        }
    }

    /// Exchange `refresh_token` through the relay and apply the result.
    pub async fn refresh_on_load(&self, refresh_token: &str) -> RefreshOutcome {
        log::info!("Refreshing token");
        let epoch = self.inner.borrow().epoch;

        let result = self
            .api
            .refresh(&self.config.refresh_path, refresh_token)
            .await;

        if self.inner.borrow().epoch != epoch {
            log::info!("Signed out during refresh; dropping the response");
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(response) => match parse_tokens(&response.token) {
                Ok(parsed) => {
                    log::info!("Refreshed token");
                    RefreshOutcome::Refreshed(self.apply_tokens(parsed, Some(response.acls)))
                }
                Err(e) => {
                    log::error!("Failed to refresh token: {e}");
                    RefreshOutcome::Failed(e.to_string())
                }
            },
            Err(ApiError::Rejected(reason)) => {
                log::error!("Failed to refresh token: {reason}");
                clear_refresh_token(self.store.as_ref(), &self.config.storage_key);
                RefreshOutcome::Rejected(reason)
            }
            Err(e) => {
                log::error!("Failed to refresh token: {e}");
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    fn begin(&self, operation: PendingOperation) -> Result<(), SessionError> {
        let mut inner = self.inner.borrow_mut();
        if inner.pending.is_some() {
            return Err(SessionError::OperationInFlight);
        }
        inner.pending = Some(operation);
        Ok(())
    }

    /// Wait for the pending operation to be resolved by a message, the popup
    /// to be closed, or the timeout, whichever comes first.
    async fn wait_for_popup<T>(
        &self,
        finished: oneshot::Receiver<T>,
        popup: &dyn PopupHandle,
    ) -> Result<T, AbandonReason> {
        let watchdog = watch_popup(
            popup,
            self.config.popup_timeout,
            self.config.popup_poll_interval,
        );
        futures::pin_mut!(watchdog);

        match select(finished, watchdog).await {
            Either::Left((Ok(value), _)) => Ok(value),
            Either::Left((Err(oneshot::Canceled), _)) => Err(AbandonReason::Closed),
            Either::Right((reason, _)) => {
                if reason == AbandonReason::TimedOut {
                    popup.close();
                }
                self.inner.borrow_mut().pending = None;
                Err(reason)
            }
        }
    }

    fn on_logged_out(&self) {
        clear_refresh_token(self.store.as_ref(), &self.config.storage_key);
        self.inner.borrow_mut().epoch += 1;
        self.update_state(|s| *s = SessionState::signed_out());

        let done = {
            let mut inner = self.inner.borrow_mut();
            match inner.pending.take() {
                Some(PendingOperation::Logout { done }) => Some(done),
                other => {
                    inner.pending = other;
                    None
                }
            }
        };
        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    /// Sign in with a bundle the relay has verified. Login callbacks run
    /// before subscribers are notified.
    fn apply_tokens(&self, parsed: ParsedTokens, acls: Option<Vec<String>>) -> User {
        if let Some(refresh_token) = parsed.refresh_token.as_deref() {
            store_refresh_token(self.store.as_ref(), &self.config.storage_key, refresh_token);
        }

        let user = parsed.user;
        let (snapshot, callbacks) = {
            let mut inner = self.inner.borrow_mut();
            let state = &mut inner.state;
            state.phase = SessionPhase::SignedIn;
            state.authenticated = true;
            state.user = Some(user.clone());
            state.bearer_token = Some(parsed.bundle.access_token);
            state.acls = acls.unwrap_or_default();
            (inner.state.clone(), inner.login_callbacks.clone())
        };

        for callback in callbacks {
            callback(&user);
        }
        self.broadcast(snapshot);
        user
    }

    fn update_state(&self, update: impl FnOnce(&mut SessionState)) {
        let snapshot = {
            let mut inner = self.inner.borrow_mut();
            update(&mut inner.state);
            inner.state.clone()
        };
        self.broadcast(snapshot);
    }

    fn broadcast(&self, state: SessionState) {
        // Errors only mean nobody is subscribed.
        let _ = self.events.try_broadcast(SessionEvent::StateChanged(state));
    }
}

async fn watch_popup(popup: &dyn PopupHandle, timeout: Duration, poll: Duration) -> AbandonReason {
    let poll = poll.max(Duration::from_millis(1));
    let mut waited = Duration::ZERO;
    loop {
        platform::sleep(poll).await;
        if popup.is_closed() {
            return AbandonReason::Closed;
        }
        waited += poll;
        if waited >= timeout {
            return AbandonReason::TimedOut;
        }
    }
}

fn random_login_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(LOGIN_STATE_LEN)
        .map(char::from)
        .collect()
}
