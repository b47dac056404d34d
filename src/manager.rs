//! The session manager: the single source of truth for who is logged in.
//!
//! # Lifecycle
//!
//! ```text
//!            login()               mark_expired()
//! Anonymous ────────→ Authenticated ──────────→ Expired
//!     ↑                   ↑                        │ ensure_fresh_access()
//!     │                   │ refreshed              ↓
//!     │                   └──────────────────  Refreshing
//!     │        refresh rejected                    │
//!     └────────────────────────────────────────────┘
//! ```
//!
//! `login()` passes through `Authenticating` while its request is in flight,
//! and `logout()` goes straight to `Anonymous` from anywhere.
//!
//! # Refresh coalescing
//!
//! The first caller to find the session `Expired` creates the refresh future
//! and parks a [`Shared`] handle to it in the session state. Anyone who
//! arrives while it's running awaits the same handle, so one expiry costs one
//! network round trip no matter how many requests noticed it.
//!
//! Every login and logout bumps an epoch counter. A refresh or login whose
//! epoch no longer matches when it finishes was overtaken by something else
//! and its result is thrown away.

use crate::{
    endpoints,
    store::{CredentialStore, StoredCredentials},
    transport::{Transport, TransportError},
    AccessCredential, AuthError, Config, CurrentUser, RefreshCredential,
    Status,
};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};
use tokio::sync::{watch, Mutex};

/// The message used when login is attempted without an email or password.
pub const MISSING_CREDENTIALS: &str = "Email and password are required.";

type RefreshFlight =
    Shared<BoxFuture<'static, Result<AccessCredential, AuthError>>>;

/// Owns the authenticated session and keeps its access credential fresh.
///
/// This is a cheap handle, clones all refer to the same session.
pub struct SessionManager<T, S> {
    inner: Arc<Inner<T, S>>,
}

struct Inner<T, S> {
    config: Config,
    transport: T,
    store: S,
    state: Mutex<State>,
    status: watch::Sender<Status>,
}

struct State {
    status: Status,
    access: Option<AccessCredential>,
    refresh: Option<RefreshCredential>,
    user: Option<CurrentUser>,
    epoch: u64,
    in_flight: Option<RefreshFlight>,
}

impl State {
    fn anonymous() -> Self {
        State {
            status: Status::Anonymous,
            access: None,
            refresh: None,
            user: None,
            epoch: 0,
            in_flight: None,
        }
    }

    fn clear(&mut self) {
        self.status = Status::Anonymous;
        self.access = None;
        self.refresh = None;
        self.user = None;
        self.in_flight = None;
        self.epoch += 1;
    }

    fn stored_credentials(&self) -> Option<StoredCredentials> {
        match (&self.access, &self.refresh) {
            (Some(access), Some(refresh)) => Some(StoredCredentials {
                access: access.clone(),
                refresh: refresh.clone(),
            }),
            _ => None,
        }
    }
}

impl<T, S> SessionManager<T, S>
where
    T: Transport,
    S: CredentialStore,
{
    /// Create a session manager, rehydrating from whatever `store` holds.
    ///
    /// Stored credentials are trusted optimistically. The session starts out
    /// [`Status::Authenticated`] and only finds out otherwise when the server
    /// rejects a request. The user's profile isn't stored, so
    /// [`SessionManager::current_user()`] stays empty until the next login.
    pub fn init(config: Config, transport: T, store: S) -> Self {
        let mut state = State::anonymous();

        match store.load() {
            Ok(Some(StoredCredentials { access, refresh })) => {
                log::info!("Resuming a session from stored credentials");
                state.status = Status::Authenticated;
                state.access = Some(access);
                state.refresh = Some(refresh);
            },
            Ok(None) => log::debug!("No stored credentials, starting anonymous"),
            Err(e) => {
                log::warn!("Discarding unusable stored credentials: {}", e);
                if let Err(e) = store.clear() {
                    log::warn!("Unable to clear the credential store: {}", e);
                }
            },
        }

        let (status, _) = watch::channel(state.status);

        SessionManager {
            inner: Arc::new(Inner {
                config,
                transport,
                store,
                state: Mutex::new(state),
                status,
            }),
        }
    }

    pub fn config(&self) -> &Config { &self.inner.config }

    pub fn transport(&self) -> &T { &self.inner.transport }

    pub async fn status(&self) -> Status { self.inner.state.lock().await.status }

    /// The logged in user, only visible while the session is usable.
    pub async fn current_user(&self) -> Option<CurrentUser> {
        let state = self.inner.state.lock().await;

        if state.status.exposes_user() {
            state.user.clone()
        } else {
            None
        }
    }

    pub async fn access_credential(&self) -> Option<AccessCredential> {
        self.inner.state.lock().await.access.clone()
    }

    pub async fn refresh_credential(&self) -> Option<RefreshCredential> {
        self.inner.state.lock().await.refresh.clone()
    }

    /// Get notified whenever the session's [`Status`] changes.
    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.inner.status.subscribe()
    }

    /// Log in with an email and password.
    ///
    /// Any existing session is dropped locally first. On failure the session
    /// ends up [`Status::Anonymous`] and nothing is persisted.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<CurrentUser, AuthError> {
        if identifier.trim().is_empty() || secret.is_empty() {
            return Err(AuthError::invalid_credentials(MISSING_CREDENTIALS));
        }

        let epoch = {
            let mut state = self.inner.state.lock().await;

            if state.status != Status::Anonymous {
                log::info!("Discarding the current session to log in again");
                self.forget(&mut state);
            }

            state.epoch += 1;
            state.status = Status::Authenticating;
            self.publish(&state);
            state.epoch
        };

        let result =
            endpoints::login(&self.inner.transport, identifier, secret).await;

        let mut state = self.inner.state.lock().await;

        if state.epoch != epoch {
            log::debug!("The session changed during login, ignoring the result");
            return Err(AuthError::Superseded);
        }

        match result {
            Ok(outcome) => {
                state.status = Status::Authenticated;
                state.access = Some(outcome.access);
                state.refresh = Some(outcome.refresh);
                state.user = Some(outcome.user.clone());
                self.persist(&state);
                self.publish(&state);

                Ok(outcome.user)
            },
            Err(e) => {
                state.status = Status::Anonymous;
                self.publish(&state);

                Err(e)
            },
        }
    }

    /// End the session.
    ///
    /// Local state and the credential store are always cleared, even if the
    /// server can't be told about it. Logging out while already anonymous
    /// does nothing.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let (access, refresh) = {
            let mut state = self.inner.state.lock().await;

            if state.status == Status::Anonymous && state.refresh.is_none() {
                log::debug!("Already logged out");
                return Ok(());
            }

            let credentials = (state.access.take(), state.refresh.take());
            self.forget(&mut state);
            credentials
        };

        log::info!("Logged out");

        if let Some(refresh) = refresh {
            match self.notify_logout(access, refresh).await {
                Ok(()) => log::debug!("The server acknowledged the logout"),
                Err(e) => log::warn!(
                    "The server didn't acknowledge the logout: {}",
                    describe(&e)
                ),
            }
        }

        Ok(())
    }

    /// Tell the server about a logout, giving up after
    /// [`Config::logout_timeout`].
    async fn notify_logout(
        &self,
        access: Option<AccessCredential>,
        refresh: RefreshCredential,
    ) -> Result<(), AuthError> {
        let notification = endpoints::logout(
            &self.inner.transport,
            access.as_ref(),
            &refresh,
        );

        tokio::time::timeout(self.inner.config.logout_timeout, notification)
            .await
            .unwrap_or_else(|_elapsed| {
                Err(AuthError::from(TransportError::TimedOut))
            })
    }

    /// Flag `credential` as rejected by the server.
    ///
    /// This only has an effect when `credential` is still the current one,
    /// so requests which were sent before a refresh finished don't trigger
    /// another refresh. Returns whether the session was marked expired.
    pub async fn mark_expired(&self, credential: &AccessCredential) -> bool {
        let mut state = self.inner.state.lock().await;

        if state.status == Status::Authenticated
            && state.access.as_ref() == Some(credential)
        {
            log::info!("The access credential was rejected");
            state.status = Status::Expired;
            self.publish(&state);
            true
        } else {
            false
        }
    }

    /// Get an access credential that hasn't been rejected yet, refreshing it
    /// if necessary.
    ///
    /// While the session is [`Status::Authenticated`] this never touches the
    /// network. Concurrent callers share a single refresh.
    pub async fn ensure_fresh_access(
        &self,
    ) -> Result<AccessCredential, AuthError> {
        let flight = {
            let mut state = self.inner.state.lock().await;

            match state.status {
                Status::Authenticated => {
                    return state
                        .access
                        .clone()
                        .ok_or(AuthError::NotAuthenticated);
                },
                Status::Anonymous | Status::Authenticating => {
                    return Err(AuthError::NotAuthenticated);
                },
                Status::Expired | Status::Refreshing => {
                    match state.in_flight.clone() {
                        Some(flight) => flight,
                        None => self.start_refresh(&mut state)?,
                    }
                },
            }
        };

        flight.await
    }

    fn start_refresh(
        &self,
        state: &mut State,
    ) -> Result<RefreshFlight, AuthError> {
        let refresh = match state.refresh.clone() {
            Some(refresh) => refresh,
            None => {
                log::warn!("No refresh credential, ending the session");
                self.forget(state);
                return Err(AuthError::RefreshRejected);
            },
        };

        log::debug!("Starting a refresh");
        state.status = Status::Refreshing;
        self.publish(state);

        let manager = self.clone();
        let epoch = state.epoch;
        let flight = manager.run_refresh(refresh, epoch).boxed().shared();
        state.in_flight = Some(flight.clone());

        Ok(flight)
    }

    async fn run_refresh(
        self,
        refresh: RefreshCredential,
        epoch: u64,
    ) -> Result<AccessCredential, AuthError> {
        let result = endpoints::refresh(&self.inner.transport, &refresh).await;

        let mut state = self.inner.state.lock().await;

        if state.epoch != epoch {
            log::info!("The session ended during a refresh, ignoring the result");
            return Err(AuthError::Superseded);
        }

        state.in_flight = None;

        match result {
            Ok(outcome) => {
                log::info!("Refreshed the access credential");
                state.status = Status::Authenticated;
                state.access = Some(outcome.access.clone());
                if let Some(rotated) = outcome.refresh {
                    state.refresh = Some(rotated);
                }
                self.persist(&state);
                self.publish(&state);

                Ok(outcome.access)
            },
            Err(e @ AuthError::NetworkFailure(_))
            | Err(e @ AuthError::ServerError { .. }) => {
                log::warn!("Unable to refresh the access credential: {}", e);
                state.status = Status::Expired;
                self.publish(&state);

                Err(e)
            },
            Err(e) => {
                log::warn!("Refresh failed, ending the session: {}", e);
                self.forget(&mut state);

                Err(e)
            },
        }
    }

    /// Clear the session and the credential store.
    fn forget(&self, state: &mut State) {
        state.clear();

        if let Err(e) = self.inner.store.clear() {
            log::warn!("Unable to clear the credential store: {}", e);
        }

        self.publish(state);
    }

    fn persist(&self, state: &State) {
        if let Some(credentials) = state.stored_credentials() {
            if let Err(e) = self.inner.store.save(&credentials) {
                log::warn!("Unable to save the session's credentials: {}", e);
            }
        }
    }

    fn publish(&self, state: &State) {
        self.inner.status.send_replace(state.status);
    }
}

/// Network failures all display the same user-facing message, so log the
/// underlying transport error instead.
fn describe(err: &AuthError) -> String {
    match err {
        AuthError::NetworkFailure(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

impl<T, S> Clone for SessionManager<T, S> {
    fn clone(&self) -> Self {
        SessionManager {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S> Debug for SessionManager<T, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.inner.config)
            .field("status", &*self.inner.status.borrow())
            .finish()
    }
}
