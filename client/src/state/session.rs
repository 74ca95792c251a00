//! Per-tab session controller.
//!
//! SYSTEM CONTEXT
//! ==============
//! Owns "who is logged in" for one tab: the current `UserRecord`, the
//! bootstrap `loading` flag, and the session phase. UI code reads it through
//! `session()` / `subscribe()` and changes it only through the operations
//! below; there is no ambient global state.
//!
//! STATE MACHINE
//! =============
//! `Uninitialized → Loading → {Authenticated, Anonymous}`,
//! `Authenticated → Anonymous` (logout, irrecoverable refresh failure),
//! `Anonymous → Loading → Authenticated` (login, register), and
//! `Authenticated → Loading` when another tab signs in and this tab
//! re-bootstraps. Anything else is rejected and logged.
//!
//! Every identity-changing operation bumps a generation counter. A network
//! result is applied only if the generation it started under is still
//! current, so a response landing after logout (or after a newer login)
//! cannot resurrect stale state.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::{ApiError, SessionError, StoreError};
use crate::net::api::Api;
use crate::net::types::{AuthGrant, RegisterFields, UserRecord};
use crate::state::tokens::TokenStore;

// =============================================================================
// SESSION
// =============================================================================

/// Tab-local view of the signed-in user.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub user: Option<UserRecord>,
    /// `true` only while bootstrap is resolving a stored token.
    pub loading: bool,
}

impl Session {
    /// Confirmed logged out: no user and nothing pending.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user.is_none() && !self.loading
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
}

impl SessionPhase {
    #[must_use]
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::{Anonymous, Authenticated, Loading, Uninitialized};
        matches!(
            (self, next),
            (Uninitialized | Anonymous | Authenticated, Loading)
                | (Loading, Authenticated | Anonymous)
                | (Authenticated, Anonymous)
        )
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

struct Inner {
    phase: SessionPhase,
    generation: u64,
    started: bool,
}

impl Inner {
    fn transition(&mut self, next: SessionPhase) -> bool {
        if self.phase == next {
            return true;
        }
        if !self.phase.can_transition_to(next) {
            tracing::warn!(from = ?self.phase, to = ?next, "rejected session transition");
            return false;
        }
        tracing::debug!(from = ?self.phase, to = ?next, "session transition");
        self.phase = next;
        true
    }
}

struct Shared {
    inner: Mutex<Inner>,
    session: watch::Sender<Session>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop to anonymous and invalidate everything in flight.
    fn sign_out(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        if inner.phase != SessionPhase::Uninitialized {
            inner.transition(SessionPhase::Anonymous);
        }
        self.session.send_replace(Session { user: None, loading: false });
    }
}

/// One tab's session. Construct once per tab and share behind an `Arc`.
pub struct SessionController {
    api: Api,
    shared: Arc<Shared>,
}

impl SessionController {
    /// Wire a controller to `api`. The pipeline's session-expired hook is
    /// pointed at this controller so a failed refresh anywhere in the tab
    /// drops it to anonymous.
    #[must_use]
    pub fn new(api: Api) -> Self {
        let (session, _) = watch::channel(Session::default());
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner { phase: SessionPhase::Uninitialized, generation: 0, started: false }),
            session,
        });

        let weak = Arc::downgrade(&shared);
        api.pipeline().on_session_expired(move || {
            if let Some(shared) = weak.upgrade() {
                shared.sign_out();
            }
        });

        Self { api, shared }
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.shared.session.borrow().clone()
    }

    /// Watch channel that yields every published session.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.shared.session.subscribe()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.shared.lock().phase
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        self.api.pipeline().tokens()
    }

    /// The API handle for protected operations, or `SessionExpired` right
    /// away when this tab is anonymous.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionExpired` when no session is active.
    pub fn authorized(&self) -> Result<Api, SessionError> {
        if matches!(self.phase(), SessionPhase::Anonymous | SessionPhase::Uninitialized) {
            return Err(SessionError::SessionExpired);
        }
        if self.tokens().access_token()?.is_none() {
            return Err(SessionError::SessionExpired);
        }
        Ok(self.api.clone())
    }

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    /// Run bootstrap once for this tab's lifetime; later calls return the
    /// current session.
    pub async fn start(&self) -> Session {
        {
            let mut inner = self.shared.lock();
            if inner.started {
                return self.session();
            }
            inner.started = true;
        }
        self.bootstrap().await
    }

    /// Resolve the stored token into a user.
    ///
    /// With no token the tab becomes anonymous without any network call.
    /// Otherwise `loading` is raised while `/users/me` is fetched; on failure
    /// the store is cleared. `loading` always ends `false`.
    pub async fn bootstrap(&self) -> Session {
        let has_token = match self.tokens().access_token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "token store unreadable during bootstrap");
                false
            }
        };

        let generation = {
            let mut inner = self.shared.lock();
            inner.generation += 1;
            if !inner.transition(SessionPhase::Loading) {
                return self.session();
            }
            if !has_token {
                inner.transition(SessionPhase::Anonymous);
                self.shared.session.send_replace(Session { user: None, loading: false });
                return self.session();
            }
            self.shared.session.send_modify(|s| s.loading = true);
            inner.generation
        };

        let result = self.api.current_user().await;

        let mut inner = self.shared.lock();
        if inner.generation != generation {
            tracing::debug!("bootstrap result discarded; session changed meanwhile");
            drop(inner);
            return self.session();
        }
        match result {
            Ok(user) => {
                tracing::info!(user = user.username().unwrap_or("?"), "session restored");
                inner.transition(SessionPhase::Authenticated);
                self.shared.session.send_replace(Session { user: Some(user), loading: false });
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load user; clearing stored tokens");
                if let Err(e) = self.tokens().clear() {
                    tracing::error!(error = %e, "failed to clear token store");
                }
                inner.transition(SessionPhase::Anonymous);
                self.shared.session.send_replace(Session { user: None, loading: false });
            }
        }
        drop(inner);
        self.session()
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Sign in, store the issued pair, and adopt the returned user.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` when the backend rejects the pair; `Network` on
    /// transport failure; `Superseded` if the session changed meanwhile.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        let (generation, previous) = self.begin_identity_change()?;
        match self.api.login(username, password).await {
            Ok(grant) => self.adopt(generation, grant),
            Err(e) => {
                self.abort_identity_change(generation, previous).await;
                Err(match e {
                    ApiError::Unauthorized { detail } | ApiError::Rejected { detail, .. } => {
                        SessionError::InvalidCredentials(detail)
                    }
                    other => other.into(),
                })
            }
        }
    }

    /// Create an account, store the issued pair, and adopt the new user.
    ///
    /// # Errors
    ///
    /// `Validation` when the backend reports duplicate or malformed fields;
    /// `Network` on transport failure; `Superseded` if the session changed
    /// meanwhile.
    pub async fn register(&self, fields: &RegisterFields) -> Result<Session, SessionError> {
        let (generation, previous) = self.begin_identity_change()?;
        match self.api.register(fields).await {
            Ok(grant) => self.adopt(generation, grant),
            Err(e) => {
                self.abort_identity_change(generation, previous).await;
                Err(match e {
                    ApiError::Rejected { detail, .. } | ApiError::Unauthorized { detail } => {
                        SessionError::Validation(detail)
                    }
                    other => other.into(),
                })
            }
        }
    }

    /// Clear stored tokens and drop to anonymous. Purely local and
    /// idempotent; in-flight calls are not cancelled, their results are
    /// discarded by the generation check.
    ///
    /// # Errors
    ///
    /// Returns the store error if tokens could not be removed. In-memory
    /// state is cleared regardless.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.shared.sign_out();
        tracing::info!("logged out");
        self.tokens().clear()
    }

    /// Re-fetch the current identity.
    ///
    /// # Errors
    ///
    /// `SessionExpired` immediately when the tab is anonymous or no token is
    /// stored, or when the token and its refresh both fail; `Superseded` if
    /// the session changed meanwhile.
    pub async fn refresh_user(&self) -> Result<UserRecord, SessionError> {
        let api = self.authorized()?;
        let generation = self.shared.lock().generation;

        let user = api.current_user().await?;

        let mut inner = self.shared.lock();
        if inner.generation != generation {
            return Err(SessionError::Superseded);
        }
        if inner.phase != SessionPhase::Loading {
            inner.transition(SessionPhase::Authenticated);
        }
        self.shared.session.send_modify(|s| s.user = Some(user.clone()));
        Ok(user)
    }

    /// Replace the in-memory user after a local profile edit. Ignored while
    /// no one is signed in.
    pub fn update_user(&self, user: UserRecord) {
        let inner = self.shared.lock();
        if inner.phase != SessionPhase::Authenticated {
            return;
        }
        self.shared.session.send_modify(|s| s.user = Some(user));
    }

    /// Another tab cleared the token: drop to anonymous with no network call.
    pub fn apply_remote_logout(&self) {
        tracing::info!("signed out in another tab");
        self.shared.sign_out();
    }

    fn begin_identity_change(&self) -> Result<(u64, SessionPhase), SessionError> {
        let mut inner = self.shared.lock();
        let previous = inner.phase;
        if !inner.transition(SessionPhase::Loading) {
            return Err(SessionError::Superseded);
        }
        inner.generation += 1;
        Ok((inner.generation, previous))
    }

    /// Roll back a failed login or register. If it interrupted a bootstrap,
    /// that bootstrap's result was discarded, so the stored token is
    /// resolved again instead of guessing a phase.
    async fn abort_identity_change(&self, generation: u64, previous: SessionPhase) {
        {
            let mut inner = self.shared.lock();
            if inner.generation != generation || inner.phase != SessionPhase::Loading {
                return;
            }
            if previous != SessionPhase::Loading {
                let fallback = match previous {
                    SessionPhase::Authenticated if self.shared.session.borrow().user.is_some() => {
                        SessionPhase::Authenticated
                    }
                    _ => SessionPhase::Anonymous,
                };
                inner.transition(fallback);
                if fallback == SessionPhase::Anonymous {
                    self.shared.session.send_modify(|s| s.loading = false);
                }
                return;
            }
        }
        tracing::debug!("identity change failed during bootstrap; resolving stored token again");
        self.bootstrap().await;
    }

    fn adopt(&self, generation: u64, grant: AuthGrant) -> Result<Session, SessionError> {
        let mut inner = self.shared.lock();
        if inner.generation != generation {
            tracing::debug!("auth result discarded; session changed meanwhile");
            return Err(SessionError::Superseded);
        }
        if let Err(e) = self.tokens().save(&grant.credentials()) {
            inner.transition(SessionPhase::Anonymous);
            self.shared.session.send_replace(Session { user: None, loading: false });
            return Err(e.into());
        }
        inner.transition(SessionPhase::Authenticated);
        tracing::info!(user = grant.user.username().unwrap_or("?"), "signed in");
        let session = Session { user: Some(grant.user), loading: false };
        self.shared.session.send_replace(session.clone());
        Ok(session)
    }
}
