//! Cross-tab session sync.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every tab owns its own `SessionController`, but all tabs share one token
//! store. `CrossTabSync` listens for token-store changes made by *other* tabs
//! and brings this tab's controller in line:
//!
//! - `token` gains a value: another tab signed in (or renewed), so re-run
//!   bootstrap against the new token;
//! - `token` loses its value: another tab signed out, so drop to anonymous
//!   without touching the network;
//! - the subscription lagged: compare the store's current contents with this
//!   tab's phase and reconcile.
//!
//! Changes to `refresh_token` alone never change who is signed in.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::sync::Arc;

use super::session::{Session, SessionController, SessionPhase};
use super::tokens::{ACCESS_TOKEN_KEY, StorageEvent, StorageEvents, StorageNotice};

/// What a storage notice did to this tab's session.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncAction {
    Ignored,
    Bootstrapped(Session),
    SignedOut,
}

pub struct CrossTabSync {
    controller: Arc<SessionController>,
    events: StorageEvents,
}

impl CrossTabSync {
    /// Subscribe to the controller's token store. Changes made before this
    /// call are not replayed.
    #[must_use]
    pub fn new(controller: Arc<SessionController>) -> Self {
        let events = controller.tokens().subscribe();
        Self { controller, events }
    }

    /// Wait for the next foreign change and apply it. `None` once the store
    /// bus has closed.
    pub async fn next(&mut self) -> Option<SyncAction> {
        let notice = self.events.next().await?;
        Some(self.handle(notice).await)
    }

    /// Apply changes until the bus closes.
    pub async fn run(mut self) {
        while let Some(action) = self.next().await {
            tracing::trace!(?action, "cross-tab notice handled");
        }
        tracing::debug!("token store bus closed; cross-tab sync stopped");
    }

    /// Run [`CrossTabSync::run`] on the tokio runtime.
    #[cfg(feature = "native")]
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn handle(&self, notice: StorageNotice) -> SyncAction {
        match notice {
            StorageNotice::Changed(event) => self.apply(event).await,
            StorageNotice::Lagged(missed) => {
                tracing::warn!(missed, "cross-tab sync lagged; reconciling from store");
                self.reconcile().await
            }
        }
    }

    async fn apply(&self, event: StorageEvent) -> SyncAction {
        if event.key != ACCESS_TOKEN_KEY {
            return SyncAction::Ignored;
        }
        match event.new_value {
            Some(_) => {
                tracing::info!("token changed in another tab; re-bootstrapping");
                SyncAction::Bootstrapped(self.controller.bootstrap().await)
            }
            None => {
                self.controller.apply_remote_logout();
                SyncAction::SignedOut
            }
        }
    }

    async fn reconcile(&self) -> SyncAction {
        let has_token = match self.controller.tokens().access_token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "token store unreadable; keeping session");
                return SyncAction::Ignored;
            }
        };
        match (has_token, self.controller.phase()) {
            (true, SessionPhase::Authenticated | SessionPhase::Loading) => SyncAction::Ignored,
            (true, _) => SyncAction::Bootstrapped(self.controller.bootstrap().await),
            (false, SessionPhase::Authenticated | SessionPhase::Loading) => {
                self.controller.apply_remote_logout();
                SyncAction::SignedOut
            }
            (false, _) => SyncAction::Ignored,
        }
    }
}
