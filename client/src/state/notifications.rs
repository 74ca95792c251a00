//! Unread-notification badge state.
//!
//! The count is only meaningful for a signed-in user: it is fetched while a
//! session is active and forced back to 0 when the tab becomes anonymous.

#[cfg(test)]
#[path = "notifications_test.rs"]
mod notifications_test;

use tokio::sync::watch;

use crate::net::api::Api;

use super::session::Session;

pub struct UnreadCounter {
    api: Api,
    count: watch::Sender<u64>,
}

impl UnreadCounter {
    #[must_use]
    pub fn new(api: Api) -> Self {
        let (count, _) = watch::channel(0);
        Self { api, count }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.count.subscribe()
    }

    /// Bring the badge in line with `session`. Fetch failures are logged and
    /// leave the previous value in place.
    pub async fn refresh(&self, session: &Session) -> u64 {
        if session.user.is_none() {
            self.publish(0);
            return 0;
        }
        match self.api.unread_count().await {
            Ok(count) => {
                self.publish(count);
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch unread notification count");
                self.count()
            }
        }
    }

    /// Subscribers are only woken when the value actually changes.
    fn publish(&self, count: u64) {
        self.count.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
    }
}

#[cfg(feature = "native")]
mod poller {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::task::JoinHandle;
    use tokio::time::MissedTickBehavior;

    use super::UnreadCounter;
    use crate::state::session::SessionController;

    const MIN_POLL_PERIOD: Duration = Duration::from_secs(1);

    impl UnreadCounter {
        /// Refresh every `period` and whenever the session changes. Stops
        /// when the controller is dropped. Periods under one second are
        /// raised to one second.
        #[must_use]
        pub fn spawn_poller(self: Arc<Self>, controller: &SessionController, period: Duration) -> JoinHandle<()> {
            let mut sessions = controller.subscribe();
            let period = period.max(MIN_POLL_PERIOD);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        changed = sessions.changed() => {
                            if changed.is_err() {
                                tracing::debug!("session controller dropped; unread poller stopped");
                                return;
                            }
                        }
                    }
                    let session = sessions.borrow_and_update().clone();
                    self.refresh(&session).await;
                }
            })
        }
    }
}
