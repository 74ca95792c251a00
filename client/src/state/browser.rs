//! Browser bindings for the session core.
//!
//! SYSTEM CONTEXT
//! ==============
//! In the browser the token store is `window.localStorage`, navigation is
//! `window.location`, and other tabs announce their writes through the
//! window `storage` event. [`StorageBridge`] relays those events onto the
//! token store bus so [`CrossTabSync`] sees browser tabs exactly like
//! in-process ones. [`connect`] wires one tab end to end.
//!
//! `web-sys` handles are `!Send`, so every type here looks the window up on
//! demand instead of holding on to it.

use std::sync::Arc;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::config::ClientConfig;
use crate::error::StoreError;
use crate::net::api::Api;
use crate::net::browser::GlooTransport;
use crate::net::pipeline::AuthPipeline;
use crate::util::redirect::Navigator;

use super::session::SessionController;
use super::sync::CrossTabSync;
use super::tokens::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenBackend, TokenStore};

fn local_storage() -> Result<web_sys::Storage, StoreError> {
    web_sys::window()
        .ok_or_else(|| StoreError::Unavailable("no window".into()))?
        .local_storage()
        .map_err(|e| StoreError::Unavailable(format!("{e:?}")))?
        .ok_or_else(|| StoreError::Unavailable("localStorage disabled".into()))
}

// =============================================================================
// STORAGE
// =============================================================================

/// `localStorage`-backed token persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageBackend;

impl TokenBackend for LocalStorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        local_storage()?.get_item(key).map_err(|e| StoreError::Unavailable(format!("{e:?}")))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        local_storage()?.set_item(key, value).map_err(|e| StoreError::Unavailable(format!("{e:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        local_storage()?.remove_item(key).map_err(|e| StoreError::Unavailable(format!("{e:?}")))
    }
}

/// Relays window `storage` events for the token keys onto a store's bus.
/// The listener is removed when the bridge is dropped.
pub struct StorageBridge {
    listener: Closure<dyn FnMut(web_sys::StorageEvent)>,
}

impl StorageBridge {
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` when there is no window or the
    /// listener cannot be registered.
    pub fn install(store: &TokenStore) -> Result<Self, StoreError> {
        let window = web_sys::window().ok_or_else(|| StoreError::Unavailable("no window".into()))?;
        let store = store.clone();
        let listener = Closure::wrap(Box::new(move |event: web_sys::StorageEvent| {
            // `key` is null when another tab called `localStorage.clear()`.
            let Some(key) = event.key() else {
                store.publish_external(ACCESS_TOKEN_KEY, None, None);
                return;
            };
            if key == ACCESS_TOKEN_KEY || key == REFRESH_TOKEN_KEY {
                store.publish_external(&key, event.old_value(), event.new_value());
            }
        }) as Box<dyn FnMut(web_sys::StorageEvent)>);

        window
            .add_event_listener_with_callback("storage", listener.as_ref().unchecked_ref())
            .map_err(|e| StoreError::Unavailable(format!("{e:?}")))?;
        Ok(Self { listener })
    }
}

impl Drop for StorageBridge {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            let _ = window.remove_event_listener_with_callback("storage", self.listener.as_ref().unchecked_ref());
        }
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// Navigator over `window.location`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocationNavigator;

impl Navigator for LocationNavigator {
    fn current_path(&self) -> String {
        web_sys::window().and_then(|w| w.location().pathname().ok()).unwrap_or_default()
    }

    fn navigate(&self, path: &str) {
        if let Some(window) = web_sys::window() {
            if let Err(e) = window.location().set_href(path) {
                tracing::warn!(error = ?e, path, "navigation failed");
            }
        }
    }
}

// =============================================================================
// WIRING
// =============================================================================

/// A wired browser tab. Dropping it detaches the `storage` listener.
pub struct BrowserTab {
    pub controller: Arc<SessionController>,
    _bridge: StorageBridge,
}

/// Wire this tab against `localStorage`, `window.location`, and `gloo-net`,
/// start cross-tab sync, and kick off bootstrap.
///
/// # Errors
///
/// Returns `StoreError::Unavailable` when the window or `localStorage` is
/// not reachable.
pub fn connect(config: ClientConfig) -> Result<BrowserTab, StoreError> {
    local_storage()?;
    let tokens = TokenStore::new(Arc::new(LocalStorageBackend));
    let bridge = StorageBridge::install(&tokens)?;
    let login_path = config.login_path.clone();
    let pipeline = Arc::new(AuthPipeline::new(
        Arc::new(GlooTransport::new(config)),
        tokens,
        Arc::new(LocationNavigator),
        login_path,
    ));
    let controller = Arc::new(SessionController::new(Api::new(pipeline)));

    wasm_bindgen_futures::spawn_local(CrossTabSync::new(Arc::clone(&controller)).run());
    let starter = Arc::clone(&controller);
    wasm_bindgen_futures::spawn_local(async move {
        starter.start().await;
    });

    Ok(BrowserTab { controller, _bridge: bridge })
}
