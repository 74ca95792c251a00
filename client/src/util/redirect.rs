//! Login redirect plumbing.
//!
//! SYSTEM CONTEXT
//! ==============
//! The request pipeline forces navigation to the login view when a session
//! is irrecoverably lost. Where "navigation" lands depends on the host: the
//! browser build drives `window.location`, native hosts keep an in-memory
//! location that UI code (or the CLI) can inspect.

#[cfg(test)]
#[path = "redirect_test.rs"]
mod redirect_test;

use std::sync::{Mutex, PoisonError};

/// Current-location access and forced navigation.
pub trait Navigator: Send + Sync {
    /// Path of the view currently shown (e.g. `/profile/alice`).
    fn current_path(&self) -> String;

    /// Replace the current view with `path`.
    fn navigate(&self, path: &str);
}

/// Whether `current` already shows the login view at `login_path`.
#[must_use]
pub fn is_login_view(current: &str, login_path: &str) -> bool {
    let login = login_path.trim_end_matches('/');
    let path = current.split(['?', '#']).next().unwrap_or_default().trim_end_matches('/');
    path == login || path.starts_with(&format!("{login}/"))
}

/// Navigate to the login view unless it is already showing.
///
/// Returns `true` when a navigation was issued.
pub fn redirect_to_login(navigator: &dyn Navigator, login_path: &str) -> bool {
    let current = navigator.current_path();
    if is_login_view(&current, login_path) {
        return false;
    }
    tracing::info!(from = %current, to = login_path, "session lost; redirecting to login");
    navigator.navigate(login_path);
    true
}

/// In-memory location for native hosts and tests.
#[derive(Debug)]
pub struct MemoryNavigator {
    inner: Mutex<MemoryLocation>,
}

#[derive(Debug)]
struct MemoryLocation {
    current: String,
    history: Vec<String>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(start: impl Into<String>) -> Self {
        Self { inner: Mutex::new(MemoryLocation { current: start.into(), history: Vec::new() }) }
    }

    /// Every path navigated to, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).history.clone()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).current.clone()
    }

    fn navigate(&self, path: &str) {
        let mut location = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        location.current = path.to_owned();
        location.history.push(path.to_owned());
    }
}
