//! Token store: persisted access/refresh tokens shared by every tab.
//!
//! ARCHITECTURE
//! ============
//! Values live in a `TokenBackend` (memory, JSON file, or browser
//! `localStorage`) under the fixed keys `token` and `refresh_token`. Each
//! `TokenStore` handle belongs to one tab; handles opened with
//! [`TokenStore::open_tab`] share the backend and a broadcast bus. Every
//! mutation that changes a value is published on the bus as a
//! [`StorageEvent`], and subscribers only see events from *other* tabs,
//! matching browser `storage` event semantics.
//!
//! TRADE-OFFS
//! ==========
//! Writes are last-writer-wins with no locking; two tabs refreshing at once
//! simply overwrite each other with equally valid tokens.

#[cfg(test)]
#[path = "tokens_test.rs"]
mod tokens_test;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::StoreError;
use crate::net::types::Credentials;

pub const ACCESS_TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const BUS_CAPACITY: usize = 64;

// =============================================================================
// BACKENDS
// =============================================================================

/// Raw string key/value persistence.
pub trait TokenBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns an error if the medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local backend; state lasts as long as the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl TokenBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

/// JSON-object file backend; survives process restarts.
///
/// The file is re-read on every access so writes from other processes are
/// picked up. Writes go through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Map to modify before writing back. Corrupt contents are discarded;
    /// the flag reports that so the caller rewrites the file.
    fn writable_map(&self) -> Result<(HashMap<String, String>, bool), StoreError> {
        match self.read_map() {
            Ok(map) => Ok((map, false)),
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding corrupt token file");
                Ok((HashMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if map.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, &serde_json::to_vec_pretty(map)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

impl TokenBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let (mut map, _) = self.writable_map()?;
        map.insert(key.to_owned(), value.to_owned());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let (mut map, corrupt) = self.writable_map()?;
        if map.remove(key).is_some() || corrupt {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

// =============================================================================
// CHANGE EVENTS
// =============================================================================

/// Identity of one tab (one session controller) sharing the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TabId(Uuid);

impl TabId {
    /// Origin used for changes observed from outside this process (browser
    /// `storage` events).
    pub const EXTERNAL: TabId = TabId(Uuid::nil());

    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

/// A token-store mutation, as seen by other tabs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub origin: TabId,
}

/// What a subscriber receives from [`StorageEvents::next`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageNotice {
    Changed(StorageEvent),
    /// The subscriber fell behind and `n` events were dropped; current store
    /// contents are the only reliable state.
    Lagged(u64),
}

/// Subscription to changes made by other tabs.
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageEvent>,
    tab: TabId,
}

impl StorageEvents {
    /// Wait for the next foreign change. Returns `None` once every store
    /// handle sharing the bus has been dropped.
    pub async fn next(&mut self) -> Option<StorageNotice> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.tab => {}
                Ok(event) => return Some(StorageNotice::Changed(event)),
                Err(broadcast::error::RecvError::Lagged(n)) => return Some(StorageNotice::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// One tab's handle on the shared token store.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn TokenBackend>,
    bus: broadcast::Sender<StorageEvent>,
    tab: TabId,
}

impl TokenStore {
    #[must_use]
    pub fn new(backend: Arc<dyn TokenBackend>) -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self { backend, bus, tab: TabId::new() }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()))
    }

    /// A handle for another tab: same backend and bus, distinct origin.
    #[must_use]
    pub fn open_tab(&self) -> Self {
        Self { backend: Arc::clone(&self.backend), bus: self.bus.clone(), tab: TabId::new() }
    }

    #[must_use]
    pub fn tab(&self) -> TabId {
        self.tab
    }

    #[must_use]
    pub fn subscribe(&self) -> StorageEvents {
        StorageEvents { rx: self.bus.subscribe(), tab: self.tab }
    }

    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.backend.get(ACCESS_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.backend.get(REFRESH_TOKEN_KEY)
    }

    /// Stored pair, or `None` when logged out.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn load(&self) -> Result<Option<Credentials>, StoreError> {
        let Some(access_token) = self.access_token()? else {
            return Ok(None);
        };
        Ok(Some(Credentials { access_token, refresh_token: self.refresh_token()? }))
    }

    /// Replace the stored pair. A pair without a refresh token removes any
    /// previously stored one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        self.write(ACCESS_TOKEN_KEY, Some(&credentials.access_token))?;
        self.write(REFRESH_TOKEN_KEY, credentials.refresh_token.as_deref())
    }

    /// Store a renewed access token, rotating the refresh token only when the
    /// backend issued a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn store_refreshed(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), StoreError> {
        self.write(ACCESS_TOKEN_KEY, Some(access_token))?;
        if let Some(refresh) = refresh_token {
            self.write(REFRESH_TOKEN_KEY, Some(refresh))?;
        }
        Ok(())
    }

    /// Remove both tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.write(ACCESS_TOKEN_KEY, None)?;
        self.write(REFRESH_TOKEN_KEY, None)
    }

    /// Relay a change made outside this process (e.g. another browser tab)
    /// to every subscriber. The backend is not touched.
    pub fn publish_external(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        let _ = self.bus.send(StorageEvent { key: key.to_owned(), old_value, new_value, origin: TabId::EXTERNAL });
    }

    fn write(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        // A corrupt old value never blocks a write.
        let (old_value, unreadable) = match self.backend.get(key) {
            Ok(old_value) => (old_value, false),
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!(key, error = %e, "overwriting corrupt token storage");
                (None, true)
            }
            Err(e) => return Err(e),
        };
        if !unreadable && old_value.as_deref() == value {
            return Ok(());
        }
        match value {
            Some(v) => self.backend.set(key, v)?,
            None => self.backend.remove(key)?,
        }
        // No receivers is fine: nobody else is listening yet.
        let _ = self.bus.send(StorageEvent {
            key: key.to_owned(),
            old_value,
            new_value: value.map(str::to_owned),
            origin: self.tab,
        });
        Ok(())
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").field("tab", &self.tab).finish_non_exhaustive()
    }
}
