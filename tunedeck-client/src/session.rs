//! Session context: the auth token and the UI signal channel.
//!
//! A [`Session`] is created once per client instance and threaded into the
//! transport. The token is mirrored to a small JSON file so it survives
//! restarts; that file is the only state this layer persists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

use crate::events::ClientEvent;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedToken {
    token: String,
}

/// Durable storage for the auth token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let persisted = serde_json::from_str::<PersistedToken>(&contents)?;
        Ok(Some(persisted.token))
    }

    pub fn save(&self, token: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&PersistedToken {
            token: token.to_string(),
        })?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

struct SessionInner {
    token: RwLock<Option<String>>,
    store: Option<TokenStore>,
    events: broadcast::Sender<ClientEvent>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// A session whose token lives in memory only.
    pub fn in_memory() -> Self {
        Self::build(None, None)
    }

    /// A session backed by a token file, loading any token already stored.
    pub fn with_store(store: TokenStore) -> Result<Self, SessionError> {
        let token = store.load()?;
        if token.is_some() {
            tracing::info!(path = %store.path().display(), "Restored auth token");
        }
        Ok(Self::build(token, Some(store)))
    }

    fn build(token: Option<String>, store: Option<TokenStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                token: RwLock::new(token),
                store,
                events,
            }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        if let Some(store) = &self.inner.store {
            if let Err(err) = store.save(&token) {
                tracing::warn!(error = %err, "Failed to persist auth token");
            }
        }
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub fn clear_token(&self) {
        self.inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(store) = &self.inner.store {
            if let Err(err) = store.clear() {
                tracing::warn!(error = %err, "Failed to remove persisted auth token");
            }
        }
    }

    /// Subscribe to UI signals (login redirects, notifications).
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<ClientEvent> {
        self.inner.events.clone()
    }

    /// Best-effort signal; dropped silently when nobody listens.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.inner.events.send(event);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("store", &self.inner.store)
            .finish()
    }
}
