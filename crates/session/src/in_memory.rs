//! In-memory session store — process-lifetime, no persistence.
//!
//! Sessions live until the process exits; an external TTL/reaper is
//! the surrounding deployment's concern. The outer map lock is held
//! only for lookup/insert — never across a turn — so independent
//! sessions proceed concurrently while each session's own
//! conversation mutex serializes its turns.

use async_trait::async_trait;
use nimbus_core::error::SessionError;
use nimbus_core::message::SessionKey;
use nimbus_core::session::{SessionHandle, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A session store backed by a `HashMap` behind an async `RwLock`.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, Arc<SessionHandle>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn open(&self, key: &SessionKey) -> Arc<SessionHandle> {
        // Fast path: session already exists.
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(key) {
                return handle.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(session = %key, "Creating session");
                Arc::new(SessionHandle::new(key.clone()))
            })
            .clone()
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), SessionError> {
        let handle = {
            let sessions = self.sessions.read().await;
            sessions.get(key).cloned()
        };

        if let Some(handle) = handle {
            // Waits behind any in-flight turn on this session.
            handle.conversation().lock().await.clear();
            debug!(session = %key, "Cleared conversation");
        }

        Ok(())
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
