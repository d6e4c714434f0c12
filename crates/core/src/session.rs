//! Session store abstraction — per-session conversation state.
//!
//! The store owns lifetime and locking: it hands out `SessionHandle`s
//! whose conversation is guarded by a per-session mutex. The
//! orchestration loop holds that mutex for the full duration of one
//! turn (including all outbound network calls), so concurrent turns
//! against the same session serialize while unrelated sessions never
//! contend.

use crate::error::SessionError;
use crate::message::{Conversation, SessionKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One session's state: its key and its mutex-guarded conversation.
pub struct SessionHandle {
    key: SessionKey,
    conversation: Mutex<Conversation>,
    created_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            conversation: Mutex::new(Conversation::new()),
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The per-session mutual-exclusion scope. Lock it for the whole
    /// turn; never across turns.
    pub fn conversation(&self) -> &Mutex<Conversation> {
        &self.conversation
    }
}

/// Keyed store of sessions. Implementations must be safe for
/// concurrent access from independent sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the session for `key`, creating it on first use.
    async fn open(&self, key: &SessionKey) -> Arc<SessionHandle>;

    /// Reset the session's conversation to empty. A no-op for unknown
    /// keys. Waits for any in-flight turn on the session to finish.
    async fn clear(&self, key: &SessionKey) -> std::result::Result<(), SessionError>;

    /// Number of live sessions.
    async fn count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn handle_guards_conversation() {
        let handle = SessionHandle::new(SessionKey::generate());
        {
            let mut conv = handle.conversation().lock().await;
            conv.push(Message::user("hello"));
        }
        let conv = handle.conversation().lock().await;
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn handle_keeps_its_key() {
        let key = SessionKey::from("abc123");
        let handle = SessionHandle::new(key.clone());
        assert_eq!(handle.key(), &key);
    }
}
