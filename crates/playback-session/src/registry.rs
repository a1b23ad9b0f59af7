//! Process-wide store of active sessions.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::heartbeat::HeartbeatLedger;
use crate::keys::SessionKey;
use crate::session::{LiveSession, PlaybackSession};

/// A registered session of either kind.
#[derive(Debug, Clone)]
pub enum RegisteredSession {
    Playback(Arc<PlaybackSession>),
    Live(Arc<LiveSession>),
}

impl RegisteredSession {
    pub fn key(&self) -> &SessionKey {
        match self {
            Self::Playback(session) => session.key(),
            Self::Live(session) => session.key(),
        }
    }
}

impl From<Arc<PlaybackSession>> for RegisteredSession {
    fn from(session: Arc<PlaybackSession>) -> Self {
        Self::Playback(session)
    }
}

impl From<Arc<LiveSession>> for RegisteredSession {
    fn from(session: Arc<LiveSession>) -> Self {
        Self::Live(session)
    }
}

/// Concurrent map from [`SessionKey`] to session.
///
/// Removing a key also drops its heartbeat throttling state so a new session
/// reusing the key reports immediately.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, RegisteredSession>,
    heartbeat: Arc<HeartbeatLedger>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its own key, replacing any previous one.
    pub fn put(&self, session: impl Into<RegisteredSession>) -> Option<RegisteredSession> {
        let session = session.into();
        let key = session.key().clone();
        debug!(storage_id = key.storage_id, unique_key = %key.unique_key, "Registering session");
        self.sessions.insert(key, session)
    }

    pub fn get(&self, key: &SessionKey) -> Option<RegisteredSession> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    pub fn get_playback(&self, key: &SessionKey) -> Option<Arc<PlaybackSession>> {
        match self.get(key)? {
            RegisteredSession::Playback(session) => Some(session),
            RegisteredSession::Live(_) => None,
        }
    }

    pub fn get_live(&self, key: &SessionKey) -> Option<Arc<LiveSession>> {
        match self.get(key)? {
            RegisteredSession::Live(session) => Some(session),
            RegisteredSession::Playback(_) => None,
        }
    }

    pub fn remove(&self, key: &SessionKey) -> Option<RegisteredSession> {
        self.heartbeat.remove(key);
        self.sessions.remove(key).map(|(_, session)| session)
    }

    /// Remove every session of one storage backend. Returns how many were
    /// removed.
    pub fn clear_storage(&self, storage_id: i64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|key, _| key.storage_id != storage_id);
        self.heartbeat.clear_storage(storage_id);
        let removed = before.saturating_sub(self.sessions.len());
        debug!(storage_id, removed, "Cleared storage sessions");
        removed
    }

    pub fn clear(&self) {
        self.sessions.clear();
        self.heartbeat.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Heartbeat throttling state, shared with [`crate::HeartbeatReporter`].
    pub fn heartbeat_ledger(&self) -> &Arc<HeartbeatLedger> {
        &self.heartbeat
    }
}
