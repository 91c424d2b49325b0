//! Bounded in-memory store of live agent sessions.
//!
//! Each key maps to an `Arc<tokio::sync::Mutex<AgentSession>>`. The inner
//! mutex is the per-key turn lock: a caller holds it for the whole turn
//! (collaborator call included), so at most one turn is in flight per key
//! while distinct keys proceed in parallel. The outer map is only locked
//! long enough to hand out the entry.

use super::traits::{AgentSession, SessionKey};
use crate::util::{BoundedCache, Clock};
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to one session's state.
pub type SessionEntry = Arc<Mutex<AgentSession>>;

pub struct AgentSessionStore {
    entries: BoundedCache<SessionKey, SessionEntry>,
}

impl AgentSessionStore {
    pub fn new(capacity: usize, idle_timeout: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: BoundedCache::new(capacity, idle_timeout, clock),
        }
    }

    /// Fetch the entry for a key, creating an empty session on first use.
    ///
    /// Fetching refreshes the key's recency. An entry evicted while a turn
    /// holds its lock is not cancelled; the turn completes on its own handle
    /// and the state is simply no longer reachable afterwards.
    pub fn entry(&self, key: &SessionKey) -> SessionEntry {
        self.entries
            .get_or_insert_with(key, || Arc::new(Mutex::new(AgentSession::default())))
    }

    /// Look up a key without creating it.
    pub fn peek(&self, key: &SessionKey) -> Option<SessionEntry> {
        self.entries.get(key)
    }

    /// Drop idle sessions; returns how many were evicted.
    pub fn sweep_idle(&self) -> usize {
        self.entries.sweep_idle()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
