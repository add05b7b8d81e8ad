//! Session storage with per-key expiry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gatehouse_core::{Clock, Result, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::SessionError;
use crate::session::SessionRecord;

/// Key-value store for session records keyed by user ID.
///
/// Every `put` replaces the record and restarts its TTL. Renewal goes through
/// `touch`, which never brings back a record that was deleted or has expired.
/// Implementations must report infrastructure faults as
/// `SessionError::StoreUnavailable` rather than as a missing record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `record` under `user_id`, expiring after `ttl`.
    async fn put(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionError>;

    /// Replaces the record under `user_id` and restarts its TTL, but only if a
    /// live record is present. Returns whether one was.
    async fn touch(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<bool, SessionError>;

    /// Returns the live record for `user_id`, if any.
    async fn get(&self, user_id: UserId) -> Result<Option<SessionRecord>, SessionError>;

    /// Removes the record for `user_id`. Removing a missing record is not an error.
    async fn delete(&self, user_id: UserId) -> Result<(), SessionError>;

    /// Returns every live record.
    async fn list(&self) -> Result<Vec<SessionRecord>, SessionError>;
}

#[derive(Debug, Clone)]
struct Entry {
    record: SessionRecord,
    deadline: DateTime<Utc>,
}

/// Process-local session store.
///
/// Expired entries are invisible to reads immediately and are reclaimed by
/// [`InMemorySessionStore::purge_expired`].
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<UserId, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    /// Creates an empty store whose TTLs are measured on `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.deadline > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "purged expired sessions");
        }
        removed
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip(self, record))]
    async fn put(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let deadline = self.clock.now() + ttl;
        self.entries.write().await.insert(
            user_id,
            Entry {
                record: record.clone(),
                deadline,
            },
        );
        Ok(())
    }

    #[instrument(skip(self, record))]
    async fn touch(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<bool, SessionError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(&user_id) {
            Some(entry) if entry.deadline > now => {
                entry.record = record.clone();
                entry.deadline = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, user_id: UserId) -> Result<Option<SessionRecord>, SessionError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .read()
            .await
            .get(&user_id)
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.record.clone()))
    }

    async fn delete(&self, user_id: UserId) -> Result<(), SessionError> {
        self.entries.write().await.remove(&user_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionRecord>, SessionError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.record.clone())
            .collect())
    }
}
