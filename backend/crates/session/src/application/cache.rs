//! Identity Cache
//!
//! Last-known identity kept in a durable key/value store. A cold-start and
//! degraded-mode fallback only: every operation is synchronous and
//! infallible, storage failures are logged and read as a miss.

use std::sync::Arc;

use platform::storage::KeyValueStore;

use crate::domain::entity::identity::Identity;
use crate::error::{SessionError, SessionResult};

#[derive(Clone)]
pub struct IdentityCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl IdentityCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn read(&self) -> Option<Identity> {
        match self.try_read() {
            Ok(identity) => identity,
            Err(SessionError::Serialization(e)) => {
                tracing::warn!(key = %self.key, error = %e, "Discarding unreadable cached identity");
                self.clear();
                None
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Identity cache read failed");
                None
            }
        }
    }

    pub fn write(&self, identity: &Identity) {
        if let Err(e) = self.try_write(identity) {
            tracing::warn!(key = %self.key, error = %e, "Identity cache write failed");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %e, "Identity cache clear failed");
        }
    }

    fn try_read(&self) -> SessionResult<Option<Identity>> {
        match self.store.get(&self.key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn try_write(&self, identity: &Identity) -> SessionResult<()> {
        let raw = serde_json::to_string(identity)?;
        self.store.set(&self.key, &raw)?;
        Ok(())
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
