//! Volatile in-process session store.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard};

use super::{SessionStore, StoreError};
use crate::session::Session;
use crate::types::SessionKey;

/// Keeps full session snapshots in a mutex-guarded map. Everything is lost
/// on process exit; meant for tests, development, and deployments where the
/// transport itself is the source of truth.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<FxHashMap<SessionKey, Session>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, FxHashMap<SessionKey, Session>>, StoreError> {
        self.sessions.lock().map_err(|_| StoreError::Backend {
            message: "session map lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<Session>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.lock()?.insert(session.key.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
