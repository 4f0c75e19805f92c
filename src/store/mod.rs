//! Session storage infrastructure: pluggable persistence behind one trait.
//!
//! The turn runner loads a session at the start of a turn and persists the
//! updated snapshot before any reply leaves the building. This module
//! abstracts over where that snapshot lives while keeping a consistent API.
//!
//! # Architecture
//!
//! - **[`SessionStore`]** - Trait for pluggable session persistence
//! - **[`SessionBackend`]** - Backend selection, resolvable from the
//!   environment
//! - **Persistence Models** - Serde-friendly types for snapshot
//!   serialization (see [`persistence`])
//!
//! # Persistence Backends
//!
//! - **[`InMemorySessionStore`]** - Volatile storage for testing and
//!   development
//! - **[`SqliteSessionStore`]** - Durable SQLite-backed persistence
//!   (`sqlite` feature)
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use colloquy::store::{connect, SessionBackend};
//!
//! # async fn example() -> Result<(), colloquy::store::StoreError> {
//! let store = connect(SessionBackend::from_env()).await?;
//! # let _ = store;
//! # Ok(())
//! # }
//! ```

mod memory;
pub mod persistence;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemorySessionStore;
pub use persistence::{PersistedSession, PersistedTurnEntry, PersistenceError};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::session::Session;
use crate::types::SessionKey;

/// Storage failures. A failed save is fatal for its turn: the buffer has
/// already been drained, so callers surface the error instead of
/// acknowledging work that never became durable.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// The backing store failed (connection, query, I/O).
    #[error("session store backend error: {message}")]
    #[diagnostic(
        code(colloquy::store::backend),
        help("Check the database URL and that the store is reachable.")
    )]
    Backend { message: String },

    /// Anything that is not a backend fault (conversion, encoding).
    #[error("session store error: {message}")]
    #[diagnostic(code(colloquy::store::other))]
    Other { message: String },
}

impl From<PersistenceError> for StoreError {
    fn from(source: PersistenceError) -> Self {
        StoreError::Other {
            message: source.to_string(),
        }
    }
}

/// Pluggable session persistence.
///
/// Implementations must make `save` atomic per session: a reader never
/// observes a half-written snapshot.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the session for `key`, or `None` if the conversation is new.
    async fn load(&self, key: &SessionKey) -> Result<Option<Session>, StoreError>;

    /// Persists the full session snapshot, replacing any previous one.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Removes the session for `key`. Deleting an absent key is not an
    /// error.
    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError>;
}

/// Which persistence backend to run on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionBackend {
    /// Volatile in-process storage.
    #[default]
    InMemory,
    /// Durable SQLite storage at the configured URL.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl SessionBackend {
    /// Resolves the backend from `COLLOQUY_SESSION_BACKEND` (values
    /// `memory` or `sqlite`), defaulting to in-memory. Unknown values fall
    /// back to the default rather than failing startup.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        match std::env::var("COLLOQUY_SESSION_BACKEND").as_deref() {
            #[cfg(feature = "sqlite")]
            Ok("sqlite") => SessionBackend::Sqlite,
            _ => SessionBackend::InMemory,
        }
    }
}

/// Connects the selected backend and returns it as a shared store handle.
///
/// For SQLite the database URL comes from `COLLOQUY_SQLITE_URL`
/// (default `sqlite://colloquy.db`).
pub async fn connect(backend: SessionBackend) -> Result<Arc<dyn SessionStore>, StoreError> {
    match backend {
        SessionBackend::InMemory => {
            info!(backend = "memory", "session store ready");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        #[cfg(feature = "sqlite")]
        SessionBackend::Sqlite => {
            dotenvy::dotenv().ok();
            let url = std::env::var("COLLOQUY_SQLITE_URL")
                .unwrap_or_else(|_| "sqlite://colloquy.db".to_string());
            let store = SqliteSessionStore::connect(&url).await?;
            info!(backend = "sqlite", "session store ready");
            Ok(Arc::new(store))
        }
    }
}
