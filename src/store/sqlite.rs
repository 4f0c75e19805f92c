/*!
SQLite Session Store

This module provides the `SqliteSessionStore` async implementation of the
`SessionStore` trait defined in `store/mod.rs`.

## Behavior

- Uses the serde-based persistence models (see `store::persistence`) to
  encode the full session snapshot as one JSON document per row.
- When the `sqlite-migrations` feature is enabled (default), embedded
  migrations (`sqlx::migrate!("./migrations")`) run on connect; disabling
  the feature assumes external migration orchestration.
- `save` is a single upsert, so readers never observe half a snapshot.

## Design Goals

- Keep this module focused on database I/O; pure serialization lives in
  the persistence module.
- One row per conversation: the latest snapshot wins, no history tables.

## Database Schema

- `sessions.key` ← `session.key` (primary key)
- `sessions.tenant` ← `session.tenant` (nullable, indexed)
- `sessions.document` ← serialized `PersistedSession` JSON
- `sessions.updated_at` ← RFC3339 persist time (indexed, for cleanup
  policies)
*/

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use super::persistence::PersistedSession;
use super::{SessionStore, StoreError};
use crate::session::Session;
use crate::types::SessionKey;

/// SQLite-backed session store.
///
/// # Storage Growth
///
/// One row per conversation, overwritten in place; storage grows with the
/// number of distinct sessions, not with turn count. For long-running
/// deployments, `updated_at` supports time-based cleanup:
///
/// ```bash
/// sqlite3 colloquy.db "DELETE FROM sessions WHERE updated_at < datetime('now', '-90 days')"
/// sqlite3 colloquy.db "VACUUM"
/// ```
pub struct SqliteSessionStore {
    /// Shared connection pool for concurrent session operations.
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSessionStore").finish()
    }
}

impl SqliteSessionStore {
    /// Connect (or create) a SQLite database at `database_url`.
    /// Example URL: `sqlite://colloquy.db`
    #[must_use = "store must be used to persist sessions"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Backend {
                message: format!("invalid database url: {e}"),
            })?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("connect error: {e}"),
            })?;
        // Run embedded migrations only if the feature is enabled (idempotent).
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(StoreError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }
        #[cfg(not(feature = "sqlite-migrations"))]
        {
            // Feature disabled: external migration orchestration owns the schema.
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self, key), err)]
    async fn load(&self, key: &SessionKey) -> Result<Option<Session>, StoreError> {
        let row_opt: Option<SqliteRow> =
            sqlx::query("SELECT document FROM sessions WHERE key = ?1")
                .bind(key.as_str())
                .fetch_optional(self.pool.as_ref())
                .await
                .map_err(|e| StoreError::Backend {
                    message: format!("select session: {e}"),
                })?;
        let Some(row) = row_opt else {
            return Ok(None);
        };
        let document: String = row.try_get("document").map_err(|e| StoreError::Backend {
            message: format!("read document column: {e}"),
        })?;
        let persisted = PersistedSession::from_json_str(&document)?;
        Ok(Some(Session::try_from(persisted)?))
    }

    #[instrument(skip(self, session), err)]
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let persisted = PersistedSession::from(session);
        let document = persisted.to_json_string()?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO sessions (key, tenant, document, updated_at)
            VALUES (?1, ?2, ?3, ?4)
        "#,
        )
        .bind(session.key.as_str())
        .bind(session.tenant.as_deref())
        .bind(&document)
        .bind(&persisted.updated_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StoreError::Backend {
            message: format!("upsert session: {e}"),
        })?;
        Ok(())
    }

    #[instrument(skip(self, key), err)]
    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE key = ?1")
            .bind(key.as_str())
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("delete session: {e}"),
            })?;
        Ok(())
    }
}
