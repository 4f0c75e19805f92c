/*!
Persistence primitives for serializing/deserializing session state (used by
the SQLite session store and any future persistent backends).

Design Goals:
- Provide explicit serde-friendly structs decoupled from internal
  in-memory representations.
- Keep conversion logic localized (From / TryFrom impls) so the store
  code stays lean and declarative.
- Tolerate older snapshots: growable fields default, timestamps fall
  back to "now" when unparseable.

This module intentionally does NOT perform I/O. It is pure data
transformation and (de)serialization glue.
*/

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::session::{Session, TurnEntry};

/// Persisted shape of one history entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedTurnEntry {
    pub role: String,
    pub content: String,
    pub node: String,
}

/// Complete persisted shape of a [`Session`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedSession {
    pub key: String,
    #[serde(default)]
    pub tenant: Option<String>,
    pub current_node: String,
    #[serde(default)]
    pub answers: FxHashMap<String, Value>,
    #[serde(default)]
    pub history: Vec<PersistedTurnEntry>,
    #[serde(default)]
    pub metadata: FxHashMap<String, Value>,
    /// RFC3339 string form (keeps chrono::DateTime out of the serialized
    /// shape).
    pub started_at: String,
    /// RFC3339 string form of the last persist time.
    pub updated_at: String,
    #[serde(default)]
    pub turns_completed: u64,
}

/// Bidirectional conversion and serialization errors for persistence models.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("missing field: {0}")]
    #[diagnostic(
        code(colloquy::persistence::missing_field),
        help("Populate the field in the persisted JSON before conversion.")
    )]
    MissingField(&'static str),

    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(colloquy::persistence::serde),
        help("Ensure the JSON structure matches the Persisted* types.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("persistence error: {0}")]
    #[diagnostic(code(colloquy::persistence::other))]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

impl PersistedSession {
    /// Serializes to the JSON document stored by persistent backends.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| PersistenceError::Serde { source })
    }

    /// Parses a stored JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|source| PersistenceError::Serde { source })
    }
}

/* ---------- TurnEntry <-> PersistedTurnEntry conversions ---------- */

impl From<&TurnEntry> for PersistedTurnEntry {
    fn from(entry: &TurnEntry) -> Self {
        PersistedTurnEntry {
            role: entry.role.clone(),
            content: entry.content.clone(),
            node: entry.node.to_string(),
        }
    }
}

impl From<PersistedTurnEntry> for TurnEntry {
    fn from(p: PersistedTurnEntry) -> Self {
        TurnEntry {
            role: p.role,
            content: p.content,
            node: p.node.into(),
        }
    }
}

/* ---------- Session <-> PersistedSession conversions ---------- */

impl From<&Session> for PersistedSession {
    fn from(session: &Session) -> Self {
        PersistedSession {
            key: session.key.to_string(),
            tenant: session.tenant.clone(),
            current_node: session.current_node.to_string(),
            answers: session.answers.clone(),
            history: session.history.iter().map(PersistedTurnEntry::from).collect(),
            metadata: session.metadata.clone(),
            started_at: session.started_at.to_rfc3339(),
            updated_at: session.updated_at.to_rfc3339(),
            turns_completed: session.turns_completed,
        }
    }
}

impl TryFrom<PersistedSession> for Session {
    type Error = PersistenceError;

    fn try_from(p: PersistedSession) -> Result<Self> {
        if p.key.is_empty() {
            return Err(PersistenceError::MissingField("key"));
        }
        if p.current_node.is_empty() {
            return Err(PersistenceError::MissingField("current_node"));
        }
        let started_at = chrono::DateTime::parse_from_rfc3339(&p.started_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = chrono::DateTime::parse_from_rfc3339(&p.updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Ok(Session {
            key: p.key.into(),
            tenant: p.tenant,
            current_node: p.current_node.into(),
            answers: p.answers,
            history: p.history.into_iter().map(TurnEntry::from).collect(),
            metadata: p.metadata,
            started_at,
            updated_at,
            turns_completed: p.turns_completed,
        })
    }
}
