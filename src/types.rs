//! Core identifier types for the colloquy runtime.
//!
//! This module defines the fundamental identifiers used throughout the
//! system: which conversation a piece of state belongs to, and which flow
//! node a session is currently parked on. These are the domain concepts the
//! rest of the crate is written in terms of.
//!
//! # Key Types
//!
//! - [`SessionKey`]: Identifies one ongoing conversation (tenant line + contact)
//! - [`NodeId`]: Identifies one node inside a compiled flow graph
//! - [`AnswerMap`] / [`MetadataMap`]: The session's accumulated key→value state
//!
//! # Examples
//!
//! ```rust
//! use colloquy::types::{NodeId, SessionKey};
//!
//! let key = SessionKey::for_conversation("line-42", "+15550100");
//! assert_eq!(key.as_str(), "line-42/+15550100");
//!
//! let node: NodeId = "ask_name".into();
//! assert_eq!(node.as_str(), "ask_name");
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accumulated answers for one session: answer key → JSON value, unique keys.
pub type AnswerMap = FxHashMap<String, serde_json::Value>;

/// Free-form session metadata: key → JSON value.
pub type MetadataMap = FxHashMap<String, serde_json::Value>;

/// Identifies one ongoing conversation.
///
/// A session key is an opaque string. The inbound transport usually derives
/// it from the receiving line and the contact
/// (see [`for_conversation`](Self::for_conversation)), but any stable string
/// works: the runtime only ever compares and hashes it.
///
/// # Examples
///
/// ```rust
/// use colloquy::types::SessionKey;
///
/// let key = SessionKey::for_conversation("line-1", "alice");
/// assert_eq!(key.to_string(), "line-1/alice");
///
/// // Arbitrary stable strings are fine too.
/// let raw: SessionKey = "ticket-9931".into();
/// assert_eq!(raw.as_str(), "ticket-9931");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Build a key from an arbitrary stable string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build the conventional `receiver/sender` key for one conversation.
    ///
    /// `receiver` is the tenant-owned line the message arrived on; `sender`
    /// is the contact. Two contacts talking to the same line get distinct
    /// sessions, as does one contact talking to two lines.
    #[must_use]
    pub fn for_conversation(receiver: &str, sender: &str) -> Self {
        Self(format!("{receiver}/{sender}"))
    }

    /// The key as a borrowed string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Developer Experience: allow string literals where a SessionKey is expected.
impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies one node inside a flow graph.
///
/// Node ids are unique within a graph (enforced at compile time by
/// [`FlowBuilder::compile`](crate::flow::FlowBuilder::compile)) and stable
/// across graph versions unless an edit renames them.
///
/// # Examples
///
/// ```rust
/// use colloquy::types::NodeId;
///
/// let a = NodeId::new("welcome");
/// let b: NodeId = "welcome".into();
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Build a node id from any string-ish value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a borrowed string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Developer Experience: allow string literals where a NodeId is expected.
impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
