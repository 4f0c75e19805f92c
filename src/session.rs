//! Session state for ongoing conversations.
//!
//! A [`Session`] is one conversation's mutable state: where the contact
//! currently sits in the flow graph, every answer collected so far, the
//! ordered turn history, and free-form metadata. Sessions are created on the
//! first inbound message, mutated exactly once per completed turn by the
//! turn runner, and reset by an explicit restart action (or swept by an
//! external TTL on the backing store).
//!
//! # Core Types
//!
//! - [`Session`]: The per-conversation state container
//! - [`TurnEntry`]: One line of the turn history ({role, content, node-at-time})
//! - [`SessionBuilder`]: Fluent construction for tests and embedders
//!
//! # Examples
//!
//! ```rust
//! use colloquy::session::Session;
//! use serde_json::json;
//!
//! let mut session = Session::builder("line-1/alice", "welcome")
//!     .with_tenant("line-1")
//!     .with_metadata("locale", json!("en"))
//!     .build();
//!
//! session.set_answer("name", json!("Alice"));
//! assert_eq!(session.answers.get("name"), Some(&json!("Alice")));
//! assert_eq!(session.current_node.as_str(), "welcome");
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{AnswerMap, MetadataMap, NodeId, SessionKey};

/// One line of a session's turn history.
///
/// Each entry records who spoke (`role`), what was said (`content`), and the
/// flow node the session was parked on at the time (`node`). User entries are
/// tagged with the node whose prompt they were answering; assistant entries
/// are tagged with the node the session advanced to within the same turn.
///
/// # Examples
///
/// ```rust
/// use colloquy::session::TurnEntry;
///
/// let asked = TurnEntry::user("my name is Alice", "ask_name");
/// assert!(asked.has_role(TurnEntry::USER));
/// assert_eq!(asked.node.as_str(), "ask_name");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TurnEntry {
    /// The role of the speaker (use the constants on [`TurnEntry`]).
    pub role: String,
    /// The text content of the entry.
    pub content: String,
    /// The node the session was on when this entry was recorded.
    pub node: NodeId,
}

impl TurnEntry {
    /// Contact input role.
    pub const USER: &'static str = "user";
    /// Automated reply role.
    pub const ASSISTANT: &'static str = "assistant";
    /// Operational annotation role (restarts, escalations).
    pub const SYSTEM: &'static str = "system";

    /// Creates an entry with the given role, content, and node-at-time.
    #[must_use]
    pub fn new(role: &str, content: &str, node: impl Into<NodeId>) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            node: node.into(),
        }
    }

    /// Creates a contact-authored entry.
    #[must_use]
    pub fn user(content: &str, node: impl Into<NodeId>) -> Self {
        Self::new(Self::USER, content, node)
    }

    /// Creates a runtime-authored reply entry.
    #[must_use]
    pub fn assistant(content: &str, node: impl Into<NodeId>) -> Self {
        Self::new(Self::ASSISTANT, content, node)
    }

    /// Creates an operational annotation entry.
    #[must_use]
    pub fn system(content: &str, node: impl Into<NodeId>) -> Self {
        Self::new(Self::SYSTEM, content, node)
    }

    /// Returns true if this entry has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// One ongoing conversation's mutable state.
///
/// The turn runner reads a session once at turn start and writes it once at
/// turn end; nothing else mutates it concurrently (the debounce coordinator
/// guards that at most one turn per session reaches the mutating phases).
///
/// # Lifecycle
///
/// - **Created** on the first inbound message for a key, parked at the flow
///   graph's entry node.
/// - **Mutated** once per completed turn: answers updated, history appended,
///   position advanced.
/// - **Reset** by the `restart_session` action, which keeps the key and
///   tenant but returns everything else to a fresh state.
///
/// # Examples
///
/// ```rust
/// use colloquy::session::{Session, TurnEntry};
/// use serde_json::json;
///
/// let mut session = Session::fresh("line-1/bob", "welcome");
/// session.set_answer("topic", json!("billing"));
/// session.push_history(TurnEntry::user("about my bill", "welcome"));
/// session.move_to("billing_menu");
///
/// assert_eq!(session.current_node.as_str(), "billing_menu");
/// assert_eq!(session.history.len(), 1);
///
/// session.restart("welcome");
/// assert!(session.answers.is_empty());
/// assert!(session.history.is_empty());
/// assert_eq!(session.current_node.as_str(), "welcome");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    /// The conversation this state belongs to.
    pub key: SessionKey,
    /// The tenant-owned line the conversation runs on, if known.
    pub tenant: Option<String>,
    /// The flow node the session is currently parked on.
    pub current_node: NodeId,
    /// Accumulated answers: answer key → JSON value, unique keys.
    pub answers: AnswerMap,
    /// Ordered turn history, oldest first.
    pub history: Vec<TurnEntry>,
    /// Free-form metadata (locale, escalation flags, privileged marker, ...).
    pub metadata: MetadataMap,
    /// When the session was first created.
    pub started_at: DateTime<Utc>,
    /// When the session was last persisted.
    pub updated_at: DateTime<Utc>,
    /// How many turns have completed against this session.
    pub turns_completed: u64,
}

impl Session {
    /// Metadata key marking a conversation as privileged (operator console,
    /// admin line). Privileged callers may request structural flow edits.
    pub const PRIVILEGED_KEY: &'static str = "privileged";

    /// Metadata key set once a conversation is flagged for human follow-up.
    pub const ESCALATED_KEY: &'static str = "escalated";

    /// Metadata key carrying the decider-supplied escalation reason, when
    /// one was given.
    pub const ESCALATION_REASON_KEY: &'static str = "escalation_reason";

    /// Creates a fresh session parked at `entry`.
    #[must_use]
    pub fn fresh(key: impl Into<SessionKey>, entry: impl Into<NodeId>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            tenant: None,
            current_node: entry.into(),
            answers: AnswerMap::default(),
            history: Vec::new(),
            metadata: MetadataMap::default(),
            started_at: now,
            updated_at: now,
            turns_completed: 0,
        }
    }

    /// Creates a builder for fluent construction.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use colloquy::session::Session;
    /// use serde_json::json;
    ///
    /// let session = Session::builder("line-1/carol", "welcome")
    ///     .with_tenant("line-1")
    ///     .with_answer("name", json!("Carol"))
    ///     .with_metadata("privileged", json!(true))
    ///     .build();
    ///
    /// assert!(session.is_privileged());
    /// assert_eq!(session.tenant.as_deref(), Some("line-1"));
    /// ```
    pub fn builder(key: impl Into<SessionKey>, entry: impl Into<NodeId>) -> SessionBuilder {
        SessionBuilder::new(key, entry)
    }

    /// Sets (or overwrites) one answer key.
    pub fn set_answer(&mut self, key: impl Into<String>, value: Value) {
        self.answers.insert(key.into(), value);
    }

    /// Moves the session to another node.
    pub fn move_to(&mut self, node: impl Into<NodeId>) {
        self.current_node = node.into();
    }

    /// Appends one history entry.
    pub fn push_history(&mut self, entry: TurnEntry) {
        self.history.push(entry);
    }

    /// Returns the most recent `window` history entries, oldest first.
    ///
    /// Used to bound the history shipped to the decider.
    #[must_use]
    pub fn recent_history(&self, window: usize) -> &[TurnEntry] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    /// True when the conversation is marked privileged in metadata.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.metadata
            .get(Self::PRIVILEGED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Resets the session to a fresh state at `entry`, keeping the key and
    /// tenant. Answers, history, metadata, and counters are cleared.
    pub fn restart(&mut self, entry: impl Into<NodeId>) {
        self.current_node = entry.into();
        self.answers.clear();
        self.history.clear();
        self.metadata.clear();
        self.turns_completed = 0;
        self.updated_at = Utc::now();
    }

    /// Marks one turn as completed, stamping `updated_at`.
    pub fn complete_turn(&mut self) {
        self.turns_completed += 1;
        self.updated_at = Utc::now();
    }
}

/// Fluent builder for [`Session`].
///
/// Primarily for tests and embedders that seed sessions out-of-band; the
/// turn runner itself only ever uses [`Session::fresh`] or the session store.
#[derive(Debug)]
pub struct SessionBuilder {
    session: Session,
}

impl SessionBuilder {
    fn new(key: impl Into<SessionKey>, entry: impl Into<NodeId>) -> Self {
        Self {
            session: Session::fresh(key, entry),
        }
    }

    /// Sets the tenant line.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.session.tenant = Some(tenant.into());
        self
    }

    /// Seeds one answer key.
    #[must_use]
    pub fn with_answer(mut self, key: impl Into<String>, value: Value) -> Self {
        self.session.answers.insert(key.into(), value);
        self
    }

    /// Seeds one metadata key.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.session.metadata.insert(key.into(), value);
        self
    }

    /// Seeds one history entry.
    #[must_use]
    pub fn with_history(mut self, entry: TurnEntry) -> Self {
        self.session.history.push(entry);
        self
    }

    /// Finalizes the session.
    #[must_use]
    pub fn build(self) -> Session {
        self.session
    }
}
