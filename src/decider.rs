//! The decision seam: one strategy interface between the turn runner and
//! whatever brain chooses replies and actions.
//!
//! The runner assembles a [`DecisionRequest`] (the node the session sits
//! on, the settled-input burst, a bounded history window, answers, and the
//! privileged flag) and hands it to a [`Decider`]. What comes back is a
//! [`DecisionResponse`]: reply fragments for the contact plus declared
//! [`ActionRequest`]s for the runtime to carry out. Model choice, prompt
//! assembly, and provider plumbing all live behind the trait; the runtime
//! never sees them.
//!
//! # Design Principles
//!
//! - **Declarative output**: deciders never mutate sessions or flows; they
//!   declare intent and the runtime executes it
//! - **Validated**: responses are schema-checked before anything runs, and
//!   a violation is just another retryable [`DeciderError`]
//! - **Truthful feedback**: when a second pass happens, the request carries
//!   the real [`ExecutedAction`] outcomes, successes and failures alike

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::ActionResult;
use crate::buffer::BufferedMessage;
use crate::flow::{FlowEdit, NodeSpec};
use crate::session::TurnEntry;
use crate::types::{AnswerMap, MetadataMap, NodeId, SessionKey};

/// One settled inbound message, as the decider sees it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputFragment {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl From<&BufferedMessage> for InputFragment {
    fn from(message: &BufferedMessage) -> Self {
        Self {
            text: message.text.clone(),
            received_at: message.received_at,
        }
    }
}

/// Everything a decider gets to look at for one turn.
///
/// `input` preserves the arrival order and timestamps of the aggregated
/// burst; `history` is a bounded recent window, oldest first. `privileged`
/// reflects the session's standing and gates which declared actions the
/// runtime will honor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub session: SessionKey,
    /// The node the session currently sits on, prompt and all.
    pub node: NodeSpec,
    pub input: Vec<InputFragment>,
    pub history: Vec<TurnEntry>,
    pub answers: AnswerMap,
    pub metadata: MetadataMap,
    pub privileged: bool,
    /// Present only on a feedback pass: what the runtime actually did with
    /// the previous response's actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Vec<ExecutedAction>>,
}

impl DecisionRequest {
    /// The burst as one newline-joined text, in arrival order. Providers
    /// that want a single user turn use this; the fragments stay available
    /// for anything finer-grained.
    #[must_use]
    pub fn joined_input(&self) -> String {
        let texts: Vec<&str> = self.input.iter().map(|fragment| fragment.text.as_str()).collect();
        texts.join("\n")
    }

    /// Whether this request is the feedback pass of a turn.
    #[must_use]
    pub fn is_feedback_pass(&self) -> bool {
        self.feedback.is_some()
    }
}

/// A declared action paired with what actually happened when the runtime
/// executed it. Feedback passes receive these verbatim; a failed result is
/// reported as faithfully as a success.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    pub request: ActionRequest,
    pub result: ActionResult,
}

/// An action a decider asks the runtime to perform.
///
/// Serialized with a `type` tag so provider responses and logs round-trip
/// as JSON. Session-internal variants are applied inline by the runner;
/// [`Invoke`](Self::Invoke) routes through the action registry;
/// [`EditFlow`](Self::EditFlow) is honored only for privileged sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    /// Record a settled answer on the session.
    UpdateAnswer {
        key: String,
        value: serde_json::Value,
    },
    /// Jump the session to a specific node, bypassing guard evaluation.
    GoToNode { node: NodeId },
    /// Flag the conversation for human follow-up.
    Escalate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Wipe the session back to the flow entry.
    RestartSession,
    /// Apply a structural edit batch to the live flow.
    EditFlow { edits: Vec<FlowEdit> },
    /// Run a registered external action by name.
    Invoke {
        name: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl ActionRequest {
    /// Stable name used in traces and turn reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateAnswer { .. } => "update_answer",
            Self::GoToNode { .. } => "go_to_node",
            Self::Escalate { .. } => "escalate",
            Self::RestartSession => "restart_session",
            Self::EditFlow { .. } => "edit_flow",
            Self::Invoke { .. } => "invoke",
        }
    }

    /// Whether the runtime refuses this action from unprivileged sessions.
    #[must_use]
    pub fn requires_privilege(&self) -> bool {
        matches!(self, Self::EditFlow { .. })
    }
}

/// One reply message for the contact. A burst of fragments is delivered in
/// order, each optionally preceded by a pause.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyFragment {
    pub text: String,
    /// Pause before sending this fragment, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl ReplyFragment {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            delay_ms: None,
        }
    }

    #[must_use]
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

/// A validated decider response: what to say and what to do.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    #[serde(default)]
    pub replies: Vec<ReplyFragment>,
    #[serde(default)]
    pub actions: Vec<ActionRequest>,
}

impl DecisionResponse {
    /// A response that only says something.
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            replies: vec![ReplyFragment::new(text)],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reply(mut self, fragment: ReplyFragment) -> Self {
        self.replies.push(fragment);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: ActionRequest) -> Self {
        self.actions.push(action);
        self
    }

    /// Parses and validates raw provider output.
    ///
    /// Malformed JSON, a non-object payload, and well-formed payloads that
    /// break the schema rules (empty reply text, an unnamed invoke, an
    /// empty answer key) all land on [`DeciderError::SchemaViolation`] so
    /// the caller can retry uniformly.
    pub fn from_json(raw: &str) -> Result<Self, DeciderError> {
        let response: Self =
            serde_json::from_str(raw).map_err(|source| DeciderError::SchemaViolation {
                detail: source.to_string(),
            })?;
        response.validate()?;
        Ok(response)
    }

    /// Schema rules shared by [`from_json`](Self::from_json) and callers
    /// that build responses programmatically.
    pub fn validate(&self) -> Result<(), DeciderError> {
        for fragment in &self.replies {
            if fragment.text.trim().is_empty() {
                return Err(DeciderError::SchemaViolation {
                    detail: "reply fragment with empty text".into(),
                });
            }
        }
        for action in &self.actions {
            match action {
                ActionRequest::Invoke { name, .. } if name.trim().is_empty() => {
                    return Err(DeciderError::SchemaViolation {
                        detail: "invoke action with empty name".into(),
                    });
                }
                ActionRequest::UpdateAnswer { key, .. } if key.trim().is_empty() => {
                    return Err(DeciderError::SchemaViolation {
                        detail: "update_answer action with empty key".into(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Why a decision attempt failed. Every variant is retryable up to the
/// configured bound; after that the runner degrades to the canned reply.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum DeciderError {
    /// The backing provider errored or was unreachable.
    #[error("decision provider error: {message}")]
    #[diagnostic(code(colloquy::decider::provider))]
    Provider { message: String },

    /// The provider answered, but not in the shape the runtime accepts.
    #[error("decision response violates schema: {detail}")]
    #[diagnostic(
        code(colloquy::decider::schema),
        help("Deciders must return a JSON object with optional `replies` and `actions` arrays.")
    )]
    SchemaViolation { detail: String },

    /// The attempt exceeded the configured deadline.
    #[error("decision timed out after {elapsed_ms}ms")]
    #[diagnostic(code(colloquy::decider::timeout))]
    Timeout { elapsed_ms: u64 },
}

/// Strategy interface for the conversation brain.
///
/// Implementations must be stateless with respect to the runtime: every
/// fact they need arrives in the request, and everything they want done
/// goes back in the response.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use colloquy::decider::{Decider, DeciderError, DecisionRequest, DecisionResponse};
///
/// /// Replies with the node prompt until an answer shows up.
/// struct PromptEcho;
///
/// #[async_trait]
/// impl Decider for PromptEcho {
///     async fn decide(&self, request: DecisionRequest) -> Result<DecisionResponse, DeciderError> {
///         let prompt = request
///             .node
///             .prompt
///             .clone()
///             .unwrap_or_else(|| "Could you say more?".to_string());
///         Ok(DecisionResponse::reply(prompt))
///     }
/// }
/// ```
#[async_trait]
pub trait Decider: Send + Sync {
    /// Produce the response for one turn (or one feedback pass).
    async fn decide(&self, request: DecisionRequest) -> Result<DecisionResponse, DeciderError>;
}
