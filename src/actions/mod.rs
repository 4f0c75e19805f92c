//! Action execution: registry, dispatch, and result reporting.
//!
//! Deciders declare intent as [`ActionRequest`](crate::decider::ActionRequest)
//! values; this module is where intent meets the world. Session-internal
//! requests (answers, jumps, restarts, escalation, flow edits) are applied
//! inline by [`dispatch`], while `invoke` requests route by name through the
//! [`ActionRegistry`] to embedder-supplied [`ActionExecutor`]s.
//!
//! Whatever happens, every request produces an [`ActionResult`]. Executor
//! errors never escape the registry: they come back as failed results so a
//! feedback pass can report honestly what was attempted and what came of it.

mod dispatch;
mod registry;

pub use dispatch::dispatch;
pub use registry::ActionRegistry;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flow::SharedFlow;
use crate::session::Session;

/// The observed outcome of one executed action.
///
/// `success` is the single source of truth; `message` carries operator-facing
/// detail, `error` the failure cause, and `payload` any structured data the
/// executor wants to hand back to a feedback pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl ActionResult {
    /// A bare success.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A success with a human-readable note.
    #[must_use]
    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A failure with its cause.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attaches structured data for the feedback pass.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// How an executor signals failure. The registry flattens these into failed
/// [`ActionResult`]s; they exist so implementations can use `?` internally.
#[derive(Debug, Error, Diagnostic)]
pub enum ActionError {
    /// The params payload did not match what the executor expects.
    #[error("invalid params for `{action}`: {detail}")]
    #[diagnostic(
        code(colloquy::actions::params),
        help("Check the params shape the executor documents.")
    )]
    InvalidParams { action: String, detail: String },

    /// The action ran and failed.
    #[error("action `{action}` failed: {message}")]
    #[diagnostic(code(colloquy::actions::execution))]
    Execution { action: String, message: String },
}

/// Registration-time behavior switches for an executor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionFlags {
    /// When set, executing this action asks for a feedback pass so the
    /// decider can react to the real outcome.
    pub feedback: bool,
}

impl ActionFlags {
    /// Flags requesting a feedback pass.
    #[must_use]
    pub fn with_feedback() -> Self {
        Self { feedback: true }
    }
}

/// What an action gets to touch while it runs.
///
/// The session reference is the live working copy for the turn; mutations
/// land when the turn persists. `flow_version` pins structural edits to the
/// graph the deciding pass actually saw, so a concurrent edit surfaces as a
/// conflict instead of silently landing on a different graph.
pub struct ActionContext<'a> {
    pub session: &'a mut Session,
    pub flow: &'a SharedFlow,
    pub flow_version: u64,
    pub privileged: bool,
}

/// An executable action behind a registered name.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use colloquy::actions::{ActionContext, ActionError, ActionExecutor, ActionResult};
///
/// /// Records a wake-up call request on the session.
/// struct WakeUpCall;
///
/// #[async_trait]
/// impl ActionExecutor for WakeUpCall {
///     async fn execute(
///         &self,
///         params: serde_json::Value,
///         ctx: &mut ActionContext<'_>,
///     ) -> Result<ActionResult, ActionError> {
///         let hour = params.get("hour").and_then(|v| v.as_u64()).ok_or_else(|| {
///             ActionError::InvalidParams {
///                 action: "wake_up_call".into(),
///                 detail: "missing numeric `hour`".into(),
///             }
///         })?;
///         ctx.session.metadata.insert("wake_up_hour".into(), hour.into());
///         Ok(ActionResult::ok_with(format!("wake-up call set for {hour}:00")))
///     }
/// }
/// ```
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &mut ActionContext<'_>,
    ) -> Result<ActionResult, ActionError>;
}
