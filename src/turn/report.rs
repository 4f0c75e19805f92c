use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

use crate::buffer::BufferError;
use crate::decider::ExecutedAction;
use crate::store::StoreError;
use crate::types::{NodeId, SessionKey};

/// Where a turn currently is in its lifecycle.
///
/// Phases appear as span fields on the runner's tracing output, so an
/// `EnvFilter` on `colloquy` shows each turn walking
/// `awaiting_input → debouncing → deciding → executing_actions →
/// (feedback)? → persisting → done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    /// An inbound message arrived and is being buffered.
    AwaitingInput,
    /// The debounce coordinator is waiting for the burst to settle.
    Debouncing,
    /// The decider is being consulted with the settled input.
    Deciding,
    /// Declared actions are being executed in order.
    ExecutingActions,
    /// A second decider pass is reacting to the real action outcomes.
    Feedback,
    /// The mutated session snapshot is being written to the store.
    Persisting,
    /// Replies are being delivered; the turn is durable.
    Done,
}

impl TurnPhase {
    /// The snake_case label used in spans and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingInput => "awaiting_input",
            Self::Debouncing => "debouncing",
            Self::Deciding => "deciding",
            Self::ExecutingActions => "executing_actions",
            Self::Feedback => "feedback",
            Self::Persisting => "persisting",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The nodes a completed turn moved through.
///
/// `from` is where navigation started (after any explicit `go_to_node` or
/// restart), `path` the hops taken through guards and Decision nodes. An
/// empty path is an observable hold: no guard matched, the session stays
/// put, and the next turn sees the same node again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationTrace {
    pub from: NodeId,
    pub path: Vec<NodeId>,
}

impl NavigationTrace {
    /// True when no guard matched and the session stayed on `from`.
    #[must_use]
    pub fn held(&self) -> bool {
        self.path.is_empty()
    }

    /// Where the session settled.
    #[must_use]
    pub fn final_node(&self) -> &NodeId {
        self.path.last().unwrap_or(&self.from)
    }
}

/// What one completed (non-superseded) turn did, for callers and audit logs.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnReport {
    /// Unique id for this turn.
    pub turn_id: Uuid,
    /// The conversation the turn ran for.
    pub session: SessionKey,
    /// Buffer sequences consumed by this turn, in order.
    pub consumed_sequences: Vec<u64>,
    /// True when decider attempts were exhausted and the canned fallback
    /// reply was used instead.
    pub degraded: bool,
    /// True when a feedback pass replaced the preliminary replies.
    pub feedback_ran: bool,
    /// Every executed action paired with its actual result, in order.
    pub actions: Vec<ExecutedAction>,
    /// The navigation outcome for the turn.
    pub navigation: NavigationTrace,
    /// How many reply fragments were handed to the outbound gateway.
    pub delivered: usize,
}

/// How [`handle_inbound`](super::TurnRunner::handle_inbound) resolved.
///
/// Supersession is the common case during a burst: all but the last arrival
/// return [`Superseded`](Self::Superseded) without touching the session.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnReceipt {
    /// A later arrival owns this burst; nothing was mutated or persisted.
    Superseded {
        session: SessionKey,
        /// The sequence this arrival was assigned before losing ownership.
        sequence: u64,
    },
    /// The turn ran to completion and the session snapshot is durable.
    Completed(TurnReport),
}

impl TurnReceipt {
    /// True when a later arrival took over the burst.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }

    /// The completed report, if this receipt carries one.
    #[must_use]
    pub fn report(&self) -> Option<&TurnReport> {
        match self {
            Self::Superseded { .. } => None,
            Self::Completed(report) => Some(report),
        }
    }

    /// Consumes the receipt, yielding the report for completed turns.
    #[must_use]
    pub fn into_report(self) -> Option<TurnReport> {
        match self {
            Self::Superseded { .. } => None,
            Self::Completed(report) => Some(report),
        }
    }
}

/// Failures that abort a turn.
///
/// Decider trouble and action failures are *not* here: those degrade to the
/// canned reply or to failed [`ActionResult`](crate::actions::ActionResult)s
/// respectively. What remains fatal is losing the buffer backend or the
/// session store; in both cases the inbound message was not acknowledged
/// and is safe for the transport to redeliver.
#[derive(Debug, Error, Diagnostic)]
pub enum TurnError {
    #[error(transparent)]
    #[diagnostic(code(colloquy::turn::buffer))]
    Buffer(#[from] BufferError),

    #[error("session load failed: {source}")]
    #[diagnostic(
        code(colloquy::turn::load),
        help("The turn never started; redelivering the inbound message is safe.")
    )]
    Load { source: StoreError },

    #[error("session persist failed: {source}")]
    #[diagnostic(
        code(colloquy::turn::persist),
        help("The turn was not acknowledged; redelivering the inbound message is safe.")
    )]
    Persist { source: StoreError },
}
