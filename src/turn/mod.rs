//! The turn runner: one inbound message in, at most one coherent turn out.
//!
//! Everything else in the crate exists to serve this module. A turn walks a
//! fixed lifecycle:
//!
//! ```text
//! awaiting_input → debouncing → deciding → executing_actions
//!                                   → (feedback)? → persisting → done
//! ```
//!
//! - **debouncing**: the arrival is buffered and the coordinator waits for
//!   the burst to settle; most arrivals in a burst stop here with a
//!   [`TurnReceipt::Superseded`], having mutated nothing
//! - **deciding**: the settled burst, session context, and bounded history
//!   go to the [`Decider`](crate::decider::Decider); attempts are bounded
//!   and time-limited, and exhaustion degrades to a canned reply rather
//!   than surfacing provider errors to the contact
//! - **executing_actions**: declared actions run in order through the
//!   dispatcher; every outcome is captured as an
//!   [`ActionResult`](crate::actions::ActionResult)
//! - **feedback**: when an executed action failed or was registered as
//!   feedback-worthy, a second decider pass sees the real outcomes and its
//!   replies replace the preliminary ones; the contact is never told a
//!   side effect succeeded on speculation
//! - **persisting**: the session snapshot is saved; failure here aborts the
//!   turn before anything was acknowledged, so redelivery is safe
//! - **done**: reply fragments stream out through the gateway, honoring
//!   per-fragment delays; the turn is already durable, so delivery trouble
//!   is logged rather than fatal
//!
//! The runner is cloneable and shared: spawn one
//! [`handle_inbound`](TurnRunner::handle_inbound) task per inbound message
//! and let the debounce protocol pick each burst's single winner.

mod report;
mod runner;

pub use report::{NavigationTrace, TurnError, TurnPhase, TurnReceipt, TurnReport};
pub use runner::{InboundMessage, TurnRunner};
