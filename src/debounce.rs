//! Debounce coordinator: decides when a message burst has gone quiet.
//!
//! Contacts often send a thought as several rapid messages. Processing each
//! one individually produces overlapping, contradictory replies, so every
//! inbound message instead starts (or joins) a debounce window: processing
//! waits until the session has been quiet for a full inactivity threshold,
//! and the wait restarts on every new arrival. This is true debouncing, not
//! a fixed offset from the first message.
//!
//! Coordination is cooperative. Each arrival spawns its own
//! [`DebounceCoordinator::wait_for_quiet`] call, and every poll tick asks the
//! arrival buffer one question: *is there a newer sequence than mine?* If so,
//! the later arrival owns processing and this call returns
//! [`DebounceOutcome::Superseded`] without side effects. If instead the
//! session has been idle past the threshold, this call atomically drains the
//! buffer and wins the turn. Sequence comparison, not wall-clock ordering,
//! decides the winner, so skewed producer clocks cannot break the protocol.
//! There is no cancellation token and no lock: supersession *is* the
//! cancellation path, and the atomic drain resolves any remaining race (a
//! coordinator that drains an already-emptied buffer is superseded too).
//!
//! # Examples
//!
//! ```rust,no_run
//! use colloquy::buffer::{ArrivalStore, InMemoryArrivalStore};
//! use colloquy::debounce::{DebounceCoordinator, DebounceOutcome, DebounceSettings};
//! use colloquy::types::SessionKey;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), colloquy::buffer::BufferError> {
//! let store = Arc::new(InMemoryArrivalStore::default());
//! let coordinator = DebounceCoordinator::new(store.clone(), DebounceSettings::default());
//!
//! let key = SessionKey::for_conversation("line-1", "alice");
//! let appended = store.append(&key, "hello", "prov-1").await?;
//!
//! match coordinator.wait_for_quiet(&key, appended.sequence).await? {
//!     DebounceOutcome::Superseded => { /* a later arrival owns this burst */ }
//!     DebounceOutcome::Single(message) => { /* one settled message */ }
//!     DebounceOutcome::Aggregated(burst) => { /* whole burst, sequence order */ }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument};

use crate::buffer::{ArrivalStore, BufferError, BufferedMessage};
use crate::types::SessionKey;

/// Timing knobs for the debounce protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebounceSettings {
    /// How long a session must stay quiet before its burst is processed.
    /// The window restarts on every new arrival.
    pub inactivity_threshold: Duration,
    /// How often a waiting coordinator re-checks the buffer.
    pub poll_interval: Duration,
}

impl DebounceSettings {
    /// Default quiet window before a burst fires.
    pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(60);
    /// Default poll cadence while waiting.
    pub const DEFAULT_POLL: Duration = Duration::from_millis(1000);

    /// Creates settings, clamping a zero poll interval to the default
    /// (a zero-period ticker would spin).
    #[must_use]
    pub fn new(inactivity_threshold: Duration, poll_interval: Duration) -> Self {
        Self {
            inactivity_threshold,
            poll_interval: if poll_interval.is_zero() {
                Self::DEFAULT_POLL
            } else {
                poll_interval
            },
        }
    }
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, Self::DEFAULT_POLL)
    }
}

/// How one coordinator's wait resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// A newer arrival owns processing (or another coordinator already
    /// drained the burst). Expected, not an error; nothing was mutated.
    Superseded,
    /// The burst settled with exactly one message.
    Single(BufferedMessage),
    /// The burst settled with several messages, in sequence order.
    Aggregated(Vec<BufferedMessage>),
}

impl DebounceOutcome {
    /// True when a later arrival owns the work.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    /// The settled burst in sequence order, or `None` when superseded.
    #[must_use]
    pub fn into_burst(self) -> Option<Vec<BufferedMessage>> {
        match self {
            Self::Superseded => None,
            Self::Single(message) => Some(vec![message]),
            Self::Aggregated(burst) => Some(burst),
        }
    }
}

/// Owns the wait/reset/fire protocol for one session's bursts.
///
/// Cheap to construct per inbound message; all state lives in the shared
/// arrival store.
#[derive(Clone)]
pub struct DebounceCoordinator {
    store: Arc<dyn ArrivalStore>,
    settings: DebounceSettings,
}

impl std::fmt::Debug for DebounceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceCoordinator")
            .field("settings", &self.settings)
            .finish()
    }
}

impl DebounceCoordinator {
    /// Creates a coordinator over the shared arrival store.
    #[must_use]
    pub fn new(store: Arc<dyn ArrivalStore>, settings: DebounceSettings) -> Self {
        Self { store, settings }
    }

    /// Waits until the session's burst settles or a newer arrival takes over.
    ///
    /// `sequence_at_append` is the sequence the caller's own append was
    /// assigned. Each poll tick:
    ///
    /// 1. nothing buffered → [`DebounceOutcome::Superseded`] (another
    ///    coordinator drained, or the slot expired);
    /// 2. a newer sequence exists → [`DebounceOutcome::Superseded`];
    /// 3. idle ≥ threshold → atomically drain and return
    ///    [`DebounceOutcome::Single`] or [`DebounceOutcome::Aggregated`]
    ///    (an empty drain lost the final race and is `Superseded`).
    ///
    /// The returned burst is the exact read-and-clear result: each message
    /// appears in exactly one winning turn.
    #[instrument(skip(self, key), fields(session = %key, sequence = sequence_at_append))]
    pub async fn wait_for_quiet(
        &self,
        key: &SessionKey,
        sequence_at_append: u64,
    ) -> Result<DebounceOutcome, BufferError> {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(mark) = self.store.peek_last_arrival(key).await? else {
                debug!("buffer already consumed; superseded");
                return Ok(DebounceOutcome::Superseded);
            };

            if mark.sequence > sequence_at_append {
                debug!(observed = mark.sequence, "newer arrival owns the burst");
                return Ok(DebounceOutcome::Superseded);
            }

            if mark.idle >= self.settings.inactivity_threshold {
                let mut burst = self.store.drain(key).await?;
                debug!(messages = burst.len(), "burst settled");
                return Ok(match burst.len() {
                    0 => DebounceOutcome::Superseded,
                    1 => DebounceOutcome::Single(burst.remove(0)),
                    _ => DebounceOutcome::Aggregated(burst),
                });
            }
        }
    }
}
