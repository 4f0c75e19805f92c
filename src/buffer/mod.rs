//! Arrival buffer: the per-session append-only inbound message log.
//!
//! Every inbound message lands here first. The buffer assigns each message a
//! monotonic per-session sequence number, remembers the provider message id
//! so retried deliveries collapse onto the existing entry, and hands the
//! whole burst to exactly one winning turn via an atomic [`drain`]. The
//! debounce coordinator polls [`peek_last_arrival`] to learn whether a newer
//! arrival supersedes it and how long the session has been quiet.
//!
//! Sequence numbers, not wall-clock timestamps, decide who owns processing:
//! producers with skewed clocks cannot reorder a session's burst.
//!
//! The [`ArrivalStore`] trait is the seam for shared backends (anything with
//! atomic append-with-assigned-sequence, atomic read-and-clear, and per-key
//! expiry). [`InMemoryArrivalStore`] is the in-process implementation used in
//! tests and single-node deployments.
//!
//! [`drain`]: ArrivalStore::drain
//! [`peek_last_arrival`]: ArrivalStore::peek_last_arrival

mod memory;

pub use memory::InMemoryArrivalStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::types::SessionKey;

/// One buffered inbound message.
///
/// Immutable once created: the buffer never edits an entry, it only appends
/// and drains. `sequence` is strictly increasing per session and survives
/// drains (a later arrival always outranks everything before it, even across
/// turns). `id` is an opaque identity derived from sequence + arrival time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedMessage {
    /// Opaque entry id, derived from sequence + arrival time.
    pub id: String,
    /// Per-session monotonic sequence number (starts at 1).
    pub sequence: u64,
    /// The raw message text as delivered by the transport.
    pub text: String,
    /// Wall-clock arrival time, preserved for the decider's benefit.
    pub received_at: DateTime<Utc>,
}

impl BufferedMessage {
    /// Derives the opaque entry id for a (sequence, arrival-time) pair.
    #[must_use]
    pub fn derive_id(sequence: u64, received_at: DateTime<Utc>) -> String {
        format!("{sequence:08x}-{:011x}", received_at.timestamp_millis())
    }
}

/// What [`ArrivalStore::peek_last_arrival`] reports about a session.
///
/// `sequence` is the latest sequence assigned while anything is still
/// buffered; `idle` is measured against a monotonic clock so debounce math
/// is immune to wall-clock adjustments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrivalMark {
    /// Latest sequence number sitting in the buffer.
    pub sequence: u64,
    /// Wall-clock time of the latest arrival.
    pub at: DateTime<Utc>,
    /// Time elapsed since the latest arrival (monotonic).
    pub idle: Duration,
}

/// Errors surfaced by arrival-buffer backends.
#[derive(Debug, Error, Diagnostic)]
pub enum BufferError {
    #[error("arrival buffer backend error: {message}")]
    #[diagnostic(
        code(colloquy::buffer::backend),
        help("Check the buffer backend (connectivity, lock health) and retry.")
    )]
    Backend { message: String },
}

impl BufferError {
    pub(crate) fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Shared store backing the arrival buffer.
///
/// Implementations must guarantee, per session key:
/// - `append` assigns a sequence strictly greater than every prior one and
///   is idempotent under retried delivery of the same provider message id
///   (the existing entry is returned unchanged and the last-arrival clock is
///   **not** touched: a retry is not a new arrival);
/// - `drain` atomically returns-and-clears the pending entries in sequence
///   order; no concurrent `append` may be lost or double-delivered;
/// - all per-key state self-expires after a bounded TTL so abandoned
///   sessions clean themselves up.
#[async_trait]
pub trait ArrivalStore: Send + Sync {
    /// Appends one inbound message, allocating its sequence number.
    async fn append(
        &self,
        key: &SessionKey,
        text: &str,
        provider_id: &str,
    ) -> Result<BufferedMessage, BufferError>;

    /// Atomically returns and clears all pending entries, oldest first.
    async fn drain(&self, key: &SessionKey) -> Result<Vec<BufferedMessage>, BufferError>;

    /// Reports the latest pending arrival, or `None` when nothing is buffered.
    async fn peek_last_arrival(&self, key: &SessionKey)
    -> Result<Option<ArrivalMark>, BufferError>;
}
