//! In-process arrival buffer.
//!
//! Backs the [`ArrivalStore`] contract with a mutex-guarded map. All three
//! operations lock, mutate, and release without awaiting, so append can
//! never interleave with a drain: a message is either part of the drained
//! burst or still pending for the next turn, never both, never neither.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{ArrivalMark, ArrivalStore, BufferError, BufferedMessage};
use crate::types::SessionKey;

/// Per-session buffer slot.
///
/// `pending` empties on drain; `next_sequence` and the provider-id memory
/// survive until the TTL sweeps the whole slot, so sequences stay strictly
/// increasing across turns and a late redelivery of an already-processed
/// message is still recognized.
#[derive(Debug)]
struct SessionSlot {
    pending: Vec<BufferedMessage>,
    next_sequence: u64,
    seen: FxHashMap<String, BufferedMessage>,
    last_arrival: Option<Instant>,
    last_arrival_at: Option<DateTime<Utc>>,
    expires_at: Instant,
}

impl SessionSlot {
    fn new(expires_at: Instant) -> Self {
        Self {
            pending: Vec::new(),
            next_sequence: 1,
            seen: FxHashMap::default(),
            last_arrival: None,
            last_arrival_at: None,
            expires_at,
        }
    }
}

/// Mutex-guarded, TTL-swept arrival buffer for tests and single-node runs.
///
/// # Examples
///
/// ```rust,no_run
/// use colloquy::buffer::{ArrivalStore, InMemoryArrivalStore};
/// use colloquy::types::SessionKey;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), colloquy::buffer::BufferError> {
/// let store = InMemoryArrivalStore::new(Duration::from_secs(6 * 3600));
/// let key = SessionKey::for_conversation("line-1", "alice");
///
/// let first = store.append(&key, "hello", "prov-1").await?;
/// assert_eq!(first.sequence, 1);
///
/// // Retried delivery of the same provider id collapses onto the entry.
/// let retried = store.append(&key, "hello", "prov-1").await?;
/// assert_eq!(retried.id, first.id);
///
/// let burst = store.drain(&key).await?;
/// assert_eq!(burst.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryArrivalStore {
    slots: Mutex<FxHashMap<SessionKey, SessionSlot>>,
    ttl: Duration,
}

impl InMemoryArrivalStore {
    /// Default slot TTL: six hours, comfortably above any sane debounce
    /// threshold so idempotency memory outlives in-flight turns.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 3600);

    /// Creates a store whose per-session slots expire `ttl` after the most
    /// recent append.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(FxHashMap::default()),
            ttl,
        }
    }

    /// Number of sessions currently holding a live slot (expired slots are
    /// swept first). Mostly useful in tests.
    pub fn live_sessions(&self) -> usize {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(_) => return 0,
        };
        Self::sweep(&mut slots);
        slots.len()
    }

    fn sweep(slots: &mut FxHashMap<SessionKey, SessionSlot>) {
        let now = Instant::now();
        slots.retain(|_, slot| slot.expires_at > now);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FxHashMap<SessionKey, SessionSlot>>, BufferError> {
        self.slots
            .lock()
            .map_err(|_| BufferError::backend("arrival buffer lock poisoned"))
    }
}

impl Default for InMemoryArrivalStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

#[async_trait::async_trait]
impl ArrivalStore for InMemoryArrivalStore {
    async fn append(
        &self,
        key: &SessionKey,
        text: &str,
        provider_id: &str,
    ) -> Result<BufferedMessage, BufferError> {
        let mut slots = self.lock()?;
        Self::sweep(&mut slots);

        let now = Instant::now();
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| SessionSlot::new(now + self.ttl));

        // Retried delivery: same provider id collapses onto the existing
        // entry without resetting the debounce clock.
        if let Some(existing) = slot.seen.get(provider_id) {
            return Ok(existing.clone());
        }

        let received_at = Utc::now();
        let sequence = slot.next_sequence;
        slot.next_sequence += 1;

        let message = BufferedMessage {
            id: BufferedMessage::derive_id(sequence, received_at),
            sequence,
            text: text.to_string(),
            received_at,
        };

        slot.pending.push(message.clone());
        slot.seen.insert(provider_id.to_string(), message.clone());
        slot.last_arrival = Some(now);
        slot.last_arrival_at = Some(received_at);
        slot.expires_at = now + self.ttl;

        Ok(message)
    }

    async fn drain(&self, key: &SessionKey) -> Result<Vec<BufferedMessage>, BufferError> {
        let mut slots = self.lock()?;
        Self::sweep(&mut slots);

        let Some(slot) = slots.get_mut(key) else {
            return Ok(Vec::new());
        };
        // The slot itself stays (sequence counter + idempotency memory);
        // only pending entries and the arrival clock are consumed.
        slot.last_arrival = None;
        slot.last_arrival_at = None;
        Ok(std::mem::take(&mut slot.pending))
    }

    async fn peek_last_arrival(
        &self,
        key: &SessionKey,
    ) -> Result<Option<ArrivalMark>, BufferError> {
        let mut slots = self.lock()?;
        Self::sweep(&mut slots);

        let Some(slot) = slots.get(key) else {
            return Ok(None);
        };
        if slot.pending.is_empty() {
            return Ok(None);
        }
        let (Some(last_arrival), Some(at)) = (slot.last_arrival, slot.last_arrival_at) else {
            return Ok(None);
        };
        let sequence = slot
            .pending
            .last()
            .map(|m| m.sequence)
            .unwrap_or(slot.next_sequence.saturating_sub(1));
        Ok(Some(ArrivalMark {
            sequence,
            at,
            idle: last_arrival.elapsed(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::for_conversation("line-1", "alice")
    }

    #[tokio::test]
    /// Sequences increase strictly, starting at 1.
    async fn sequences_are_monotonic() {
        let store = InMemoryArrivalStore::default();
        let k = key();
        for expected in 1..=5u64 {
            let msg = store
                .append(&k, "hi", &format!("prov-{expected}"))
                .await
                .unwrap();
            assert_eq!(msg.sequence, expected);
        }
    }

    #[tokio::test]
    /// The sequence counter survives a drain; later arrivals outrank
    /// everything that came before, across turns.
    async fn sequences_survive_drain() {
        let store = InMemoryArrivalStore::default();
        let k = key();
        store.append(&k, "one", "p1").await.unwrap();
        store.append(&k, "two", "p2").await.unwrap();
        assert_eq!(store.drain(&k).await.unwrap().len(), 2);

        let next = store.append(&k, "three", "p3").await.unwrap();
        assert_eq!(next.sequence, 3);
    }

    #[tokio::test]
    /// A duplicate provider id returns the original entry and does not
    /// duplicate content.
    async fn duplicate_provider_id_is_idempotent() {
        let store = InMemoryArrivalStore::default();
        let k = key();
        let first = store.append(&k, "hello", "prov-1").await.unwrap();
        let retry = store.append(&k, "hello", "prov-1").await.unwrap();
        assert_eq!(first.id, retry.id);
        assert_eq!(first.sequence, retry.sequence);

        let burst = store.drain(&k).await.unwrap();
        assert_eq!(burst.len(), 1);
    }

    #[tokio::test]
    /// A redelivery after the original was drained is recognized and does
    /// not resurrect the message.
    async fn duplicate_after_drain_stays_consumed() {
        let store = InMemoryArrivalStore::default();
        let k = key();
        let original = store.append(&k, "hello", "prov-1").await.unwrap();
        store.drain(&k).await.unwrap();

        let retry = store.append(&k, "hello", "prov-1").await.unwrap();
        assert_eq!(retry.id, original.id);
        assert!(store.drain(&k).await.unwrap().is_empty());
        assert!(store.peek_last_arrival(&k).await.unwrap().is_none());
    }

    #[tokio::test]
    /// peek reports the newest pending sequence and goes quiet after drain.
    async fn peek_tracks_pending_only() {
        let store = InMemoryArrivalStore::default();
        let k = key();
        assert!(store.peek_last_arrival(&k).await.unwrap().is_none());

        store.append(&k, "one", "p1").await.unwrap();
        store.append(&k, "two", "p2").await.unwrap();
        let mark = store.peek_last_arrival(&k).await.unwrap().unwrap();
        assert_eq!(mark.sequence, 2);

        store.drain(&k).await.unwrap();
        assert!(store.peek_last_arrival(&k).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    /// Slots expire after the TTL, including idempotency memory.
    async fn slots_expire_after_ttl() {
        let store = InMemoryArrivalStore::new(Duration::from_secs(60));
        let k = key();
        store.append(&k, "hello", "prov-1").await.unwrap();
        assert_eq!(store.live_sessions(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.live_sessions(), 0);

        // Same provider id now starts a fresh slot at sequence 1.
        let fresh = store.append(&k, "hello", "prov-1").await.unwrap();
        assert_eq!(fresh.sequence, 1);
    }

    #[tokio::test]
    /// Sessions are fully independent.
    async fn sessions_do_not_share_sequences() {
        let store = InMemoryArrivalStore::default();
        let a = SessionKey::from("a");
        let b = SessionKey::from("b");
        store.append(&a, "one", "p1").await.unwrap();
        let first_b = store.append(&b, "uno", "p1").await.unwrap();
        assert_eq!(first_b.sequence, 1);
    }
}
