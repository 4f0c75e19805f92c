//! Outbound delivery seam between the turn runner and the messaging
//! transport.
//!
//! The runner never talks to a provider directly; it hands each reply
//! fragment to an [`OutboundGateway`]. Ships with two implementations:
//! [`MemoryGateway`] for tests and snapshots, and [`ChannelGateway`] for
//! streaming deliveries to an async consumer task that owns the real
//! transport.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::types::SessionKey;

/// One reply fragment addressed to a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub session: SessionKey,
    pub text: String,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(session: impl Into<SessionKey>, text: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            text: text.into(),
        }
    }
}

/// Delivery failures. The runner logs these and keeps going; by the time
/// delivery starts the turn is already durable.
#[derive(Debug, Error, Diagnostic)]
pub enum OutboundError {
    /// The consumer side of a channel gateway went away.
    #[error("outbound channel closed")]
    #[diagnostic(code(colloquy::outbound::closed))]
    Closed,

    /// The transport reported a failure.
    #[error("outbound transport error: {message}")]
    #[diagnostic(code(colloquy::outbound::transport))]
    Transport { message: String },
}

/// Abstraction over the thing that actually sends messages to contacts.
#[async_trait]
pub trait OutboundGateway: Send + Sync {
    /// Deliver one fragment. Ordering within a session is the caller's
    /// concern; the runner delivers a turn's fragments sequentially.
    async fn deliver(&self, message: OutboundMessage) -> Result<(), OutboundError>;
}

/// In-memory gateway for tests and snapshots.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    deliveries: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OutboundMessage> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Texts delivered to one session, in order.
    #[must_use]
    pub fn texts_for(&self, session: &SessionKey) -> Vec<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|message| &message.session == session)
            .map(|message| message.text.clone())
            .collect()
    }

    /// Clear all captured deliveries.
    pub fn clear(&self) {
        self.deliveries.lock().unwrap().clear();
    }
}

#[async_trait]
impl OutboundGateway for MemoryGateway {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), OutboundError> {
        self.deliveries.lock().unwrap().push(message);
        Ok(())
    }
}

/// Channel-backed gateway for streaming deliveries to the task that owns
/// the real transport connection.
///
/// # Example
/// ```no_run
/// use colloquy::outbound::{ChannelGateway, OutboundGateway, OutboundMessage};
///
/// # async fn demo() {
/// let (tx, rx) = flume::unbounded();
/// let gateway = ChannelGateway::new(tx);
///
/// // In another task, consume deliveries:
/// tokio::spawn(async move {
///     while let Ok(message) = rx.recv_async().await {
///         println!("-> {}: {}", message.session, message.text);
///     }
/// });
///
/// gateway
///     .deliver(OutboundMessage::new("line/contact", "On it!"))
///     .await
///     .unwrap();
/// # }
/// ```
pub struct ChannelGateway {
    tx: flume::Sender<OutboundMessage>,
}

impl ChannelGateway {
    #[must_use]
    pub fn new(tx: flume::Sender<OutboundMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl OutboundGateway for ChannelGateway {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), OutboundError> {
        self.tx
            .send_async(message)
            .await
            .map_err(|_| OutboundError::Closed)
    }
}
