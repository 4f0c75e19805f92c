#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use colloquy::actions::{ActionContext, ActionError, ActionExecutor, ActionResult};
use colloquy::outbound::{OutboundError, OutboundGateway, OutboundMessage};
use colloquy::session::Session;
use colloquy::store::{SessionStore, StoreError};
use colloquy::types::SessionKey;
use serde_json::Value;

/// Session store whose `save` always fails; loads and deletes succeed
/// against nothing.
pub struct UnsavableSessionStore;

#[async_trait]
impl SessionStore for UnsavableSessionStore {
    async fn load(&self, _key: &SessionKey) -> Result<Option<Session>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _session: &Session) -> Result<(), StoreError> {
        Err(StoreError::Backend {
            message: "disk full".into(),
        })
    }

    async fn delete(&self, _key: &SessionKey) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Gateway that refuses every delivery.
pub struct DeadGateway;

#[async_trait]
impl OutboundGateway for DeadGateway {
    async fn deliver(&self, _message: OutboundMessage) -> Result<(), OutboundError> {
        Err(OutboundError::Transport {
            message: "provider rejected the send".into(),
        })
    }
}

/// Action executor that counts invocations and succeeds.
#[derive(Clone, Default)]
pub struct CountingExecutor {
    calls: Arc<AtomicUsize>,
}

impl CountingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionExecutor for CountingExecutor {
    async fn execute(
        &self,
        _params: Value,
        _ctx: &mut ActionContext<'_>,
    ) -> Result<ActionResult, ActionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ActionResult::ok_with("done"))
    }
}
