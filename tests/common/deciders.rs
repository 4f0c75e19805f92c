#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use colloquy::decider::{Decider, DeciderError, DecisionRequest, DecisionResponse};

/// Plays back a fixed script of outcomes, one per `decide` call, and
/// records every request it saw. An exhausted script keeps answering with
/// a bland acknowledgement so late feedback passes never fault the test.
pub struct ScriptedDecider {
    script: Mutex<VecDeque<Result<DecisionResponse, DeciderError>>>,
    seen: Mutex<Vec<DecisionRequest>>,
}

impl ScriptedDecider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, response: DecisionResponse) -> Self {
        self.script.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn then_err(self, error: DeciderError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Default for ScriptedDecider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Decider for ScriptedDecider {
    async fn decide(&self, request: DecisionRequest) -> Result<DecisionResponse, DeciderError> {
        self.seen.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DecisionResponse::reply("Noted. Anything else?")))
    }
}

/// Fails every attempt with a provider error.
pub struct BrokenDecider;

#[async_trait]
impl Decider for BrokenDecider {
    async fn decide(&self, _request: DecisionRequest) -> Result<DecisionResponse, DeciderError> {
        Err(DeciderError::Provider {
            message: "backend unreachable".into(),
        })
    }
}

/// Never resolves; exercises the per-attempt deadline.
pub struct StalledDecider;

#[async_trait]
impl Decider for StalledDecider {
    async fn decide(&self, _request: DecisionRequest) -> Result<DecisionResponse, DeciderError> {
        std::future::pending().await
    }
}
