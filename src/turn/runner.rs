use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::actions::{dispatch, ActionContext, ActionRegistry};
use crate::buffer::{ArrivalStore, BufferedMessage, InMemoryArrivalStore};
use crate::debounce::DebounceCoordinator;
use crate::decider::{
    ActionRequest, Decider, DeciderError, DecisionRequest, DecisionResponse, ExecutedAction,
    InputFragment, ReplyFragment,
};
use crate::flow::{navigate, FlowGraph, NodeKind, NodeSpec, SharedFlow};
use crate::outbound::{OutboundGateway, OutboundMessage};
use crate::session::{Session, TurnEntry};
use crate::settings::RuntimeSettings;
use crate::store::{InMemorySessionStore, SessionStore};
use crate::types::SessionKey;

use super::report::{NavigationTrace, TurnError, TurnPhase, TurnReceipt, TurnReport};

/// One raw inbound message as the transport hands it over.
///
/// `provider_id` is the provider's message id and doubles as the
/// idempotency key: a retried webhook delivery of the same id collapses
/// onto the already-buffered entry instead of becoming a new arrival.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The contact who sent the message.
    pub sender: String,
    /// The tenant-owned line that received it.
    pub receiver: String,
    /// Raw message text.
    pub text: String,
    /// Provider message id, used for retry idempotency.
    pub provider_id: String,
}

impl InboundMessage {
    #[must_use]
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        text: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            text: text.into(),
            provider_id: provider_id.into(),
        }
    }

    /// The conversation this message belongs to.
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        SessionKey::for_conversation(&self.receiver, &self.sender)
    }
}

/// Orchestrates one conversation turn end to end: buffer the arrival, wait
/// out the debounce window, consult the decider, execute actions, navigate,
/// persist, deliver.
///
/// The runner holds only shared handles, so it is cheap to clone and safe
/// to share: the intended deployment spawns one
/// [`handle_inbound`](Self::handle_inbound) task per inbound message on a
/// clone of the same runner. Per-session exclusivity is not a lock; it
/// falls out of the debounce protocol, because at most one coordinator per
/// session survives to the draining step.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use colloquy::debounce::DebounceSettings;
/// use colloquy::decider::{Decider, DeciderError, DecisionRequest, DecisionResponse};
/// use colloquy::flow::{FlowBuilder, Guard, NodeSpec, SharedFlow};
/// use colloquy::outbound::MemoryGateway;
/// use colloquy::settings::RuntimeSettings;
/// use colloquy::turn::{InboundMessage, TurnRunner};
///
/// struct AlwaysGreets;
///
/// #[async_trait::async_trait]
/// impl Decider for AlwaysGreets {
///     async fn decide(&self, _: DecisionRequest) -> Result<DecisionResponse, DeciderError> {
///         Ok(DecisionResponse::reply("Hi! What can we do for you?"))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let flow = SharedFlow::new(
///     FlowBuilder::new()
///         .with_entry("welcome")
///         .add_node(NodeSpec::question("welcome", "Hello?", "topic"))
///         .add_node(NodeSpec::terminal("done"))
///         .add_edge("welcome", "done", Guard::answer_present("topic"))
///         .compile()?,
/// );
/// let gateway = MemoryGateway::new();
///
/// let quick = DebounceSettings::new(Duration::from_millis(20), Duration::from_millis(5));
/// let runner = TurnRunner::new(flow, Arc::new(AlwaysGreets), Arc::new(gateway.clone()))
///     .with_settings(RuntimeSettings::default().with_debounce(quick));
///
/// let receipt = runner
///     .handle_inbound(InboundMessage::new("alice", "line-1", "hello", "prov-1"))
///     .await?;
/// assert!(!receipt.is_superseded());
/// assert_eq!(gateway.snapshot().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TurnRunner {
    flow: SharedFlow,
    buffer: Arc<dyn ArrivalStore>,
    sessions: Arc<dyn SessionStore>,
    decider: Arc<dyn Decider>,
    registry: Arc<ActionRegistry>,
    gateway: Arc<dyn OutboundGateway>,
    settings: RuntimeSettings,
}

impl std::fmt::Debug for TurnRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnRunner")
            .field("flow_version", &self.flow.version())
            .field("settings", &self.settings)
            .finish()
    }
}

impl TurnRunner {
    /// Creates a runner over the given flow, decider, and outbound gateway.
    ///
    /// The remaining collaborators default to in-process implementations
    /// (in-memory arrival buffer and session store, empty action registry,
    /// [`RuntimeSettings::default`]); swap them with the `with_*` methods.
    #[must_use]
    pub fn new(
        flow: SharedFlow,
        decider: Arc<dyn Decider>,
        gateway: Arc<dyn OutboundGateway>,
    ) -> Self {
        let settings = RuntimeSettings::default();
        Self {
            flow,
            buffer: Arc::new(InMemoryArrivalStore::new(settings.buffer_ttl)),
            sessions: Arc::new(InMemorySessionStore::new()),
            decider,
            registry: Arc::new(ActionRegistry::default()),
            gateway,
            settings,
        }
    }

    /// Replaces the arrival buffer backend.
    #[must_use]
    pub fn with_buffer(mut self, buffer: Arc<dyn ArrivalStore>) -> Self {
        self.buffer = buffer;
        self
    }

    /// Replaces the session store.
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Installs the action registry the dispatcher routes `invoke` through.
    #[must_use]
    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Replaces the runtime settings.
    ///
    /// Note: `buffer_ttl` only configures buffers this runner constructs
    /// itself; a store installed via [`with_buffer`](Self::with_buffer)
    /// keeps its own TTL.
    #[must_use]
    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The shared flow handle this runner navigates against.
    #[must_use]
    pub fn flow(&self) -> &SharedFlow {
        &self.flow
    }

    /// Processes one inbound message through a full turn lifecycle.
    ///
    /// Every arrival calls this; most calls during a burst return
    /// [`TurnReceipt::Superseded`] after the debounce wait and cost nothing
    /// else. The last arrival of the burst drains the buffer, runs the
    /// deciding/acting/persisting phases, and returns
    /// [`TurnReceipt::Completed`].
    ///
    /// Errors mean the message was **not** processed and is safe to
    /// redeliver; see [`TurnError`].
    #[instrument(skip(self, message), fields(session = %message.session_key(), provider_id = %message.provider_id), err)]
    pub async fn handle_inbound(&self, message: InboundMessage) -> Result<TurnReceipt, TurnError> {
        let key = message.session_key();

        let appended = self
            .buffer
            .append(&key, &message.text, &message.provider_id)
            .await?;
        debug!(
            phase = %TurnPhase::Debouncing,
            sequence = appended.sequence,
            "arrival buffered; waiting for quiet"
        );

        let coordinator =
            DebounceCoordinator::new(self.buffer.clone(), self.settings.debounce.clone());
        let outcome = coordinator.wait_for_quiet(&key, appended.sequence).await?;

        let Some(burst) = outcome.into_burst() else {
            debug!(sequence = appended.sequence, "superseded by a later arrival");
            return Ok(TurnReceipt::Superseded {
                session: key,
                sequence: appended.sequence,
            });
        };

        let report = self.run_turn(key, &message.receiver, burst).await?;
        Ok(TurnReceipt::Completed(report))
    }

    /// Runs the mutating phases of a turn against a settled burst.
    #[instrument(skip_all, fields(session = %key, messages = burst.len()))]
    async fn run_turn(
        &self,
        key: SessionKey,
        tenant: &str,
        burst: Vec<BufferedMessage>,
    ) -> Result<TurnReport, TurnError> {
        let turn_id = Uuid::new_v4();
        let consumed_sequences: Vec<u64> = burst.iter().map(|message| message.sequence).collect();
        info!(turn = %turn_id, "turn started");

        let mut session = self.load_or_create(&key, tenant).await?;
        let graph = self.flow.snapshot();
        let node_at_start = session.current_node.clone();
        let node_context = self.node_context(&graph, &session);

        let request = self.build_request(&session, &node_context, &burst, None);
        let aggregated: Vec<&str> = burst.iter().map(|message| message.text.as_str()).collect();
        session.push_history(TurnEntry::user(&aggregated.join("\n"), node_at_start));

        let (response, mut degraded) = self.decide_with_retry(TurnPhase::Deciding, request).await;
        let mut replies = response.replies;

        let executed = self
            .execute_actions(&response.actions, &mut session, graph.version())
            .await;

        let mut feedback_ran = false;
        if !degraded && self.wants_feedback(&executed) {
            feedback_ran = true;
            let request =
                self.build_request(&session, &node_context, &burst, Some(executed.clone()));
            let (feedback, feedback_degraded) =
                self.decide_with_retry(TurnPhase::Feedback, request).await;
            if !feedback.actions.is_empty() {
                // Feedback passes may only speak; declared actions are
                // dropped so a turn executes exactly one action batch.
                debug!(
                    ignored = feedback.actions.len(),
                    "feedback pass declared actions; ignoring"
                );
            }
            replies = feedback.replies;
            degraded = feedback_degraded;
        }

        // Actions may have moved the session or swapped the graph, so
        // navigation runs against a fresh snapshot.
        let nav_graph = self.flow.snapshot();
        let from = session.current_node.clone();
        let path = navigate::advance(&nav_graph, &from, &session.answers, &session.metadata);
        if let Some(settled) = path.last() {
            session.move_to(settled.clone());
        } else {
            debug!(node = %from, "no guard matched; session holds");
        }
        let navigation = NavigationTrace { from, path };

        let final_node = session.current_node.clone();
        for fragment in &replies {
            session.push_history(TurnEntry::assistant(&fragment.text, final_node.clone()));
        }
        session.complete_turn();

        self.persist(&session).await?;

        let delivered = self.deliver_replies(&key, &replies).await;

        info!(
            turn = %turn_id,
            node = %final_node,
            actions = executed.len(),
            delivered,
            degraded,
            "turn completed"
        );
        Ok(TurnReport {
            turn_id,
            session: key,
            consumed_sequences,
            degraded,
            feedback_ran,
            actions: executed,
            navigation,
            delivered,
        })
    }

    #[instrument(skip_all, fields(session = %key), err)]
    async fn load_or_create(&self, key: &SessionKey, tenant: &str) -> Result<Session, TurnError> {
        if let Some(session) = self
            .sessions
            .load(key)
            .await
            .map_err(|source| TurnError::Load { source })?
        {
            debug!(
                node = %session.current_node,
                turns = session.turns_completed,
                "session restored"
            );
            return Ok(session);
        }

        let mut session = Session::fresh(key.clone(), self.flow.snapshot().entry().clone());
        if !tenant.is_empty() {
            session.tenant = Some(tenant.to_string());
        }
        info!(entry = %session.current_node, "fresh session created");
        Ok(session)
    }

    /// The node spec the decider reasons about. A restored session can sit
    /// on a node a later edit removed; navigation will hold there, and the
    /// decider still needs *some* context, so an empty stand-in is
    /// synthesized.
    fn node_context(&self, graph: &FlowGraph, session: &Session) -> NodeSpec {
        graph
            .node(&session.current_node)
            .cloned()
            .unwrap_or_else(|| {
                warn!(
                    node = %session.current_node,
                    "session parked on a node absent from the current flow"
                );
                NodeSpec::new(session.current_node.clone(), NodeKind::Question)
            })
    }

    fn build_request(
        &self,
        session: &Session,
        node: &NodeSpec,
        burst: &[BufferedMessage],
        feedback: Option<Vec<ExecutedAction>>,
    ) -> DecisionRequest {
        DecisionRequest {
            session: session.key.clone(),
            node: node.clone(),
            input: burst.iter().map(InputFragment::from).collect(),
            history: session.recent_history(self.settings.history_window).to_vec(),
            answers: session.answers.clone(),
            metadata: session.metadata.clone(),
            privileged: session.is_privileged(),
            feedback,
        }
    }

    /// Consults the decider with a per-attempt deadline and jittered
    /// exponential backoff between attempts. Exhaustion degrades to the
    /// canned fallback reply; the second element reports whether that
    /// happened. Raw decider errors never reach the contact.
    #[instrument(skip(self, request), fields(phase = %phase, node = %request.node.id))]
    async fn decide_with_retry(
        &self,
        phase: TurnPhase,
        request: DecisionRequest,
    ) -> (DecisionResponse, bool) {
        let decider = &self.settings.decider;
        let attempts = decider.retries.saturating_add(1);

        for attempt in 1..=attempts {
            let outcome =
                tokio::time::timeout(decider.timeout, self.decider.decide(request.clone())).await;
            let error = match outcome {
                Ok(Ok(response)) => match response.validate() {
                    Ok(()) => {
                        debug!(attempt, "decision accepted");
                        return (response, false);
                    }
                    Err(error) => error,
                },
                Ok(Err(error)) => error,
                Err(_) => DeciderError::Timeout {
                    elapsed_ms: decider.timeout.as_millis() as u64,
                },
            };
            warn!(attempt, error = %error, "decision attempt failed");
            if attempt < attempts {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }
        }

        warn!(attempts, "decision attempts exhausted; using canned reply");
        (self.fallback_response(), true)
    }

    /// Delay before retry number `attempt + 1`: the exponential step for
    /// this attempt, jittered down to at most half so synchronized sessions
    /// fan out.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let step = self
            .settings
            .decider
            .backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let millis = step.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(millis / 2..=millis.max(1)))
    }

    fn fallback_response(&self) -> DecisionResponse {
        DecisionResponse::reply(self.settings.fallback_reply.clone())
    }

    #[instrument(skip_all, fields(phase = %TurnPhase::ExecutingActions, actions = requests.len()))]
    async fn execute_actions(
        &self,
        requests: &[ActionRequest],
        session: &mut Session,
        flow_version: u64,
    ) -> Vec<ExecutedAction> {
        let privileged = session.is_privileged();
        let mut ctx = ActionContext {
            session,
            flow: &self.flow,
            flow_version,
            privileged,
        };

        let mut executed = Vec::with_capacity(requests.len());
        for request in requests {
            let result = dispatch(request, &self.registry, &mut ctx).await;
            executed.push(ExecutedAction {
                request: request.clone(),
                result,
            });
        }
        executed
    }

    /// Whether the executed batch warrants a feedback pass: any failed
    /// result, or any action whose binding asks the decider to react to the
    /// real outcome. Escalations and flow edits always do.
    fn wants_feedback(&self, executed: &[ExecutedAction]) -> bool {
        executed.iter().any(|action| {
            if !action.result.success {
                return true;
            }
            match &action.request {
                ActionRequest::Escalate { .. } | ActionRequest::EditFlow { .. } => true,
                ActionRequest::Invoke { name, .. } => self
                    .registry
                    .flags(name)
                    .is_some_and(|flags| flags.feedback),
                _ => false,
            }
        })
    }

    #[instrument(skip_all, fields(phase = %TurnPhase::Persisting, session = %session.key), err)]
    async fn persist(&self, session: &Session) -> Result<(), TurnError> {
        self.sessions
            .save(session)
            .await
            .map_err(|source| TurnError::Persist { source })
    }

    /// Hands reply fragments to the gateway in order, honoring each
    /// fragment's send-delay. The turn is already durable here, so delivery
    /// failures are logged and skipped rather than aborting.
    #[instrument(skip_all, fields(phase = %TurnPhase::Done, fragments = replies.len()))]
    async fn deliver_replies(&self, key: &SessionKey, replies: &[ReplyFragment]) -> usize {
        let mut delivered = 0;
        for fragment in replies {
            if let Some(delay_ms) = fragment.delay_ms {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            match self
                .gateway
                .deliver(OutboundMessage::new(key.clone(), fragment.text.clone()))
                .await
            {
                Ok(()) => delivered += 1,
                Err(error) => warn!(error = %error, "reply delivery failed"),
            }
        }
        delivered
    }
}
