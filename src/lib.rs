//! # Colloquy: Per-Conversation Turn-Processing Runtime
//!
//! Colloquy turns bursty inbound messaging into coherent conversation turns.
//! A debounced arrival buffer decides *when* a burst has settled, a guarded
//! flow graph decides *where* the conversation goes next, and a pluggable
//! decider chooses *what* to say and do, while the turn runner keeps every
//! session race-free without a single per-session lock.
//!
//! ## Core Concepts
//!
//! - **Arrival Buffer**: per-session append-only log with strictly monotonic
//!   sequence numbers, idempotent appends, and atomic drains
//! - **Debounce**: every arrival restarts the quiet window; the last arrival
//!   of a burst wins processing, everyone else is superseded
//! - **Flow Graph**: compiled, versioned conversation graph navigated by
//!   priority-ordered guards; navigation is pure and deterministic
//! - **Decider**: the strategy seam for whatever brain picks replies and
//!   actions; retried, time-boxed, and degraded to a canned reply on failure
//! - **Turn Runner**: the orchestrator that drains, decides, acts, navigates,
//!   persists, and delivers, exactly once per settled burst
//!
//! ## Quick Start
//!
//! ### Working with Turn History
//!
//! [`TurnEntry`](session::TurnEntry) is the history primitive. Use the
//! convenience constructors:
//!
//! ```
//! use colloquy::session::TurnEntry;
//!
//! // Preferred: role-specific constructors
//! let asked = TurnEntry::user("do you have a table tonight?", "welcome");
//! let answered = TurnEntry::assistant("For how many people?", "ask_party_size");
//! let note = TurnEntry::system("session restarted", "welcome");
//!
//! // Role constants keep custom call sites consistent
//! let tagged = TurnEntry::new(TurnEntry::USER, "for four", "ask_party_size");
//!
//! assert!(asked.has_role(TurnEntry::USER));
//! assert!(!answered.has_role(TurnEntry::USER));
//! # let _ = (note, tagged);
//! ```
//!
//! ### Defining a Flow
//!
//! ```
//! use colloquy::flow::{navigate, FlowBuilder, Guard, NodeSpec};
//! use colloquy::types::{AnswerMap, MetadataMap};
//!
//! let graph = FlowBuilder::new()
//!     .with_entry("ask_party_size")
//!     .add_node(NodeSpec::question("ask_party_size", "How many people?", "party_size"))
//!     .add_node(NodeSpec::question("ask_date", "Which evening?", "date"))
//!     .add_node(NodeSpec::terminal("confirmed"))
//!     .add_edge("ask_party_size", "ask_date", Guard::answer_present("party_size"))
//!     .add_edge("ask_date", "confirmed", Guard::answer_present("date"))
//!     .compile()?;
//!
//! let mut answers = AnswerMap::default();
//! answers.insert("party_size".into(), 4.into());
//!
//! let step = navigate::next(&graph, graph.entry(), &answers, &MetadataMap::default());
//! assert_eq!(step.target().map(|n| n.as_str()), Some("ask_date"));
//! # Ok::<(), colloquy::flow::FlowCompileError>(())
//! ```
//!
//! ### Handling Inbound Messages
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use colloquy::debounce::DebounceSettings;
//! use colloquy::decider::{Decider, DeciderError, DecisionRequest, DecisionResponse};
//! use colloquy::flow::{FlowBuilder, Guard, NodeSpec, SharedFlow};
//! use colloquy::outbound::MemoryGateway;
//! use colloquy::settings::RuntimeSettings;
//! use colloquy::turn::{InboundMessage, TurnRunner};
//!
//! struct EchoPrompt;
//!
//! #[async_trait::async_trait]
//! impl Decider for EchoPrompt {
//!     async fn decide(&self, request: DecisionRequest) -> Result<DecisionResponse, DeciderError> {
//!         let prompt = request.node.prompt.clone().unwrap_or_default();
//!         Ok(DecisionResponse::reply(prompt))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let flow = SharedFlow::new(
//!     FlowBuilder::new()
//!         .with_entry("welcome")
//!         .add_node(NodeSpec::question("welcome", "What can we help with?", "topic"))
//!         .add_node(NodeSpec::terminal("done"))
//!         .add_edge("welcome", "done", Guard::answer_present("topic"))
//!         .compile()?,
//! );
//!
//! let gateway = MemoryGateway::new();
//! let quick = DebounceSettings::new(Duration::from_millis(20), Duration::from_millis(5));
//! let runner = TurnRunner::new(flow, Arc::new(EchoPrompt), Arc::new(gateway.clone()))
//!     .with_settings(RuntimeSettings::default().with_debounce(quick));
//!
//! let receipt = runner
//!     .handle_inbound(InboundMessage::new("alice", "line-1", "hi there", "prov-1"))
//!     .await?;
//!
//! assert!(!receipt.is_superseded());
//! assert_eq!(gateway.texts_for(&"line-1/alice".into()), ["What can we help with?"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Best Practices
//!
//! ### Decider Responses
//!
//! ```
//! use colloquy::decider::{ActionRequest, DecisionResponse, ReplyFragment};
//!
//! // ✅ GOOD: build responses with the fluent helpers
//! let response = DecisionResponse::reply("Booked!")
//!     .with_reply(ReplyFragment::new("Anything else?").with_delay_ms(400))
//!     .with_action(ActionRequest::UpdateAnswer {
//!         key: "confirmed".into(),
//!         value: true.into(),
//!     });
//!
//! // ✅ GOOD: validate provider JSON through the one parsing gate
//! let parsed = DecisionResponse::from_json(r#"{"replies": [{"text": "On it."}]}"#).unwrap();
//!
//! // ❌ AVOID: constructing response fields by hand and skipping
//! // `DecisionResponse::validate`: unvalidated responses can smuggle
//! // blank replies and unnamed actions into a turn.
//! # let _ = (response, parsed);
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Session keys, node ids, and the answer/metadata maps
//! - [`session`] - Per-conversation state and turn history
//! - [`buffer`] - Arrival buffer with monotonic sequencing and atomic drains
//! - [`debounce`] - The wait/reset/fire protocol over the buffer
//! - [`flow`] - Flow definition, compilation, navigation, and live edits
//! - [`decider`] - The decision strategy seam and its wire types
//! - [`actions`] - Action dispatch, registry, and result reporting
//! - [`turn`] - The turn runner orchestrating the full lifecycle
//! - [`outbound`] - Delivery seam to the messaging transport
//! - [`store`] - Session persistence (in-memory and SQLite backends)
//! - [`settings`] - Runtime configuration with env resolution
//! - [`telemetry`] - Tracing subscriber wiring for binaries and tests

pub mod actions;
pub mod buffer;
pub mod debounce;
pub mod decider;
pub mod flow;
pub mod outbound;
pub mod session;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod turn;
pub mod types;
