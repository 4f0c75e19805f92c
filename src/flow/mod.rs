//! Conversation flow graphs: definition, compilation, navigation, and live
//! structural edits.
//!
//! A flow is a directed graph of conversation nodes connected by
//! priority-ordered, guard-gated edges. The main entry point is
//! [`FlowBuilder`], which collects a declarative definition and compiles it
//! into an immutable, versioned [`FlowGraph`]. Sessions navigate the
//! compiled form with the pure functions in [`navigate`], and operators
//! reshape a live graph through [`SharedFlow`] edit batches.
//!
//! # Core Concepts
//!
//! - **Nodes**: typed conversation states ([`NodeSpec`] / [`NodeKind`])
//!   spanning questions that collect answers, routing-only decisions,
//!   terminals, action triggers, and subflow references
//! - **Edges**: guarded transitions ([`EdgeSpec`]) evaluated in ascending
//!   priority order, declaration order breaking ties
//! - **Guards**: pure, total predicates ([`Guard`]) over session answers
//!   and metadata; serializable so flows round-trip as data
//! - **Compilation**: structural validation producing a [`FlowGraph`], with
//!   hard errors for defects that strand sessions and warnings for
//!   unreachable branches
//! - **Versioning**: every accepted edit batch compiles a successor graph
//!   with a bumped version and swaps it in atomically
//!
//! # Quick Start
//!
//! ```rust
//! use colloquy::flow::{navigate, FlowBuilder, Guard, NodeSpec};
//! use colloquy::types::{AnswerMap, MetadataMap};
//!
//! let graph = FlowBuilder::new()
//!     .with_entry("ask_topic")
//!     .add_node(NodeSpec::question("ask_topic", "What can we help with?", "topic"))
//!     .add_node(NodeSpec::question("ask_order", "What's your order number?", "order_id"))
//!     .add_node(NodeSpec::terminal("handoff"))
//!     .add_edge(
//!         "ask_topic",
//!         "ask_order",
//!         Guard::answer_equals("topic", "billing".into()),
//!     )
//!     .add_edge("ask_topic", "handoff", Guard::answer_present("topic"))
//!     .add_edge("ask_order", "handoff", Guard::answer_present("order_id"))
//!     .compile()?;
//!
//! let mut answers = AnswerMap::default();
//! answers.insert("topic".into(), "billing".into());
//! let step = navigate::next(&graph, graph.entry(), &answers, &MetadataMap::default());
//! assert_eq!(step.target().map(|n| n.as_str()), Some("ask_order"));
//! # Ok::<(), colloquy::flow::FlowCompileError>(())
//! ```
//!
//! # Live Edits
//!
//! ```rust
//! use colloquy::flow::{FlowBuilder, FlowEdit, Guard, NodeSpec, SharedFlow};
//!
//! let shared = SharedFlow::new(
//!     FlowBuilder::new()
//!         .with_entry("ask_name")
//!         .add_node(NodeSpec::question("ask_name", "Name?", "name"))
//!         .add_node(NodeSpec::terminal("done"))
//!         .add_edge("ask_name", "done", Guard::answer_present("name"))
//!         .compile()?,
//! );
//!
//! let before = shared.snapshot();
//! shared.apply_versioned(
//!     before.version(),
//!     &[FlowEdit::SetPrompt {
//!         node: "ask_name".into(),
//!         prompt: "And your name is?".into(),
//!     }],
//! )?;
//!
//! // The old snapshot is untouched; new readers see version 2.
//! assert_eq!(before.version() + 1, shared.version());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod compile;
mod edit;
mod guard;
mod model;
pub mod navigate;

pub use builder::FlowBuilder;
pub use compile::FlowCompileError;
pub use edit::{FlowEdit, FlowEditError, SharedFlow};
pub use guard::Guard;
pub use model::{CompileWarning, EdgeSpec, FlowGraph, NodeKind, NodeSpec};
pub use navigate::Navigation;

#[cfg(test)]
mod tests;
