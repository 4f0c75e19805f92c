//! Declarative and compiled forms of a conversation flow graph.
//!
//! [`NodeSpec`] and [`EdgeSpec`] are the declarative inputs collected by
//! [`FlowBuilder`](super::FlowBuilder); [`FlowGraph`] is the validated,
//! immutable compiled form one flow version navigates against. The compiled
//! graph keeps the declarative specs alongside its indexes so structural
//! edits can rebuild, re-validate, and swap in a successor version.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::guard::Guard;
use crate::types::NodeId;

/// What role a node plays in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Prompts the contact and stores their reply under an answer key.
    Question,
    /// Pure routing point: navigation hops through it without consuming a
    /// turn.
    Decision,
    /// Conversation endpoint; no outgoing edges required.
    Terminal,
    /// A node whose purpose is triggering actions rather than asking.
    Action,
    /// Waypoint referencing another named flow; invoking the nested flow is
    /// the embedder's concern.
    Subflow { flow: String },
}

impl NodeKind {
    /// Returns `true` for [`Terminal`](Self::Terminal) nodes.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    /// Returns `true` for [`Decision`](Self::Decision) nodes.
    #[must_use]
    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Decision)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Question => write!(f, "question"),
            Self::Decision => write!(f, "decision"),
            Self::Terminal => write!(f, "terminal"),
            Self::Action => write!(f, "action"),
            Self::Subflow { flow } => write!(f, "subflow:{flow}"),
        }
    }
}

/// Declarative description of one flow node.
///
/// # Examples
///
/// ```rust
/// use colloquy::flow::NodeSpec;
///
/// let ask = NodeSpec::question("ask_name", "What's your name?", "name");
/// assert_eq!(ask.answer_key.as_deref(), Some("name"));
///
/// let done = NodeSpec::terminal("goodbye").with_prompt("Thanks for writing in!");
/// assert!(done.kind.is_terminal());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique id within the graph.
    pub id: NodeId,
    /// What role the node plays.
    pub kind: NodeKind,
    /// Prompt or template the decider receives when the session sits here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Where a Question node's settled reply is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key: Option<String>,
}

impl NodeSpec {
    /// Creates a bare node of the given kind.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            prompt: None,
            answer_key: None,
        }
    }

    /// Creates a Question node with its prompt and answer key.
    #[must_use]
    pub fn question(
        id: impl Into<NodeId>,
        prompt: impl Into<String>,
        answer_key: impl Into<String>,
    ) -> Self {
        Self::new(id, NodeKind::Question)
            .with_prompt(prompt)
            .with_answer_key(answer_key)
    }

    /// Creates a Decision (routing) node.
    #[must_use]
    pub fn decision(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::Decision)
    }

    /// Creates a Terminal node.
    #[must_use]
    pub fn terminal(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::Terminal)
    }

    /// Creates an Action node.
    #[must_use]
    pub fn action(id: impl Into<NodeId>, prompt: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Action).with_prompt(prompt)
    }

    /// Creates a Subflow-reference node.
    #[must_use]
    pub fn subflow(id: impl Into<NodeId>, flow: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Subflow { flow: flow.into() })
    }

    /// Sets the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Sets the answer key.
    #[must_use]
    pub fn with_answer_key(mut self, key: impl Into<String>) -> Self {
        self.answer_key = Some(key.into());
        self
    }
}

/// Declarative description of one guarded transition.
///
/// Edges from one source are evaluated in ascending `priority` order, ties
/// broken by declaration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// Source node id.
    pub from: NodeId,
    /// Target node id.
    pub to: NodeId,
    /// Lower priorities are evaluated first.
    pub priority: u32,
    /// The predicate gating this transition.
    pub guard: Guard,
}

/// Non-fatal findings surfaced by graph compilation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompileWarning {
    /// The node can never be reached from the entry.
    Unreachable { node: NodeId },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { node } => write!(f, "node `{node}` is unreachable from the entry"),
        }
    }
}

/// One validated, immutable flow version.
///
/// Produced by [`FlowBuilder::compile`](super::FlowBuilder::compile) and by
/// accepted structural-edit batches (which bump `version`). Navigation and
/// the turn runner only ever read it; mutation happens by compiling a
/// successor and atomically swapping the shared handle.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    pub(super) version: u64,
    pub(super) entry: NodeId,
    pub(super) nodes: FxHashMap<NodeId, NodeSpec>,
    /// Declarative node list in declaration order, for rebuilds.
    pub(super) node_order: Vec<NodeId>,
    /// Declarative edge list in declaration order, for rebuilds.
    pub(super) edges: Vec<EdgeSpec>,
    /// Per-source indexes into `edges`, pre-sorted by (priority, declaration).
    pub(super) outgoing: FxHashMap<NodeId, Vec<usize>>,
    pub(super) warnings: Vec<CompileWarning>,
}

impl FlowGraph {
    /// This graph version number (fresh compiles start at 1; every accepted
    /// edit batch bumps it).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The node a fresh session starts at.
    #[must_use]
    pub fn entry(&self) -> &NodeId {
        &self.entry
    }

    /// Looks up one node.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&NodeSpec> {
        self.nodes.get(id)
    }

    /// Whether the graph contains `id`.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Outgoing edges of `id` in evaluation order (priority ascending,
    /// declaration order breaking ties).
    pub fn edges_from<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a EdgeSpec> + 'a {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|&index| &self.edges[index])
    }

    /// Non-fatal findings from compilation (unreachable nodes).
    #[must_use]
    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    /// Rebuilds a [`FlowBuilder`](super::FlowBuilder) holding this graph's
    /// declarative specs. Structural edits start here.
    #[must_use]
    pub fn to_builder(&self) -> super::FlowBuilder {
        let mut builder = super::FlowBuilder::new()
            .with_entry(self.entry.clone())
            .with_version(self.version);
        for id in &self.node_order {
            if let Some(spec) = self.nodes.get(id) {
                builder = builder.add_node(spec.clone());
            }
        }
        for edge in &self.edges {
            builder = builder.add_edge_with_priority(
                edge.from.clone(),
                edge.to.clone(),
                edge.priority,
                edge.guard.clone(),
            );
        }
        builder
    }
}
