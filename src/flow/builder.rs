//! Fluent assembly of a flow definition prior to compilation.

use tracing::warn;

use super::guard::Guard;
use super::model::{EdgeSpec, NodeSpec};
use crate::types::NodeId;

/// Spacing between auto-assigned edge priorities, leaving room to splice
/// edits between existing edges without renumbering.
const PRIORITY_STRIDE: u32 = 10;

/// Collects nodes and guarded edges, then [`compile`](Self::compile)s them
/// into an immutable [`FlowGraph`](super::FlowGraph).
///
/// # Examples
///
/// ```rust
/// use colloquy::flow::{FlowBuilder, Guard, NodeSpec};
///
/// let graph = FlowBuilder::new()
///     .with_entry("ask_name")
///     .add_node(NodeSpec::question("ask_name", "What's your name?", "name"))
///     .add_node(NodeSpec::terminal("goodbye"))
///     .add_edge("ask_name", "goodbye", Guard::answer_present("name"))
///     .compile()
///     .unwrap();
///
/// assert_eq!(graph.version(), 1);
/// assert_eq!(graph.node_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FlowBuilder {
    pub entry: Option<NodeId>,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
    pub(super) base_version: u64,
}

impl FlowBuilder {
    /// Creates an empty builder. Compiling it fails until an entry and at
    /// least that node exist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares which node a fresh session starts at.
    #[must_use]
    pub fn with_entry(mut self, entry: impl Into<NodeId>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Seeds the version counter, so an edited graph compiles as
    /// `base_version + 1`. Fresh builders compile to version 1.
    #[must_use]
    pub fn with_version(mut self, base_version: u64) -> Self {
        self.base_version = base_version;
        self
    }

    /// Adds a node. Duplicate ids are kept here and rejected at compile
    /// time, so the error carries full context.
    #[must_use]
    pub fn add_node(mut self, node: NodeSpec) -> Self {
        if self.nodes.iter().any(|existing| existing.id == node.id) {
            warn!(node = %node.id, "duplicate node id queued; compile will reject it");
        }
        self.nodes.push(node);
        self
    }

    /// Adds a guarded edge with the next auto-assigned priority: declaration
    /// order, spaced apart so later edits can splice between existing edges.
    #[must_use]
    pub fn add_edge(self, from: impl Into<NodeId>, to: impl Into<NodeId>, guard: Guard) -> Self {
        let priority = self.edges.len() as u32 * PRIORITY_STRIDE;
        self.add_edge_with_priority(from, to, priority, guard)
    }

    /// Adds a guarded edge with an explicit priority. Lower priorities are
    /// evaluated first; equal priorities fall back to declaration order.
    #[must_use]
    pub fn add_edge_with_priority(
        mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        priority: u32,
        guard: Guard,
    ) -> Self {
        self.edges.push(EdgeSpec {
            from: from.into(),
            to: to.into(),
            priority,
            guard,
        });
        self
    }

    /// Convenience for the common "otherwise" edge: always matches, at a
    /// priority after everything declared so far.
    #[must_use]
    pub fn add_fallback_edge(self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.add_edge(from, to, Guard::Always)
    }
}
