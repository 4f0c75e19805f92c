//! Flow compilation: structural validation and index construction.
//!
//! Turns the declarative node/edge lists collected by
//! [`FlowBuilder`](super::FlowBuilder) into an immutable [`FlowGraph`].
//! Structural defects that would strand a live conversation are rejected
//! here, before any session can reach them; findings that merely waste
//! graph (unreachable nodes) are surfaced as warnings instead of errors.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::warn;

use super::model::{CompileWarning, FlowGraph};
use crate::types::NodeId;

/// Structural defects that make a flow definition unusable.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum FlowCompileError {
    /// No entry node was declared.
    #[error("flow has no entry node")]
    #[diagnostic(
        code(colloquy::flow::missing_entry),
        help("Declare the starting node with FlowBuilder::with_entry.")
    )]
    MissingEntry,

    /// Two nodes share an id.
    #[error("duplicate node id: {node}")]
    #[diagnostic(
        code(colloquy::flow::duplicate_node),
        help("Node ids must be unique within one flow.")
    )]
    DuplicateNode { node: NodeId },

    /// The declared entry does not name a node.
    #[error("entry node `{entry}` is not defined")]
    #[diagnostic(
        code(colloquy::flow::unknown_entry),
        help("Add the entry node with FlowBuilder::add_node, or point the entry elsewhere.")
    )]
    UnknownEntry { entry: NodeId },

    /// An edge references a node that does not exist.
    #[error("edge {from} -> {to} references undefined node `{missing}`")]
    #[diagnostic(
        code(colloquy::flow::dangling_edge),
        help("Every edge endpoint must name a declared node.")
    )]
    DanglingEdge {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    /// A reachable non-terminal node has no way out, so a session landing
    /// there could never advance.
    #[error("node `{node}` is reachable but has no outgoing edges")]
    #[diagnostic(
        code(colloquy::flow::dead_end),
        help("Give the node an outgoing edge, or mark it terminal.")
    )]
    DeadEnd { node: NodeId },
}

impl super::builder::FlowBuilder {
    /// Validates the collected definition and produces an immutable
    /// [`FlowGraph`].
    ///
    /// Checks, in order: an entry is declared, node ids are unique, the
    /// entry names a real node, every edge endpoint exists, and every node
    /// reachable from the entry is either terminal or has at least one
    /// outgoing edge. Nodes unreachable from the entry are never a hard
    /// error; they land in [`FlowGraph::warnings`] and a `warn` trace so
    /// flow edits cannot be rejected for leaving stale branches behind.
    ///
    /// The resulting graph's version is the builder's base version plus one
    /// (so fresh builders produce version 1).
    pub fn compile(self) -> Result<FlowGraph, FlowCompileError> {
        let entry = self.entry.ok_or(FlowCompileError::MissingEntry)?;

        let mut nodes = FxHashMap::default();
        let mut node_order = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            node_order.push(node.id.clone());
            if let Some(previous) = nodes.insert(node.id.clone(), node) {
                return Err(FlowCompileError::DuplicateNode { node: previous.id });
            }
        }

        if !nodes.contains_key(&entry) {
            return Err(FlowCompileError::UnknownEntry { entry });
        }

        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !nodes.contains_key(endpoint) {
                    return Err(FlowCompileError::DanglingEdge {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }

        // Evaluation order per source: priority ascending, declaration order
        // breaking ties. Sorting indexes keeps the tie-break stable.
        let mut outgoing: FxHashMap<NodeId, Vec<usize>> = FxHashMap::default();
        for (index, edge) in self.edges.iter().enumerate() {
            outgoing.entry(edge.from.clone()).or_default().push(index);
        }
        for indexes in outgoing.values_mut() {
            indexes.sort_by_key(|&index| self.edges[index].priority);
        }

        // Breadth-first sweep from the entry.
        let mut reachable: FxHashSet<&NodeId> = FxHashSet::default();
        let mut queue = VecDeque::from([&entry]);
        reachable.insert(&entry);
        while let Some(current) = queue.pop_front() {
            for &index in outgoing.get(current).into_iter().flatten() {
                let next = &self.edges[index].to;
                if reachable.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        for id in &node_order {
            if !reachable.contains(id) {
                continue;
            }
            let spec = &nodes[id];
            let has_exit = outgoing.get(id).is_some_and(|edges| !edges.is_empty());
            if !spec.kind.is_terminal() && !has_exit {
                return Err(FlowCompileError::DeadEnd { node: id.clone() });
            }
        }

        let mut warnings = Vec::new();
        for id in &node_order {
            if !reachable.contains(id) {
                warn!(node = %id, "flow node is unreachable from the entry");
                warnings.push(CompileWarning::Unreachable { node: id.clone() });
            }
        }

        Ok(FlowGraph {
            version: self.base_version + 1,
            entry,
            nodes,
            node_order,
            edges: self.edges,
            outgoing,
            warnings,
        })
    }
}
