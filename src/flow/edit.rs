//! Structural flow edits: validated batches against a shared live graph.
//!
//! Live conversations keep navigating a [`FlowGraph`] while operators (or
//! privileged decider actions) reshape it. [`SharedFlow`] is the handle both
//! sides use: readers clone out the current immutable graph, and an edit
//! batch rebuilds a private copy, applies every [`FlowEdit`] in order,
//! re-runs full compilation, and only then swaps the new version in. A batch
//! that fails any step changes nothing.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{info, instrument};

use super::builder::FlowBuilder;
use super::compile::FlowCompileError;
use super::guard::Guard;
use super::model::{EdgeSpec, FlowGraph, NodeSpec};
use crate::types::NodeId;

/// One structural change to a flow definition.
///
/// Edits are plain data so deciders and admin surfaces can propose them as
/// JSON. Within a batch they apply strictly in order, so an edit may refer
/// to a node introduced earlier in the same batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FlowEdit {
    /// Introduce a node.
    AddNode { node: NodeSpec },
    /// Remove a node and every edge touching it.
    RemoveNode { node: NodeId },
    /// Introduce a guarded edge. Without an explicit priority the edge is
    /// evaluated after everything already declared.
    AddEdge {
        from: NodeId,
        to: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<u32>,
        guard: Guard,
    },
    /// Remove the first edge matching `from -> to`.
    RemoveEdge { from: NodeId, to: NodeId },
    /// Replace a node's prompt text.
    SetPrompt { node: NodeId, prompt: String },
    /// Repoint the entry node.
    SetEntry { node: NodeId },
}

/// Why an edit batch was rejected. The live graph is untouched in every
/// case.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum FlowEditError {
    /// An edit referenced a node the working copy does not have.
    #[error("edit references unknown node `{node}`")]
    #[diagnostic(
        code(colloquy::flow::edit::unknown_node),
        help("Add the node earlier in the batch, or fix the id.")
    )]
    UnknownNode { node: NodeId },

    /// A RemoveEdge found nothing to remove.
    #[error("no edge {from} -> {to} to remove")]
    #[diagnostic(code(colloquy::flow::edit::unknown_edge))]
    UnknownEdge { from: NodeId, to: NodeId },

    /// An AddNode collided with an existing id.
    #[error("node `{node}` already exists")]
    #[diagnostic(
        code(colloquy::flow::edit::duplicate_node),
        help("Remove the existing node first, or pick another id.")
    )]
    DuplicateNode { node: NodeId },

    /// The live graph moved on since the batch was prepared.
    #[error("flow version conflict: batch prepared against {expected}, live graph is {found}")]
    #[diagnostic(
        code(colloquy::flow::edit::conflict),
        help("Re-read the flow and rebuild the batch against the current version.")
    )]
    Conflict { expected: u64, found: u64 },

    /// The edited definition failed re-validation.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] FlowCompileError),
}

/// Shared handle to the live flow graph.
///
/// Cloning the handle is cheap and every clone observes the same graph.
/// Reads never block on edits for longer than the pointer swap; each turn
/// works against the [`snapshot`](Self::snapshot) it took, so a mid-turn
/// edit lands on the next turn.
#[derive(Clone, Debug)]
pub struct SharedFlow {
    inner: Arc<RwLock<Arc<FlowGraph>>>,
}

impl SharedFlow {
    /// Wraps a compiled graph in a shared handle.
    #[must_use]
    pub fn new(graph: FlowGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(graph))),
        }
    }

    /// The current graph. The returned [`Arc`] stays valid (and unchanged)
    /// however many edits land afterwards.
    ///
    /// The lock only ever guards a pointer swap, so a poisoned lock still
    /// holds a complete graph and is safe to read through.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FlowGraph> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Version of the current graph.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }

    /// Applies an edit batch against whatever graph is live right now.
    ///
    /// See [`apply_versioned`](Self::apply_versioned) for the
    /// conflict-checked variant. Returns the new live graph on success.
    pub fn apply(&self, edits: &[FlowEdit]) -> Result<Arc<FlowGraph>, FlowEditError> {
        self.swap(None, edits)
    }

    /// Applies an edit batch only if the live graph is still the version the
    /// batch was prepared against; otherwise fails with
    /// [`FlowEditError::Conflict`] and changes nothing.
    #[instrument(skip(self, edits), fields(expected = expected_version, edits = edits.len()))]
    pub fn apply_versioned(
        &self,
        expected_version: u64,
        edits: &[FlowEdit],
    ) -> Result<Arc<FlowGraph>, FlowEditError> {
        self.swap(Some(expected_version), edits)
    }

    /// Check-rebuild-validate-swap under the write lock, so concurrent
    /// batches serialize and readers never observe an intermediate state.
    fn swap(
        &self,
        expected_version: Option<u64>,
        edits: &[FlowEdit],
    ) -> Result<Arc<FlowGraph>, FlowEditError> {
        let mut live = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(expected) = expected_version {
            let found = live.version();
            if found != expected {
                return Err(FlowEditError::Conflict { expected, found });
            }
        }

        let mut builder = live.to_builder();
        for edit in edits {
            apply_edit(&mut builder, edit)?;
        }
        let compiled = builder.compile()?;

        info!(
            version = compiled.version(),
            nodes = compiled.node_count(),
            edges = compiled.edge_count(),
            warnings = compiled.warnings().len(),
            "flow edit batch accepted"
        );
        let next = Arc::new(compiled);
        *live = next.clone();
        Ok(next)
    }
}

/// Applies one edit to the working copy. Strictly in-order within a batch:
/// later edits see what earlier ones changed.
fn apply_edit(builder: &mut FlowBuilder, edit: &FlowEdit) -> Result<(), FlowEditError> {
    match edit {
        FlowEdit::AddNode { node } => {
            if builder.nodes.iter().any(|existing| existing.id == node.id) {
                return Err(FlowEditError::DuplicateNode {
                    node: node.id.clone(),
                });
            }
            builder.nodes.push(node.clone());
        }
        FlowEdit::RemoveNode { node } => {
            let before = builder.nodes.len();
            builder.nodes.retain(|existing| existing.id != *node);
            if builder.nodes.len() == before {
                return Err(FlowEditError::UnknownNode { node: node.clone() });
            }
            builder
                .edges
                .retain(|edge| edge.from != *node && edge.to != *node);
        }
        FlowEdit::AddEdge {
            from,
            to,
            priority,
            guard,
        } => {
            for endpoint in [from, to] {
                if !builder.nodes.iter().any(|existing| existing.id == *endpoint) {
                    return Err(FlowEditError::UnknownNode {
                        node: endpoint.clone(),
                    });
                }
            }
            let assigned = match priority {
                Some(priority) => *priority,
                None => builder
                    .edges
                    .iter()
                    .map(|edge| edge.priority)
                    .max()
                    .map_or(0, |highest| highest.saturating_add(10)),
            };
            builder.edges.push(EdgeSpec {
                from: from.clone(),
                to: to.clone(),
                priority: assigned,
                guard: guard.clone(),
            });
        }
        FlowEdit::RemoveEdge { from, to } => {
            let position = builder
                .edges
                .iter()
                .position(|edge| edge.from == *from && edge.to == *to)
                .ok_or_else(|| FlowEditError::UnknownEdge {
                    from: from.clone(),
                    to: to.clone(),
                })?;
            builder.edges.remove(position);
        }
        FlowEdit::SetPrompt { node, prompt } => {
            let spec = builder
                .nodes
                .iter_mut()
                .find(|existing| existing.id == *node)
                .ok_or_else(|| FlowEditError::UnknownNode { node: node.clone() })?;
            spec.prompt = Some(prompt.clone());
        }
        FlowEdit::SetEntry { node } => {
            if !builder.nodes.iter().any(|existing| existing.id == *node) {
                return Err(FlowEditError::UnknownNode { node: node.clone() });
            }
            builder.entry = Some(node.clone());
        }
    }
    Ok(())
}
