//! Pure navigation over a compiled flow graph.
//!
//! Navigation never mutates anything: given a graph, a position, and the
//! session's settled answers, [`next`] reports where a single step leads
//! and [`advance`] folds consecutive steps through routing-only Decision
//! nodes. The turn runner applies the result to the session; embedders can
//! call the same functions to preview routing.

use rustc_hash::FxHashSet;
use tracing::warn;

use super::model::FlowGraph;
use crate::types::{AnswerMap, MetadataMap, NodeId};

/// Outcome of a single navigation step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// The first matching guard points here.
    Advance(NodeId),
    /// No guard matched; the session stays where it is. Holding is an
    /// ordinary outcome, not an error: it is how a flow expresses "keep
    /// asking until an answer lands".
    Hold,
}

impl Navigation {
    /// Returns `true` when the step goes nowhere.
    #[must_use]
    pub fn is_hold(&self) -> bool {
        matches!(self, Self::Hold)
    }

    /// The step's target, if it advances.
    #[must_use]
    pub fn target(&self) -> Option<&NodeId> {
        match self {
            Self::Advance(node) => Some(node),
            Self::Hold => None,
        }
    }
}

/// Evaluates one navigation step from `current`.
///
/// Walks the node's outgoing edges in evaluation order (priority ascending,
/// declaration order breaking ties) and takes the first whose guard matches.
/// Guards are total: a missing or `null` answer simply fails to match, it
/// never faults. Two calls with the same inputs always agree.
///
/// An unknown `current` has no outgoing edges and therefore holds.
///
/// # Examples
///
/// ```rust
/// use colloquy::flow::{navigate, FlowBuilder, Guard, Navigation, NodeSpec};
/// use colloquy::types::{AnswerMap, MetadataMap};
///
/// let graph = FlowBuilder::new()
///     .with_entry("ask_size")
///     .add_node(NodeSpec::question("ask_size", "How many guests?", "party_size"))
///     .add_node(NodeSpec::terminal("booked"))
///     .add_edge("ask_size", "booked", Guard::answer_present("party_size"))
///     .compile()
///     .unwrap();
///
/// let mut answers = AnswerMap::default();
/// let metadata = MetadataMap::default();
/// assert_eq!(
///     navigate::next(&graph, graph.entry(), &answers, &metadata),
///     Navigation::Hold,
/// );
///
/// answers.insert("party_size".into(), 4.into());
/// assert_eq!(
///     navigate::next(&graph, graph.entry(), &answers, &metadata),
///     Navigation::Advance("booked".into()),
/// );
/// ```
#[must_use]
pub fn next(
    graph: &FlowGraph,
    current: &NodeId,
    answers: &AnswerMap,
    metadata: &MetadataMap,
) -> Navigation {
    for edge in graph.edges_from(current) {
        if edge.guard.matches(answers, metadata) {
            return Navigation::Advance(edge.to.clone());
        }
    }
    Navigation::Hold
}

/// Folds [`next`] steps until the session comes to rest, hopping through
/// Decision nodes without stopping on them.
///
/// Returns the nodes visited past `current`, in order; the last element is
/// where the session settles. An empty result means the session holds at
/// `current`. A cycle of Decision nodes terminates the fold at the first
/// revisited node rather than spinning.
#[must_use]
pub fn advance(
    graph: &FlowGraph,
    current: &NodeId,
    answers: &AnswerMap,
    metadata: &MetadataMap,
) -> Vec<NodeId> {
    let mut path = Vec::new();
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    visited.insert(current.clone());
    let mut position = current.clone();

    loop {
        let Navigation::Advance(target) = next(graph, &position, answers, metadata) else {
            break;
        };
        if !visited.insert(target.clone()) {
            warn!(node = %target, "decision cycle detected; stopping navigation fold");
            break;
        }
        let keep_going = graph.node(&target).is_some_and(|spec| spec.kind.is_decision());
        path.push(target.clone());
        position = target;
        if !keep_going {
            break;
        }
    }

    path
}
