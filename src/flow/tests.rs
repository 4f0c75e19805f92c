//! Test suite for flow definition, compilation, navigation, and edits.
//!
//! Covers the FlowBuilder surface, every structural validation error,
//! guard-ordered navigation, and all-or-nothing edit batches against a
//! SharedFlow handle.

#[cfg(test)]
mod tests {
    use super::super::{
        navigate, CompileWarning, FlowBuilder, FlowCompileError, FlowEdit, FlowEditError, Guard,
        Navigation, NodeKind, NodeSpec, SharedFlow,
    };
    use crate::types::{AnswerMap, MetadataMap, NodeId};

    /// Three-node booking slice used across the tests: entry question, a
    /// follow-up question, and a terminal.
    fn booking_flow() -> FlowBuilder {
        FlowBuilder::new()
            .with_entry("ask_date")
            .add_node(NodeSpec::question("ask_date", "Which day suits you?", "date"))
            .add_node(NodeSpec::question("ask_size", "How many guests?", "party_size"))
            .add_node(NodeSpec::terminal("confirmed"))
            .add_edge("ask_date", "ask_size", Guard::answer_present("date"))
            .add_edge("ask_size", "confirmed", Guard::answer_present("party_size"))
    }

    fn answers_with(pairs: &[(&str, serde_json::Value)]) -> AnswerMap {
        let mut answers = AnswerMap::default();
        for (key, value) in pairs {
            answers.insert((*key).to_string(), value.clone());
        }
        answers
    }

    #[test]
    /// Verifies a fresh builder compiles to version 1 with the declared
    /// shape intact.
    fn test_compile_fresh_graph() {
        let graph = booking_flow().compile().unwrap();
        assert_eq!(graph.version(), 1);
        assert_eq!(graph.entry(), &NodeId::from("ask_date"));
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.warnings().is_empty());
        assert!(graph.node(&"ask_size".into()).unwrap().kind == NodeKind::Question);
    }

    #[test]
    /// A builder without an entry is rejected before anything else is
    /// checked.
    fn test_compile_missing_entry() {
        let result = FlowBuilder::new()
            .add_node(NodeSpec::terminal("done"))
            .compile();
        assert_eq!(result.unwrap_err(), FlowCompileError::MissingEntry);
    }

    #[test]
    /// An entry naming no declared node is rejected.
    fn test_compile_unknown_entry() {
        let result = FlowBuilder::new()
            .with_entry("nowhere")
            .add_node(NodeSpec::terminal("done"))
            .compile();
        assert_eq!(
            result.unwrap_err(),
            FlowCompileError::UnknownEntry {
                entry: "nowhere".into()
            }
        );
    }

    #[test]
    /// Two nodes sharing an id fail compilation with the offending id.
    fn test_compile_duplicate_node() {
        let result = FlowBuilder::new()
            .with_entry("ask")
            .add_node(NodeSpec::question("ask", "First?", "a"))
            .add_node(NodeSpec::question("ask", "Second?", "b"))
            .compile();
        assert_eq!(
            result.unwrap_err(),
            FlowCompileError::DuplicateNode { node: "ask".into() }
        );
    }

    #[test]
    /// Edges referencing undefined endpoints are rejected, naming both the
    /// edge and the missing node.
    fn test_compile_dangling_edge() {
        let result = booking_flow()
            .add_edge("ask_size", "missing", Guard::Always)
            .compile();
        assert_eq!(
            result.unwrap_err(),
            FlowCompileError::DanglingEdge {
                from: "ask_size".into(),
                to: "missing".into(),
                missing: "missing".into(),
            }
        );
    }

    #[test]
    /// A reachable non-terminal node with no way out strands sessions, so
    /// compilation refuses it.
    fn test_compile_reachable_dead_end() {
        let result = FlowBuilder::new()
            .with_entry("ask")
            .add_node(NodeSpec::question("ask", "Anything?", "reply"))
            .compile();
        assert_eq!(
            result.unwrap_err(),
            FlowCompileError::DeadEnd { node: "ask".into() }
        );
    }

    #[test]
    /// Unreachable nodes are surfaced as warnings, never silently dropped
    /// and never a hard error, even when they would be dead ends.
    fn test_compile_unreachable_is_warning() {
        let graph = booking_flow()
            .add_node(NodeSpec::question("orphaned", "Ever asked?", "never"))
            .compile()
            .unwrap();
        assert_eq!(graph.warnings().len(), 1);
        assert_eq!(
            graph.warnings()[0],
            CompileWarning::Unreachable {
                node: "orphaned".into()
            }
        );
        // The node is still part of the graph; a later edit may wire it in.
        assert!(graph.contains(&"orphaned".into()));
    }

    #[test]
    /// Edges evaluate in ascending priority order with declaration order
    /// breaking ties, and the first match wins.
    fn test_navigation_priority_order() {
        let graph = FlowBuilder::new()
            .with_entry("route")
            .add_node(NodeSpec::decision("route"))
            .add_node(NodeSpec::terminal("vip"))
            .add_node(NodeSpec::terminal("standard"))
            .add_node(NodeSpec::terminal("fallback"))
            .add_edge_with_priority("route", "fallback", 50, Guard::Always)
            .add_edge_with_priority("route", "vip", 10, Guard::answer_present("vip_code"))
            .add_edge_with_priority("route", "standard", 10, Guard::answer_present("name"))
            .compile()
            .unwrap();

        let metadata = MetadataMap::default();
        // Both priority-10 guards match: the first declared wins.
        let answers = answers_with(&[("vip_code", "gold".into()), ("name", "Ada".into())]);
        assert_eq!(
            navigate::next(&graph, &"route".into(), &answers, &metadata),
            Navigation::Advance("vip".into())
        );

        // Only the later-declared tie matches.
        let answers = answers_with(&[("name", "Ada".into())]);
        assert_eq!(
            navigate::next(&graph, &"route".into(), &answers, &metadata),
            Navigation::Advance("standard".into())
        );

        // Nothing specific matches: the always-true priority-50 edge fires.
        assert_eq!(
            navigate::next(&graph, &"route".into(), &AnswerMap::default(), &metadata),
            Navigation::Advance("fallback".into())
        );
    }

    #[test]
    /// With no matching guard the session observably stays put, and the
    /// same inputs always produce the same outcome.
    fn test_navigation_hold_is_deterministic() {
        let graph = booking_flow().compile().unwrap();
        let answers = AnswerMap::default();
        let metadata = MetadataMap::default();
        let first = navigate::next(&graph, graph.entry(), &answers, &metadata);
        let second = navigate::next(&graph, graph.entry(), &answers, &metadata);
        assert_eq!(first, Navigation::Hold);
        assert_eq!(first, second);
    }

    #[test]
    /// Navigating from an id the graph does not know holds rather than
    /// panicking.
    fn test_navigation_unknown_position_holds() {
        let graph = booking_flow().compile().unwrap();
        assert!(navigate::next(
            &graph,
            &"teleported".into(),
            &AnswerMap::default(),
            &MetadataMap::default()
        )
        .is_hold());
    }

    #[test]
    /// The advance fold hops through Decision nodes and settles on the
    /// first node that consumes a turn.
    fn test_advance_hops_decisions() {
        let graph = FlowBuilder::new()
            .with_entry("ask_tier")
            .add_node(NodeSpec::question("ask_tier", "Which tier?", "tier"))
            .add_node(NodeSpec::decision("triage"))
            .add_node(NodeSpec::decision("escalation_check"))
            .add_node(NodeSpec::question("ask_details", "Tell us more", "details"))
            .add_node(NodeSpec::terminal("done"))
            .add_edge("ask_tier", "triage", Guard::answer_present("tier"))
            .add_edge(
                "triage",
                "escalation_check",
                Guard::answer_equals("tier", "pro".into()),
            )
            .add_edge("triage", "done", Guard::Always)
            .add_edge("escalation_check", "ask_details", Guard::Always)
            .add_edge("ask_details", "done", Guard::answer_present("details"))
            .compile()
            .unwrap();

        let answers = answers_with(&[("tier", "pro".into())]);
        let path = navigate::advance(&graph, &"ask_tier".into(), &answers, &MetadataMap::default());
        let as_strings: Vec<&str> = path.iter().map(NodeId::as_str).collect();
        assert_eq!(as_strings, vec!["triage", "escalation_check", "ask_details"]);
    }

    #[test]
    /// A cycle of always-matching Decision nodes terminates the fold
    /// instead of spinning forever.
    fn test_advance_stops_on_decision_cycle() {
        let graph = FlowBuilder::new()
            .with_entry("start")
            .add_node(NodeSpec::question("start", "Hello?", "greeting"))
            .add_node(NodeSpec::decision("ping"))
            .add_node(NodeSpec::decision("pong"))
            .add_edge("start", "ping", Guard::answer_present("greeting"))
            .add_edge("ping", "pong", Guard::Always)
            .add_edge("pong", "ping", Guard::Always)
            .compile()
            .unwrap();

        let answers = answers_with(&[("greeting", "hi".into())]);
        let path = navigate::advance(&graph, &"start".into(), &answers, &MetadataMap::default());
        // ping then pong; the hop back to ping is refused.
        assert_eq!(path.len(), 2);
    }

    #[test]
    /// to_builder round-trips the declarative definition so edits rebuild
    /// from exactly what was compiled.
    fn test_to_builder_round_trip() {
        let graph = booking_flow().compile().unwrap();
        let rebuilt = graph.to_builder().compile().unwrap();
        assert_eq!(rebuilt.version(), graph.version() + 1);
        assert_eq!(rebuilt.node_count(), graph.node_count());
        assert_eq!(rebuilt.edge_count(), graph.edge_count());
        assert_eq!(rebuilt.entry(), graph.entry());
    }

    #[test]
    /// A versioned batch applies atomically, bumps the version, and leaves
    /// previously taken snapshots untouched.
    fn test_edit_batch_applies_and_bumps_version() {
        let shared = SharedFlow::new(booking_flow().compile().unwrap());
        let before = shared.snapshot();

        let updated = shared
            .apply_versioned(
                before.version(),
                &[
                    FlowEdit::AddNode {
                        node: NodeSpec::question("ask_allergies", "Any allergies?", "allergies"),
                    },
                    FlowEdit::AddEdge {
                        from: "ask_size".into(),
                        to: "ask_allergies".into(),
                        priority: Some(0),
                        guard: Guard::answer_equals("party_size", 8.into()),
                    },
                    FlowEdit::AddEdge {
                        from: "ask_allergies".into(),
                        to: "confirmed".into(),
                        priority: None,
                        guard: Guard::answer_present("allergies"),
                    },
                ],
            )
            .unwrap();

        assert_eq!(updated.version(), before.version() + 1);
        assert_eq!(updated.node_count(), 4);
        assert!(updated.contains(&"ask_allergies".into()));
        // The pre-edit snapshot still reads as it did.
        assert_eq!(before.node_count(), 3);
        assert!(!before.contains(&"ask_allergies".into()));
    }

    #[test]
    /// A batch prepared against a stale version is refused without touching
    /// the live graph.
    fn test_edit_conflict_on_stale_version() {
        let shared = SharedFlow::new(booking_flow().compile().unwrap());
        let stale = shared.version();
        shared
            .apply(&[FlowEdit::SetPrompt {
                node: "ask_date".into(),
                prompt: "Pick a day".into(),
            }])
            .unwrap();

        let result = shared.apply_versioned(
            stale,
            &[FlowEdit::SetPrompt {
                node: "ask_date".into(),
                prompt: "Racing edit".into(),
            }],
        );
        assert_eq!(
            result.unwrap_err(),
            FlowEditError::Conflict {
                expected: stale,
                found: stale + 1,
            }
        );
        let live = shared.snapshot();
        assert_eq!(
            live.node(&"ask_date".into()).unwrap().prompt.as_deref(),
            Some("Pick a day")
        );
    }

    #[test]
    /// When any edit in a batch fails, none of the earlier ones land.
    fn test_edit_batch_is_all_or_nothing() {
        let shared = SharedFlow::new(booking_flow().compile().unwrap());
        let result = shared.apply(&[
            FlowEdit::SetPrompt {
                node: "ask_date".into(),
                prompt: "Changed first".into(),
            },
            FlowEdit::RemoveNode {
                node: "never_existed".into(),
            },
        ]);
        assert_eq!(
            result.unwrap_err(),
            FlowEditError::UnknownNode {
                node: "never_existed".into()
            }
        );
        let live = shared.snapshot();
        assert_eq!(live.version(), 1);
        assert_eq!(
            live.node(&"ask_date".into()).unwrap().prompt.as_deref(),
            Some("Which day suits you?")
        );
    }

    #[test]
    /// Removing a node drops its incident edges in the same batch.
    fn test_remove_node_drops_incident_edges() {
        let shared = SharedFlow::new(booking_flow().compile().unwrap());
        let updated = shared
            .apply(&[
                FlowEdit::AddEdge {
                    from: "ask_date".into(),
                    to: "confirmed".into(),
                    priority: None,
                    guard: Guard::answer_equals("date", "today".into()),
                },
                FlowEdit::RemoveNode {
                    node: "ask_size".into(),
                },
            ])
            .unwrap();
        assert_eq!(updated.node_count(), 2);
        assert_eq!(updated.edge_count(), 1);
        assert!(updated.edges_from(&"ask_date".into()).all(|edge| edge.to.as_str() == "confirmed"));
    }

    #[test]
    /// A removal that would strand sessions on a reachable dead end is
    /// rejected by re-validation, so the orphaning edit never lands.
    fn test_remove_rejected_when_it_strands_sessions() {
        let shared = SharedFlow::new(booking_flow().compile().unwrap());
        // Removing the terminal leaves ask_size reachable with no way out.
        let result = shared.apply(&[FlowEdit::RemoveNode {
            node: "confirmed".into(),
        }]);
        assert_eq!(
            result.unwrap_err(),
            FlowEditError::Invalid(FlowCompileError::DeadEnd {
                node: "ask_size".into()
            })
        );
        assert_eq!(shared.version(), 1);
    }

    #[test]
    /// Later edits in a batch see earlier ones: a node added mid-batch can
    /// be wired up and made the entry.
    fn test_edits_apply_in_order_within_batch() {
        let shared = SharedFlow::new(booking_flow().compile().unwrap());
        let updated = shared
            .apply(&[
                FlowEdit::AddNode {
                    node: NodeSpec::question("greet", "Welcome! Ready to book?", "ready"),
                },
                FlowEdit::AddEdge {
                    from: "greet".into(),
                    to: "ask_date".into(),
                    priority: None,
                    guard: Guard::answer_present("ready"),
                },
                FlowEdit::SetEntry {
                    node: "greet".into(),
                },
            ])
            .unwrap();
        assert_eq!(updated.entry(), &NodeId::from("greet"));
    }

    #[test]
    /// Edits serialize with an `op` tag so deciders can propose them as
    /// JSON.
    fn test_edit_serde_shape() {
        let edit = FlowEdit::AddEdge {
            from: "a".into(),
            to: "b".into(),
            priority: None,
            guard: Guard::answer_present("choice"),
        };
        let value = serde_json::to_value(&edit).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "op": "add_edge",
                "from": "a",
                "to": "b",
                "guard": {"kind": "answer_present", "key": "choice"},
            })
        );
        let back: FlowEdit = serde_json::from_value(value).unwrap();
        assert_eq!(back, edit);
    }
}
