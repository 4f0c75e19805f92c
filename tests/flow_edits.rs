//! Live-flow editing through both doors: direct operator batches on the
//! shared handle, and `edit_flow` actions raised mid-turn by the decider.

use std::sync::Arc;

use colloquy::decider::{ActionRequest, DecisionResponse};
use colloquy::flow::{CompileWarning, FlowEdit, Guard, NodeSpec};
use colloquy::session::Session;
use colloquy::store::SessionStore;
use colloquy::turn::InboundMessage;
use colloquy::types::SessionKey;
use serde_json::json;

mod common;
use common::*;

/// Marks alice's session privileged before her first turn.
async fn grant_privilege(h: &Harness) {
    let entry = h.runner.flow().snapshot().entry().clone();
    let mut session = Session::fresh(alice_key(), entry);
    session
        .metadata
        .insert(Session::PRIVILEGED_KEY.into(), json!(true));
    h.sessions.save(&session).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn operator_edit_lands_on_the_next_turn() {
    let decider = Arc::new(ScriptedDecider::new());
    let h = harness(shared_booking_flow(), decider.clone());

    completed(h.runner.handle_inbound(inbound("hello", "p1")).await.unwrap());

    let graph = h
        .runner
        .flow()
        .apply(&[FlowEdit::SetPrompt {
            node: "welcome".into(),
            prompt: "How big is the group?".into(),
        }])
        .unwrap();
    assert_eq!(graph.version(), 2);

    completed(h.runner.handle_inbound(inbound("three", "p2")).await.unwrap());

    let requests = decider.requests();
    assert_eq!(
        requests[0].node.prompt.as_deref(),
        Some("How many guests should we expect?")
    );
    assert_eq!(
        requests[1].node.prompt.as_deref(),
        Some("How big is the group?")
    );
}

/// A mid-turn `edit_flow` takes effect before this turn's navigation: the
/// node and edge the action adds are what the session settles on.
#[tokio::test(start_paused = true)]
async fn edit_flow_action_is_visible_to_navigation_in_the_same_turn() {
    let decider = Arc::new(
        ScriptedDecider::new()
            .then(
                DecisionResponse::reply("Let me fast-track you.").with_action(
                    ActionRequest::EditFlow {
                        edits: vec![
                            FlowEdit::AddNode {
                                node: NodeSpec::terminal("vip"),
                            },
                            FlowEdit::AddEdge {
                                from: "welcome".into(),
                                to: "vip".into(),
                                priority: Some(1),
                                guard: Guard::Always,
                            },
                        ],
                    },
                ),
            )
            .then(DecisionResponse::reply("You're on the VIP track.")),
    );
    let h = harness(shared_booking_flow(), decider);
    grant_privilege(&h).await;

    let report = completed(h.runner.handle_inbound(inbound("hi", "p1")).await.unwrap());

    assert!(report.actions[0].result.success);
    assert_eq!(h.runner.flow().version(), 2);
    assert_eq!(report.navigation.final_node().as_str(), "vip");
    let session = h.sessions.load(&alice_key()).await.unwrap().unwrap();
    assert_eq!(session.current_node.as_str(), "vip");
}

/// The version pin moves forward with each accepted batch, so a turn may
/// carry several `edit_flow` actions without tripping its own conflict
/// check.
#[tokio::test(start_paused = true)]
async fn two_edit_actions_in_one_turn_apply_in_order() {
    let decider = Arc::new(
        ScriptedDecider::new()
            .then(
                DecisionResponse::reply("Rewording both questions.")
                    .with_action(ActionRequest::EditFlow {
                        edits: vec![FlowEdit::SetPrompt {
                            node: "welcome".into(),
                            prompt: "Party size?".into(),
                        }],
                    })
                    .with_action(ActionRequest::EditFlow {
                        edits: vec![FlowEdit::SetPrompt {
                            node: "ask_date".into(),
                            prompt: "Which date?".into(),
                        }],
                    }),
            )
            .then(DecisionResponse::reply("Both updated.")),
    );
    let h = harness(shared_booking_flow(), decider);
    grant_privilege(&h).await;

    let report = completed(h.runner.handle_inbound(inbound("reword them", "p1")).await.unwrap());

    assert!(report.actions.iter().all(|action| action.result.success));
    assert_eq!(h.runner.flow().version(), 3);
    let graph = h.runner.flow().snapshot();
    assert_eq!(
        graph.node(&"welcome".into()).unwrap().prompt.as_deref(),
        Some("Party size?")
    );
    assert_eq!(
        graph.node(&"ask_date".into()).unwrap().prompt.as_deref(),
        Some("Which date?")
    );
}

/// A batch that would break the graph is rejected whole: the live version
/// and every node survive, and the contact hears about it through feedback.
#[tokio::test(start_paused = true)]
async fn rejected_batch_leaves_the_flow_untouched() {
    let decider = Arc::new(
        ScriptedDecider::new()
            .then(
                DecisionResponse::reply("Dropping the date step.").with_action(
                    ActionRequest::EditFlow {
                        edits: vec![FlowEdit::RemoveNode {
                            node: "ask_date".into(),
                        }],
                    },
                ),
            )
            .then(DecisionResponse::reply(
                "Removing that step would strand the welcome question, so I left the flow alone.",
            )),
    );
    let h = harness(shared_booking_flow(), decider);
    grant_privilege(&h).await;

    let report = completed(h.runner.handle_inbound(inbound("remove it", "p1")).await.unwrap());

    assert!(!report.actions[0].result.success);
    assert!(report.actions[0]
        .result
        .error
        .as_deref()
        .unwrap()
        .contains("no outgoing edges"));
    assert!(report.feedback_ran);
    assert_eq!(h.runner.flow().version(), 1);
    assert!(h.runner.flow().snapshot().contains(&"ask_date".into()));
}

#[test]
fn unreachable_node_after_edit_is_a_warning_not_an_error() {
    let flow = shared_booking_flow();
    let graph = flow
        .apply(&[FlowEdit::RemoveEdge {
            from: "confirm".into(),
            to: "waitlist".into(),
        }])
        .unwrap();

    assert_eq!(graph.version(), 2);
    assert_eq!(
        graph.warnings(),
        &[CompileWarning::Unreachable {
            node: "waitlist".into()
        }]
    );
}

/// One shared graph serves every conversation: an edit raised in alice's
/// session changes what bob's next turn sees.
#[tokio::test(start_paused = true)]
async fn edits_are_shared_across_conversations() {
    let decider = Arc::new(
        ScriptedDecider::new()
            .then(
                DecisionResponse::reply("Updating the greeting.").with_action(
                    ActionRequest::EditFlow {
                        edits: vec![FlowEdit::SetPrompt {
                            node: "welcome".into(),
                            prompt: "Hi! How many of you?".into(),
                        }],
                    },
                ),
            )
            .then(DecisionResponse::reply("The greeting is live."))
            .then(DecisionResponse::reply("Welcome!")),
    );
    let h = harness(shared_booking_flow(), decider.clone());
    grant_privilege(&h).await;

    completed(
        h.runner
            .handle_inbound(inbound("update the greeting", "p1"))
            .await
            .unwrap(),
    );
    completed(
        h.runner
            .handle_inbound(InboundMessage::new("bob", "line-1", "hello", "p2"))
            .await
            .unwrap(),
    );

    let requests = decider.requests();
    assert_eq!(requests.len(), 3, "alice's two passes, then bob's turn");
    assert_eq!(
        requests[2].session,
        SessionKey::for_conversation("line-1", "bob")
    );
    assert_eq!(
        requests[2].node.prompt.as_deref(),
        Some("Hi! How many of you?")
    );
}
