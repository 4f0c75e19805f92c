#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use colloquy::buffer::InMemoryArrivalStore;
use colloquy::debounce::DebounceSettings;
use colloquy::decider::Decider;
use colloquy::flow::{FlowBuilder, FlowGraph, Guard, NodeSpec, SharedFlow};
use colloquy::outbound::MemoryGateway;
use colloquy::settings::{DeciderSettings, RuntimeSettings};
use colloquy::store::InMemorySessionStore;
use colloquy::turn::{InboundMessage, TurnRunner};
use colloquy::types::SessionKey;
use serde_json::json;

/// The restaurant-booking flow used across the integration suites.
///
/// ```text
/// welcome --[party_size set]--> ask_date --[date set]--> confirm
/// confirm --[large_party == true]--> waitlist
/// confirm --[otherwise]-----------> booked
/// ```
///
/// `confirm` is a Decision node, so navigation hops through it without
/// stopping.
pub fn booking_flow() -> FlowGraph {
    FlowBuilder::new()
        .with_entry("welcome")
        .add_node(NodeSpec::question(
            "welcome",
            "How many guests should we expect?",
            "party_size",
        ))
        .add_node(NodeSpec::question(
            "ask_date",
            "What date works for you?",
            "date",
        ))
        .add_node(NodeSpec::decision("confirm"))
        .add_node(NodeSpec::terminal("waitlist"))
        .add_node(NodeSpec::terminal("booked"))
        .add_edge("welcome", "ask_date", Guard::answer_present("party_size"))
        .add_edge("ask_date", "confirm", Guard::answer_present("date"))
        .add_edge("confirm", "waitlist", Guard::answer_equals("large_party", json!(true)))
        .add_fallback_edge("confirm", "booked")
        .compile()
        .expect("booking flow compiles")
}

pub fn shared_booking_flow() -> SharedFlow {
    SharedFlow::new(booking_flow())
}

/// Millisecond-scale timings so paused-clock tests resolve instantly and
/// unpaused ones stay fast.
pub fn quick_settings() -> RuntimeSettings {
    RuntimeSettings::default()
        .with_debounce(DebounceSettings::new(
            Duration::from_millis(50),
            Duration::from_millis(10),
        ))
        .with_buffer_ttl(Duration::from_secs(60))
        .with_decider(DeciderSettings {
            timeout: Duration::from_millis(200),
            retries: 1,
            backoff_base: Duration::from_millis(10),
        })
}

/// A runner plus handles to every collaborator the tests inspect.
pub struct Harness {
    pub runner: TurnRunner,
    pub gateway: MemoryGateway,
    pub buffer: Arc<InMemoryArrivalStore>,
    pub sessions: Arc<InMemorySessionStore>,
}

pub fn harness(flow: SharedFlow, decider: Arc<dyn Decider>) -> Harness {
    harness_with(flow, decider, quick_settings())
}

pub fn harness_with(
    flow: SharedFlow,
    decider: Arc<dyn Decider>,
    settings: RuntimeSettings,
) -> Harness {
    let gateway = MemoryGateway::new();
    let buffer = Arc::new(InMemoryArrivalStore::new(settings.buffer_ttl));
    let sessions = Arc::new(InMemorySessionStore::new());
    let runner = TurnRunner::new(flow, decider, Arc::new(gateway.clone()))
        .with_buffer(buffer.clone())
        .with_sessions(sessions.clone())
        .with_settings(settings);
    Harness {
        runner,
        gateway,
        buffer,
        sessions,
    }
}

/// An inbound message from the default test contact.
pub fn inbound(text: &str, provider_id: &str) -> InboundMessage {
    InboundMessage::new("alice", "line-1", text, provider_id)
}

/// The session key [`inbound`] messages land on.
pub fn alice_key() -> SessionKey {
    SessionKey::for_conversation("line-1", "alice")
}
