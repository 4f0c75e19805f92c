use colloquy::outbound::MemoryGateway;
use colloquy::session::Session;
use colloquy::turn::{TurnReceipt, TurnReport};
use colloquy::types::SessionKey;

/// Unwraps a completed receipt, panicking with context on supersession.
#[allow(dead_code)]
pub fn completed(receipt: TurnReceipt) -> TurnReport {
    match receipt {
        TurnReceipt::Completed(report) => report,
        TurnReceipt::Superseded { session, sequence } => {
            panic!("expected a completed turn, got superseded ({session} seq {sequence})")
        }
    }
}

#[allow(dead_code)]
pub fn assert_delivered(gateway: &MemoryGateway, session: &SessionKey, expected: &[&str]) {
    let texts = gateway.texts_for(session);
    assert_eq!(
        texts, expected,
        "delivered texts for {session} did not match"
    );
}

#[allow(dead_code)]
pub fn assert_history_roles(session: &Session, expected: &[&str]) {
    let roles: Vec<&str> = session
        .history
        .iter()
        .map(|entry| entry.role.as_str())
        .collect();
    assert_eq!(roles, expected, "history roles did not match");
}
