use colloquy::telemetry::{init_tracing, try_init_tracing};

// One test, one process: the global-subscriber contract is only observable
// from a binary that hasn't installed one yet.
#[test]
fn second_global_install_is_rejected() {
    assert!(try_init_tracing().is_ok());
    assert!(try_init_tracing().is_err());

    // The soft variant shrugs the conflict off; every entrypoint may call it.
    init_tracing();
    init_tracing();
}
