//! Tracing subscriber wiring shared by binaries, demos, and tests.
//!
//! The runtime itself only ever emits through `tracing`; installing a
//! subscriber is the embedder's call. These helpers set up the layered
//! subscriber the project uses everywhere: env-filtered fmt output plus
//! span-aware error context.
//!
//! Respects `RUST_LOG`; without it, the default filter is
//! `error,colloquy=info`.

use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber, failing if one is already set.
pub fn try_init_tracing() -> Result<(), TryInitError> {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        // Log span open/close so instrumented async boundaries show up.
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("error,colloquy=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

/// Installs the global subscriber if none exists yet. Safe to call from
/// every test and demo entrypoint.
pub fn init_tracing() {
    let _ = try_init_tracing();
}
