//! Tracing setup helpers for binaries embedding the engine.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the host application's call. These helpers wire up the stack the way
//! the demos do: env-filtered fmt output plus span-trace capture for error
//! reports.

use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber with the default filter
/// (`RUST_LOG`, falling back to `error,graphloom=info`).
///
/// Panics if a global subscriber is already set; call once at startup.
pub fn init_tracing() {
    init_tracing_with("error,graphloom=info");
}

/// Install a global subscriber with an explicit fallback filter.
pub fn init_tracing_with(fallback: &str) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}
