//! Logging initialization.
//!
//! A library with no network surface of its own has no exporter pipeline to
//! stand up or flush, so this keeps only the piece that's useful everywhere:
//! an `EnvFilter`-driven `fmt` layer, gated behind the same `tracing` feature
//! the rest of the crate checks.

#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing() {}
