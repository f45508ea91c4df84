//! Tracing setup.
//!
//! The library crates only emit `tracing` events inside the span each facade
//! is given; installing a subscriber is left to binaries and tests.

use std::sync::Once;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

static TEST_INIT: Once = Once::new();

/// Initialize the global tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to `log_level`.
pub fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Install a test-friendly subscriber once per process.
pub fn init_test_tracing() {
    TEST_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Default span handed to a facade for the given service.
#[must_use]
pub fn service_span(service: &'static str) -> tracing::Span {
    tracing::info_span!("facade", service)
}
