//! Logging Setup
//!
//! Structured logging via `tracing`, configured once per binary.
//! `RUST_LOG` overrides the default directives.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVES: &str = "ems_client=info";

/// Initialize the global subscriber.
///
/// Safe to call more than once; later calls are no-ops so tests can
/// initialize freely.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
