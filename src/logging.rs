//! Structured diagnostics on stderr.
//!
//! `RUST_LOG` wins over the configured `[logging].level`. Standard output is
//! left to command results so it stays scriptable.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. A second call is a no-op.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
