//! Diagnostic logging to stderr.
//!
//! Stdout carries command output; everything from `tracing` goes to stderr.
//! `MARGINALIA_LOG` takes precedence over the configured filter.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "MARGINALIA_LOG";

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(configured: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::try_new(configured).unwrap_or_else(|e| {
            eprintln!("invalid log filter '{configured}': {e}");
            EnvFilter::new("warn")
        })
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}
