//! Terminal host for the vilm session engine.

pub mod commands;
pub mod interrupt;
pub mod repl;
pub mod terminal;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "VILM_LOG";

/// Install the stderr log subscriber; `VILM_LOG` holds the filter, `warn` otherwise.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
