//! Diagnostic logging setup.
//!
//! Diagnostics go through `tracing` to stderr, filtered by `RUST_LOG`.
//! Without `RUST_LOG` the level is `info`, or `debug` in verbose mode.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    let _ = tracing_subscriber::registry()
        .with(default_env_filter(default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn default_env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
