//! Logging setup.
//!
//! Filters come from the `EDGEGRAPH_LOG` environment variable, e.g.
//! `EDGEGRAPH_LOG=debug` or `EDGEGRAPH_LOG=edgegraph::aggregation=debug`.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "EDGEGRAPH_LOG";

/// Installs the global subscriber, writing compact lines to stderr.
///
/// `default_level` applies when `EDGEGRAPH_LOG` is unset or invalid.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_with_default(default_level: &str) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let _ = subscriber.try_init();
}
