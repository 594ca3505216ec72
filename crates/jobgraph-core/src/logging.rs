//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. the `level` argument (if provided)
//! 2. the `JOBGRAPH_LOG` environment variable, any `EnvFilter` directive
//! 3. default to `info`

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

pub const LOG_ENV_VAR: &str = "JOBGRAPH_LOG";

/// Install the global stderr subscriber. Returns `false` when one was
/// already installed, which is not an error.
pub fn init_logging(level: Option<&str>) -> bool {
    fmt()
        .with_env_filter(resolve_filter(level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}

fn resolve_filter(level: Option<&str>) -> EnvFilter {
    if let Some(filter) = level.and_then(|level| EnvFilter::try_new(level.trim()).ok()) {
        return filter;
    }
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}
