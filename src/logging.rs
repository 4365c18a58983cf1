//! Optional logging setup using `tracing` + `tracing-subscriber`.
//!
//! The library only emits events; installing a subscriber is the
//! application's choice. Filter priority:
//! 1. the `TIDYDAG_LOG` environment variable (an `EnvFilter` directive such
//!    as `info` or `tidydag=debug`)
//! 2. the `level` argument, if given
//! 3. `info`

use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;

use crate::core::errors::{OrchestratorError, Result};

pub const LOG_ENV_VAR: &str = "TIDYDAG_LOG";

/// Install a global `fmt` subscriber writing to stderr.
///
/// Fails with a configuration error if a global subscriber is already set.
pub fn init_logging(level: Option<Level>) -> Result<()> {
    let directives = std::env::var(LOG_ENV_VAR).ok();

    fmt()
        .with_env_filter(build_filter(level, directives.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| OrchestratorError::configuration(format!("failed to install logger: {e}")))
}

/// Filter from `directives` when present, otherwise from `level` (default
/// `info`). Invalid directives are dropped.
fn build_filter(level: Option<Level>, directives: Option<&str>) -> EnvFilter {
    let default = level.map_or(LevelFilter::INFO, LevelFilter::from_level);
    EnvFilter::builder()
        .with_default_directive(default.into())
        .parse_lossy(directives.unwrap_or_default())
}
