//! Logging configuration.
//!
//! Logs go to stderr so result output and shell pipelines stay clean.
//! The level defaults to whatever the CLI verbosity flags selected and can
//! be overridden with the `PHOTOTAG_LOG` environment variable.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system with the given default level
/// (`warn`, `info`, or `debug`).
pub fn init(default_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("PHOTOTAG_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}

/// Map a repeatable `-v` count to a default log level, capped at debug.
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}
