//! Structured logging: `tracing` + `tracing-subscriber` with an env-filter
//! and a choice of JSON or pretty output.
//!
//! Scrubbing is applied where a handler logs an externally-sourced payload
//! (LLM request/response bodies, MCP tool arguments) rather than as a
//! blanket formatter hook; see `secret_scrubbing.rs`.

pub mod secret_scrubbing;

use anyhow::{bail, Result};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::domain::models::config::LoggingConfig;

pub use secret_scrubbing::SecretScrubber;

/// Initialize the global tracing subscriber. Must be called exactly once,
/// before any `tracing::*!` call, and never while stdout is carrying
/// JSON-RPC traffic (the MCP server writes protocol frames to stdout, so
/// this subscriber always targets stderr).
pub fn init(config: &LoggingConfig) -> Result<()> {
    let default_level = parse_level(&config.level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    match config.format.as_str() {
        "json" => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(layer).init();
        }
        "pretty" => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(layer).init();
        }
        other => bail!("unknown log format: {other}"),
    }

    tracing::info!(level = %config.level, format = %config.format, "logger initialized");
    Ok(())
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => bail!("invalid log level: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert!(matches!(parse_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_level("warn"), Ok(Level::WARN)));
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(parse_level("verbose").is_err());
    }
}
