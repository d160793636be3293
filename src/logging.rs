// src/logging.rs

//! Logging setup for `exprun` using `tracing` + `tracing-subscriber`.
//!
//! The launcher that embeds this crate owns argument parsing, so the log
//! level comes from the `EXPRUN_LOG` environment variable (e.g. "info",
//! "debug"), defaulting to `info`.

use anyhow::Result;
use tracing_subscriber::fmt;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging() -> Result<()> {
    let level = std::env::var("EXPRUN_LOG")
        .ok()
        .and_then(|s| parse_level_str(&s))
        .unwrap_or(tracing::Level::INFO);

    // `init()` does not return a Result, so this cannot fail at runtime
    // (if called more than once, it will panic; embedders call it once).
    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
