//! # Structured Logging
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` (honouring
//! `RUST_LOG`, falling back to the configured level) in front of a `fmt` layer
//! that writes either JSON or human-readable text.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::error::{SimError, SimResult};
use crate::observability::config::{LogConfig, LogFormat};

/// Build the filter directive for a configured level
///
/// A bare level such as `debug` is scoped to this crate so dependencies stay
/// quiet; anything containing `=` or `,` is taken as a full directive.
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else if level.is_empty() {
        "lb_simulator=info".to_string()
    } else {
        format!("lb_simulator={}", level)
    }
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> SimResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(&config.level)))
        .map_err(|e| SimError::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(config.with_location)
                    .with_line_number(config.with_location),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(config.with_location)
                    .with_line_number(config.with_location),
            )
            .try_init(),
    };

    result.map_err(|e| SimError::config(format!("Failed to install tracing subscriber: {}", e)))?;

    info!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}
