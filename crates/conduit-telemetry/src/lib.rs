//! Logging setup for Conduit
//!
//! Every component logs through `tracing`; this crate installs the global
//! subscriber that turns those events into leveled lines.

use conduit_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter for the configured level
///
/// `RUST_LOG` takes precedence when set. An unparseable directive falls back
/// to `info` rather than failing startup.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global `tracing` subscriber
///
/// Logs go to stderr so streamed completion text on stdout stays clean.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = filter(config);

    match config.format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
        }
    }

    Ok(())
}
