//! Structured logging setup using `tracing-subscriber` and
//! `tracing-appender`.
//!
//! Console output goes to stderr, filtered by `RUST_LOG` (falling back to
//! the configured level). When a log directory is configured, JSON logs
//! are additionally written there with daily rotation.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Holds the non-blocking writer guard for file logging.
///
/// Must be kept alive for the duration of the process; dropping it
/// flushes pending entries and closes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Initialise logging from configuration.
///
/// Returns a [`LoggingGuard`] when file logging is active; the caller
/// must keep it alive.
///
/// # Errors
///
/// Returns an error if the configured log directory cannot be created.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<LoggingGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow::anyhow!("failed to create logs directory {dir}: {e}"))?;

            let file_appender = tracing_appender::rolling::daily(dir, "voxpop.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking);
            let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .with(console_layer)
                .init();

            Ok(Some(LoggingGuard { _guard: guard }))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}
