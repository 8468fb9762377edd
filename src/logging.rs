//! Tracing setup: a daily-rolling log file under the configured directory.
//!
//! Nothing is written to the terminal so command output stays clean. The
//! filter comes from `JOBDESK_LOG`, then `RUST_LOG`, then the configured level.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "jobdesk.log";

/// Install the global subscriber. Keep the guard alive for the life of the
/// process; dropping it flushes and stops the writer.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
  let directory = config.directory();
  std::fs::create_dir_all(&directory)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;

  let appender = tracing_appender::rolling::daily(&directory, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(filter(&config.level)?)
    .with(
      fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to install logger: {}", e))?;

  tracing::debug!(directory = %directory.display(), "logging initialized");
  Ok(guard)
}

fn filter(default_level: &str) -> Result<EnvFilter> {
  let directive = std::env::var("JOBDESK_LOG")
    .or_else(|_| std::env::var("RUST_LOG"))
    .unwrap_or_else(|_| default_level.to_string());
  EnvFilter::try_new(&directive).map_err(|e| eyre!("Invalid log filter {:?}: {}", directive, e))
}
