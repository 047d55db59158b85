// Tracing bootstrap
//
// The terminal belongs to the interactive UI, so structured logs go to a
// daily rolling file in the configured log directory.

use crate::{WipeError, WipeResult};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_PREFIX: &str = "wipe-sentinel.log";

/// Install the global subscriber. Keep the guard alive until exit or
/// buffered log lines are lost.
pub fn init(log_dir: &Path, debug: bool) -> WipeResult<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| WipeError::Config(format!("logging already initialised: {}", e)))?;

    Ok(guard)
}
