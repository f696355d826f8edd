//! Logging setup for the command-line tools.
//!
//! Diagnostics always go to stderr so stdout stays clean for summaries.
//! When a log directory is configured, the same events are appended to
//! `<dir>/plugin-registry.log`, rolled daily.
//!
//! The filter comes from RUST_LOG when set, otherwise from `logging.level`.

use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_FILE_NAME: &str = "plugin-registry.log";

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for as long as the process logs.
pub fn init_logging(default_level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let Some(log_dir) = log_dir else {
        let _ = tracing_subscriber::registry()
            .with(build_filter(default_level))
            .with(stderr_layer)
            .try_init();
        return None;
    };

    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Warning: Could not create logs directory: {}", e);
        let _ = tracing_subscriber::registry()
            .with(build_filter(default_level))
            .with(stderr_layer)
            .try_init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI colors in log files
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let _ = tracing_subscriber::registry()
        .with(build_filter(default_level))
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Some(guard)
}
