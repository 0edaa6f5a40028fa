// Logging setup
//
// Human-readable logs go to stderr so command output on stdout stays clean.
// File logging, when enabled, writes JSON lines through a non-blocking
// rolling appender. The returned guard must live until the process exits or
// buffered lines are lost.
//
// Precedence: RUST_LOG env var > config file / --verbose > default "info"

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogRotation, LoggingConfig};

/// Filter used when RUST_LOG is unset
///
/// Dependencies stay at `warn`; this crate logs at `level`.
pub fn default_filter(level: &str) -> String {
    format!("warn,defectdesk={}", level)
}

fn rolling_appender(config: &LoggingConfig) -> RollingFileAppender {
    match config.file_rotation {
        LogRotation::Hourly => {
            tracing_appender::rolling::hourly(&config.file_dir, &config.file_prefix)
        }
        LogRotation::Daily => tracing_appender::rolling::daily(&config.file_dir, &config.file_prefix),
        LogRotation::Never => tracing_appender::rolling::never(&config.file_dir, &config.file_prefix),
    }
}

/// Install the global subscriber
///
/// `level_override` (from `--verbose`) replaces the configured level but
/// still loses to RUST_LOG.
pub fn init_tracing(config: &LoggingConfig, level_override: Option<&str>) -> Option<WorkerGuard> {
    let level = level_override.unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = if config.file_enabled {
        match std::fs::create_dir_all(&config.file_dir) {
            Ok(()) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(rolling_appender(config));
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .boxed();
                (Some(layer), Some(guard))
            }
            Err(e) => {
                // Subscriber isn't installed yet, so this can't go through tracing
                eprintln!(
                    "Warning: Could not create log directory {:?}: {}",
                    config.file_dir, e
                );
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}
