//! Logging setup for trackline
//!
//! Logs go to `~/.local/state/trackline/trackline.log` (XDG state dir), rotated daily.
//! The dispatcher worker logs under the `trackline_core::dispatch` target and
//! can be filtered separately from the rest of the library.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::MakeWriterExt},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target of everything logged by the dispatcher and its worker thread
pub const DISPATCH_TARGET: &str = "trackline_core::dispatch";

/// File name prefix; the appender adds the date
pub const LOG_FILE_NAME: &str = "trackline.log";

/// Filter directives for `config`, e.g. `info,trackline_core::dispatch=debug`
pub fn filter_directives(config: &LoggingConfig) -> String {
    match &config.dispatch_level {
        Some(dispatch_level) => format!("{},{}={}", config.level, DISPATCH_TARGET, dispatch_level),
        None => config.level.clone(),
    }
}

/// `RUST_LOG` wins over the configured levels
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = filter_directives(config);
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("invalid log level {:?}: {}", directives, e)))
}

/// Install the global subscriber.
///
/// Writes through a non-blocking appender so the dispatcher thread never
/// waits on disk; keep the returned guard alive until exit.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = build_filter(config)?;

    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr.with_max_level(Level::WARN))
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install logger: {}", e)))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        filter = %filter_directives(config),
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Test subscriber: captured output, dispatcher spans included
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Flushes pending writes when dropped
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Path prefix of the log files
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path();
        assert!(path.ends_with(LOG_FILE_NAME));
    }

    #[test]
    fn test_dispatch_level_adds_target_directive() {
        let mut config = LoggingConfig::default();
        assert_eq!(filter_directives(&config), "info");

        config.level = "warn".to_string();
        config.dispatch_level = Some("debug".to_string());
        assert_eq!(
            filter_directives(&config),
            "warn,trackline_core::dispatch=debug"
        );
        assert!(EnvFilter::try_new(filter_directives(&config)).is_ok());
    }

    #[test]
    fn test_dispatch_target_matches_module_path() {
        assert_eq!(
            DISPATCH_TARGET,
            module_path!().replace("logging", "dispatch")
        );
    }
}
