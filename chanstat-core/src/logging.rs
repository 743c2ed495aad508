//! Run diagnostics for chanstat.
//!
//! Everything a parse run reports goes to a daily rolled file under
//! `$XDG_STATE_HOME/chanstat/`, never to stdout, which carries the per-file summary.
//! `debug` marks a line only partly recorded, such as an oversized URL or topic.
//! `warn` marks an event skipped for an invalid nick. `error` marks a file that
//! could not be opened.

use crate::config::{Config, LoggingConfig};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Installs the global subscriber writing to [`Config::log_path`].
///
/// `RUST_LOG` wins over `[logging] level` when set. Keep the returned guard alive
/// for the whole run; dropping it flushes buffered lines.
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_path = Config::log_path();
    let (log_dir, file_prefix) = split_log_path(&log_path);
    std::fs::create_dir_all(log_dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(
        log = %log_path.display(),
        level = %config.level,
        "chanstat diagnostics enabled"
    );

    Ok(LoggingGuard { _worker: guard })
}

/// Test subscriber: honours `RUST_LOG` and writes through the test harness capture.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Flushes the background log writer on drop.
pub struct LoggingGuard {
    _worker: tracing_appender::non_blocking::WorkerGuard,
}

/// Directory and file-name prefix handed to the rolling appender.
fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("chanstat.log");
    (dir, prefix)
}
