//! Logging for the commitbill binaries.
//!
//! Every run appends to a daily file under `$XDG_STATE_HOME/commitbill/` so a
//! cron-driven scheduler pass can be audited later. `-v` mirrors events to
//! stderr at debug level for this crate only; HTTP client internals stay at
//! `warn` either way.

use crate::config::{Config, LoggingConfig};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const LOG_FILE_PREFIX: &str = "commitbill.log";

/// Crates that log every request at debug level
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Filter directive for the configured level.
///
/// Our crates get `level` (`debug` when verbose), dependencies get `warn`.
pub fn filter_directive(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level };
    let mut directives = vec![level.to_string()];
    for krate in ["commitbill", "commitbill_core", "commitbill_scheduled"] {
        directives.push(format!("{krate}={level}"));
    }
    for krate in QUIET_DEPENDENCIES {
        directives.push(format!("{krate}=warn"));
    }
    directives.join(",")
}

/// Install the global subscriber.
///
/// `RUST_LOG` replaces the configured filter entirely when set.
pub fn init(config: &LoggingConfig, verbose: bool) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let (writer, guard) = tracing_appender::non_blocking(RollingFileAppender::new(
        Rotation::DAILY,
        &log_dir,
        LOG_FILE_PREFIX,
    ));

    let directive = filter_directive(&config.level, verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .compact()
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), filter = %directive, "Logging initialized");

    Ok(LoggingGuard { _guard: guard })
}

/// Route events to the test harness; safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Flushes buffered log lines when dropped; hold it until `main` returns.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Path of today's log file prefix (the appender adds a date suffix)
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
