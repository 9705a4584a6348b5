//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the filter is derived from
//! `runtime.verbosity`. Logs go to stderr so stdout carries only the run
//! summary.

use peoplesync_engine::sync::Verbosity;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::error::{CliError, CliResult};

/// HTTP and TLS internals stay at `warn` unless `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,lettre=warn";

/// Filter directive for a configured verbosity.
pub fn filter_directive(verbosity: Verbosity) -> String {
    format!("{},{QUIET_DEPENDENCIES}", verbosity.as_str())
}

/// Initialize the global subscriber.
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_logging(format: LogFormat, verbosity: Verbosity) -> CliResult<()> {
    let filter = filter_directive(verbosity);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&filter))
        .map_err(|e| CliError::Logging(format!("failed to create log filter: {e}")))?;

    // `Option<Layer>` is a no-op when `None`, so both formats share one subscriber type.
    let json_layer = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .flatten_event(true)
    });
    let pretty_layer = (format == LogFormat::Pretty).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(json_layer)
        .with(pretty_layer)
        .with(filter_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    tracing::debug!(filter = %filter, "Logging initialized");
    Ok(())
}

/// Initialize logging for tests (with simpler output).
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
