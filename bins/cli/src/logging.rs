//! Stderr tracing subscriber setup.

use crate::format::LogFormat;
use tracing_subscriber::EnvFilter;

/// Env var holding the log filter directive (`EnvFilter` syntax).
pub const ENV_LOG: &str = "ERRCHAN_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber. A second call is a no-op.
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.compact().try_init().ok(),
        LogFormat::Json => builder.json().try_init().ok(),
    };
}
