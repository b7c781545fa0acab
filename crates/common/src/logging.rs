//! Tracing subscriber setup shared by the server and the CLI.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter for a configured level. `RUST_LOG` wins when set; an unparsable
/// level falls back to `info`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (repeated calls
/// from tests, or a host binary that set its own).
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = fmt()
        .with_env_filter(env_filter(&config.level))
        .with_target(true);

    let installed = if config.json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.compact().try_init()
    };
    installed.is_ok()
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() -> bool {
    init_logging(&LoggingConfig::default())
}

/// Level used by binaries when `--verbose` is passed.
pub fn verbose_config(verbose: bool) -> LoggingConfig {
    LoggingConfig {
        level: if verbose { "debug" } else { "info" }.to_string(),
        json: false,
    }
}
