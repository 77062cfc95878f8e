//! Logging bootstrap for applications embedding the migrator.
//!
//! The engine itself only emits `tracing` events and spans. Applications that
//! have no subscriber of their own can call [`init`] once at startup.
//!
//! # Environment Variables
//!
//! - `SEQMIG_LOG=debug|info|warn|error|trace` - Log level (default: info)
//! - `SEQMIG_LOG_FORMAT=json|pretty|compact` - Output format (default: compact)

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV_VAR: &str = "SEQMIG_LOG";

/// Environment variable holding the log format.
pub const LOG_FORMAT_ENV_VAR: &str = "SEQMIG_LOG_FORMAT";

/// Get the configured log level from `SEQMIG_LOG`.
pub fn get_log_level() -> &'static str {
    parse_level(env::var(LOG_LEVEL_ENV_VAR).ok().as_deref())
}

/// Get the configured log format from `SEQMIG_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    parse_format(env::var(LOG_FORMAT_ENV_VAR).ok().as_deref())
}

fn parse_level(value: Option<&str>) -> &'static str {
    match value.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

fn parse_format(value: Option<&str>) -> &'static str {
    match value.map(str::to_lowercase).as_deref() {
        Some("json") => "json",
        Some("pretty") => "pretty",
        _ => "compact",
    }
}

/// Install a global `tracing` subscriber for the `seqmig` targets.
///
/// Subsequent calls are no-ops. Without the `tracing-subscriber` feature this
/// does nothing and events go to whatever subscriber the application set up.
pub fn init() {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!("seqmig={}", level))
                .unwrap_or_else(|_| EnvFilter::new("info"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match get_log_format() {
                "json" => registry.with(fmt::layer().json()).try_init(),
                "pretty" => registry.with(fmt::layer().pretty()).try_init(),
                _ => registry.with(fmt::layer().compact()).try_init(),
            };

            if installed.is_ok() {
                tracing::debug!(level = level, format = get_log_format(), "seqmig logging initialized");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(None), "info");
        assert_eq!(parse_level(Some("DEBUG")), "debug");
        assert_eq!(parse_level(Some("nonsense")), "info");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format(None), "compact");
        assert_eq!(parse_format(Some("json")), "json");
        assert_eq!(parse_format(Some("Pretty")), "pretty");
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
