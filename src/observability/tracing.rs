//! # Logging Initialization
//!
//! Initializes the global `tracing` subscriber. There is no OpenTelemetry
//! exporter here — the control plane is a long-running cluster-internal
//! process, not a request-serving edge, so structured stdout logs plus the
//! Prometheus metrics in [`crate::observability::metrics`] are the whole
//! observability surface per SPEC_FULL.md.

use crate::config::settings::LogFormat;
use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from observability config.
///
/// Idempotent in the sense that a second call returns an error rather than
/// panicking — callers that may run this more than once (tests) should
/// ignore the error.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = parse_env_filter(&config.log_level)?;

    match config.log_format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().json().flatten_event(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer)
                .try_init()
                .map_err(|e| Error::config(format!("failed to initialize logging: {}", e)))
        }
        LogFormat::Text => {
            let layer = tracing_subscriber::fmt::layer().with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer)
                .try_init()
                .map_err(|e| Error::config(format!("failed to initialize logging: {}", e)))
        }
    }
}

fn parse_env_filter(level: &str) -> Result<EnvFilter> {
    let normalized = level.trim();
    let lower = normalized.to_ascii_lowercase();

    match lower.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => {
            return Err(Error::config(format!(
                "invalid log level '{}': must be one of trace, debug, info, warn, error",
                level
            )));
        }
    }

    EnvFilter::try_new(normalized)
        .map_err(|e| Error::config(format!("invalid log level '{}': {}", level, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_log_level() {
        let result = parse_env_filter("verbose");
        assert!(result.is_err());
    }

    #[test]
    fn accepts_known_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(parse_env_filter(level).is_ok());
        }
    }
}
