//! # Structured Logging Helpers
//!
//! Span macros for the control plane's two recurring units of work: a DAG
//! rebuild and an xDS stream exchange.

/// Create a tracing span for a DAG rebuild pass.
#[macro_export]
macro_rules! dag_span {
    ($trigger:expr) => {
        tracing::info_span!(
            "dag_build",
            trigger = %$trigger,
            build_id = %uuid::Uuid::new_v4(),
            version = tracing::field::Empty,
            status_count = tracing::field::Empty,
        )
    };
}

/// Create a tracing span for an xDS stream operation.
#[macro_export]
macro_rules! xds_span {
    ($operation:expr, $node_id:expr) => {
        tracing::info_span!(
            "xds_operation",
            operation = %$operation,
            node_id = %$node_id,
            stream_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $node_id:expr, $($field:tt)*) => {
        tracing::info_span!(
            "xds_operation",
            operation = %$operation,
            node_id = %$node_id,
            stream_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Log the resolved configuration once at startup.
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        insecure_listener = %format!("{}:{}", config.listeners.bind_address, config.listeners.insecure_port),
        secure_listener = %format!("{}:{}", config.listeners.bind_address, config.listeners.secure_port),
        xds_address = %config.xds.bind_addr(),
        xds_tls_enabled = %config.xds.tls.is_some(),
        metrics_address = ?config.observability.metrics_bind_address(),
        log_format = ?config.observability.log_format,
        "glidepath control plane configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_compile() {
        let _span = dag_span!("cache_update");
        let _span = xds_span!("stream_opened", "node-1");
        let _span = xds_span!("stream_opened", "node-1", resource_type = "cluster");
    }

    #[test]
    fn log_config_info_does_not_panic() {
        let config = crate::config::AppConfig::default();
        log_config_info(&config);
    }
}
