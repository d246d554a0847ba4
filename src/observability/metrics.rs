//! # Metrics Collection
//!
//! Prometheus metrics for the control plane's own health: DAG rebuild
//! latency and outcome, xDS stream/version activity, endpoint translation
//! throughput, and object status.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use ::tracing::info;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metrics recorder for control-plane internals.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record a completed DAG rebuild.
    pub fn record_dag_build(&self, duration_seconds: f64, status_count: usize) {
        counter!("dag_builds_total").increment(1);
        histogram!("dag_build_duration_seconds").record(duration_seconds);
        gauge!("dag_object_statuses_total").set(status_count as f64);
    }

    /// Record an object status emitted by the DAG builder.
    pub fn record_object_status(&self, kind: &str, valid: bool) {
        let status = if valid { "valid" } else { "invalid" };
        let labels = [("kind", kind.to_string()), ("status", status.to_string())];
        counter!("dag_object_statuses_emitted_total", &labels).increment(1);
    }

    /// Record an xDS stream lifecycle event.
    pub fn record_xds_connection(&self, type_url: &str, connected: bool) {
        let labels = [("type_url", type_url.to_string())];
        if connected {
            gauge!("xds_active_streams", &labels).increment(1.0);
        } else {
            gauge!("xds_active_streams", &labels).decrement(1.0);
        }
    }

    /// Record an xDS request/ACK/NACK outcome.
    pub fn record_xds_request(&self, type_url: &str, node_id: &str, acked: bool) {
        let labels = [("type_url", type_url.to_string()), ("node_id", node_id.to_string())];
        counter!("xds_discovery_requests_total", &labels).increment(1);

        let status = if acked { "ack" } else { "nack" };
        let status_labels = [("type_url", type_url.to_string()), ("status", status.to_string())];
        counter!("xds_discovery_responses_total", &status_labels).increment(1);
    }

    /// Record the version currently being served for a resource type.
    pub fn set_xds_resource_version(&self, type_url: &str, version: u64) {
        let labels = [("type_url", type_url.to_string())];
        gauge!("xds_resource_version", &labels).set(version as f64);
    }

    /// Record EndpointSlice translation throughput.
    pub fn record_endpoint_update(&self, cluster_name: &str, endpoint_count: usize) {
        counter!("endpoint_translations_total").increment(1);
        let labels = [("cluster", cluster_name.to_string())];
        gauge!("endpoint_cluster_size", &labels).set(endpoint_count as f64);
    }

    /// Record an object cache upsert/delete.
    pub fn record_cache_event(&self, kind: &str, operation: &str) {
        let labels = [("kind", kind.to_string()), ("operation", operation.to_string())];
        counter!("object_cache_events_total", &labels).increment(1);
    }

    /// Update process uptime gauge.
    pub fn update_uptime(&self, uptime_seconds: f64) {
        gauge!("process_uptime_seconds").set(uptime_seconds);
    }

    /// Register metric descriptions and zero the counters so they appear
    /// in scrapes before the first event occurs.
    pub fn register(&self) {
        describe_counter!("dag_builds_total", Unit::Count, "Number of DAG rebuild passes run");
        describe_histogram!(
            "dag_build_duration_seconds",
            Unit::Seconds,
            "Wall-clock duration of a DAG rebuild pass"
        );
        describe_gauge!(
            "dag_object_statuses_total",
            Unit::Count,
            "Number of object statuses produced by the last rebuild"
        );
        describe_counter!(
            "dag_object_statuses_emitted_total",
            Unit::Count,
            "Object status outcomes by kind and validity"
        );
        describe_gauge!("xds_active_streams", Unit::Count, "Active xDS streams by type URL");
        describe_counter!(
            "xds_discovery_requests_total",
            Unit::Count,
            "DiscoveryRequests received by type URL and node"
        );
        describe_counter!(
            "xds_discovery_responses_total",
            Unit::Count,
            "DiscoveryResponse outcomes (ack/nack)"
        );
        describe_gauge!("xds_resource_version", Unit::Count, "Version currently served per type URL");
        describe_counter!(
            "endpoint_translations_total",
            Unit::Count,
            "Number of EndpointSlice-driven ClusterLoadAssignment rebuilds"
        );
        describe_gauge!("endpoint_cluster_size", Unit::Count, "Endpoints currently assigned per cluster");
        describe_counter!("object_cache_events_total", Unit::Count, "ObjectCache upsert/delete events");
        describe_gauge!("process_uptime_seconds", Unit::Seconds, "Process uptime");

        counter!("dag_builds_total").absolute(0);
        counter!("endpoint_translations_total").absolute(0);
    }
}

static METRICS: once_cell::sync::Lazy<Arc<RwLock<Option<MetricsRecorder>>>> =
    once_cell::sync::Lazy::new(|| Arc::new(RwLock::new(None)));

/// Install the Prometheus exporter and register metric descriptions.
pub async fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => return Ok(()),
    };

    let socket_addr: SocketAddr = metrics_addr
        .parse()
        .map_err(|e| Error::config(format!("invalid metrics bind address '{}': {}", metrics_addr, e)))?;

    let builder = PrometheusBuilder::new().with_http_listener(socket_addr);
    builder
        .install()
        .map_err(|e| Error::config(format!("failed to initialize metrics exporter: {}", e)))?;

    let recorder = MetricsRecorder::new();
    {
        let mut metrics = METRICS.write().await;
        *metrics = Some(recorder.clone());
    }
    recorder.register();

    info!(metrics_addr = %metrics_addr, "metrics collection initialized");
    Ok(())
}

pub async fn get_metrics() -> Option<MetricsRecorder> {
    METRICS.read().await.clone()
}

pub async fn record_dag_build(duration_seconds: f64, status_count: usize) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_dag_build(duration_seconds, status_count);
    }
}

pub async fn record_xds_request(type_url: &str, node_id: &str, acked: bool) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_xds_request(type_url, node_id, acked);
    }
}

pub async fn record_endpoint_update(cluster_name: &str, endpoint_count: usize) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_endpoint_update(cluster_name, endpoint_count);
    }
}

/// Periodically refreshes the uptime gauge. Spawned once from `main`.
pub struct UptimeCollector {
    start_time: std::time::Instant,
}

impl Default for UptimeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeCollector {
    pub fn new() -> Self {
        Self { start_time: std::time::Instant::now() }
    }

    pub async fn run(&self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Some(metrics) = get_metrics().await {
                metrics.update_uptime(self.start_time.elapsed().as_secs_f64());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_records_dag_build() {
        let recorder = MetricsRecorder::new();
        recorder.record_dag_build(0.25, 12);
    }

    #[test]
    fn recorder_records_xds_activity() {
        let recorder = MetricsRecorder::new();
        recorder.record_xds_connection("type.googleapis.com/envoy.config.cluster.v3.Cluster", true);
        recorder.record_xds_request(
            "type.googleapis.com/envoy.config.cluster.v3.Cluster",
            "node-1",
            true,
        );
        recorder.set_xds_resource_version("type.googleapis.com/envoy.config.cluster.v3.Cluster", 4);
        recorder.record_xds_connection("type.googleapis.com/envoy.config.cluster.v3.Cluster", false);
    }

    #[test]
    fn recorder_records_endpoint_and_cache_events() {
        let recorder = MetricsRecorder::new();
        recorder.record_endpoint_update("default/echo", 3);
        recorder.record_cache_event("Service", "upsert");
        recorder.record_object_status("HTTPProxy", true);
    }

    #[tokio::test]
    async fn init_metrics_is_noop_when_disabled() {
        let config = ObservabilityConfig { metrics_port: 0, ..Default::default() };
        let result = init_metrics(&config).await;
        assert!(result.is_ok());
    }
}
