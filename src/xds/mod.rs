//! # xDS gRPC Server
//!
//! The ADS transport: a `tonic` server exposing
//! `AggregatedDiscoveryService` over both the State-of-the-World and Delta
//! streaming variants, backed by one [`cache::XdsCache`] shared across
//! every connected stream. Grounded on the teacher's
//! `xds::mod::start_minimal_xds_server_with_config` /
//! `configure_server_builder` / `build_server_tls_config` for the server
//! and TLS wiring, and `xds::services::stream` for the streaming protocol
//! (see [`ads`] and [`delta`]).

pub mod ads;
pub mod cache;
pub mod delta;
pub mod rebuild;

use std::future::Future;
use std::sync::Arc;

use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::info;

use envoy_types::pb::envoy::service::discovery::v3::aggregated_discovery_service_server::AggregatedDiscoveryServiceServer;

use crate::config::tls::XdsTlsConfig;
use crate::config::XdsConfig;
use crate::errors::{Error, Result};
use crate::observability::GrpcTracingLayer;
use crate::observability::metrics;

pub use ads::AdsService;
pub use cache::XdsCache;

/// Starts the ADS gRPC server and runs until `shutdown_signal` resolves.
pub async fn start_server<F>(
    xds_config: &XdsConfig,
    tls: Option<XdsTlsConfig>,
    xds_cache: Arc<XdsCache>,
    shutdown_signal: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = xds_config
        .bind_addr()
        .parse()
        .map_err(|e| Error::config(format!("invalid xDS bind address: {e}")))?;

    let ads_service = AdsService::new(xds_cache);

    let server_builder = configure_server_builder(Server::builder(), tls.as_ref())?;
    let server = server_builder
        .layer(GrpcTracingLayer::new())
        .add_service(AggregatedDiscoveryServiceServer::new(ads_service))
        .serve_with_shutdown(addr, shutdown_signal);

    info!(address = %addr, "xDS ADS server listening");

    server.await.map_err(|e| {
        let message = e.to_string();
        if message.contains("Address already in use") || message.contains("bind") {
            Error::transport(format!("xDS server failed to bind to {addr}: {message}"))
        } else {
            Error::transport(format!("xDS server failed: {message}"))
        }
    })
}

fn configure_server_builder(mut builder: Server, tls: Option<&XdsTlsConfig>) -> Result<Server> {
    if let Some(tls_config) = build_server_tls_config(tls)? {
        builder = builder
            .tls_config(tls_config)
            .map_err(|e| Error::transport(format!("failed to apply xDS TLS configuration: {e}")))?;

        if let Some(tls) = tls {
            info!(
                require_client_cert = tls.require_client_cert,
                has_client_ca = tls.client_ca_path.is_some(),
                "xDS server TLS enabled"
            );
        }
    }
    Ok(builder)
}

fn build_server_tls_config(tls: Option<&XdsTlsConfig>) -> Result<Option<ServerTlsConfig>> {
    let Some(tls) = tls else { return Ok(None) };

    let cert_bytes = std::fs::read(&tls.cert_path)
        .map_err(|e| Error::config(format!("failed to read xDS TLS certificate '{}': {e}", tls.cert_path.display())))?;
    let key_bytes = std::fs::read(&tls.key_path)
        .map_err(|e| Error::config(format!("failed to read xDS TLS private key '{}': {e}", tls.key_path.display())))?;

    let identity = Identity::from_pem(cert_bytes, key_bytes);
    let mut server_tls_config = ServerTlsConfig::new().identity(identity);

    if let Some(ca_path) = &tls.client_ca_path {
        let ca_bytes = std::fs::read(ca_path)
            .map_err(|e| Error::config(format!("failed to read xDS client CA '{}': {e}", ca_path.display())))?;
        server_tls_config = server_tls_config.client_ca_root(Certificate::from_pem(ca_bytes));
        if !tls.require_client_cert {
            server_tls_config = server_tls_config.client_auth_optional(true);
        }
    } else if tls.require_client_cert {
        return Err(Error::config(
            "client certificate verification is enabled but no client CA path is configured",
        ));
    }

    Ok(Some(server_tls_config))
}

pub(crate) async fn record_connection(type_url: &str, connected: bool) {
    if let Some(m) = metrics::get_metrics().await {
        m.record_xds_connection(type_url, connected);
    }
}

pub(crate) async fn record_request(type_url: &str, node_id: &str, acked: bool) {
    metrics::record_xds_request(type_url, node_id, acked).await;
}

pub(crate) async fn record_version(type_url: &str, version: u64) {
    if let Some(m) = metrics::get_metrics().await {
        m.set_xds_resource_version(type_url, version);
    }
}
