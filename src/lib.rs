//! # glidepath
//!
//! An infrastructure-agnostic Envoy control plane for Kubernetes: watch a
//! fixed set of Kubernetes object kinds, fold them into a single dependency
//! graph, translate that graph into Envoy xDS resources, and serve them
//! over ADS (both the State-of-the-World and Delta streaming variants).
//!
//! ## Architecture
//!
//! ```text
//! Kubernetes informers → ObjectCache → DAG builder → Translators → xDS cache → ADS server → Envoy
//!                                           ↓
//!                                    Status Reporter
//! ```
//!
//! ## Core components
//!
//! - [`cache`]: the last-observed state of every watched object
//! - [`dag`]: the pure, nine-pass builder turning a snapshot into a `Dag`
//! - [`translate`] and [`endpoint`]: `Dag` (and EndpointSlice) to xDS resources
//! - [`xds`]: the ADS gRPC server and its resource cache
//! - [`status`]: conflates per-run object status against what was last published
//! - [`k8s`]: the Kubernetes object model and informer adapter
//! - [`config`], [`errors`], [`observability`]: ambient process concerns

pub mod cache;
pub mod cli;
pub mod config;
pub mod dag;
pub mod endpoint;
pub mod errors;
pub mod k8s;
pub mod observability;
pub mod status;
pub mod translate;
pub mod xds;

pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Wires up every long-running task the control plane needs and runs until
/// a `SIGINT`/`SIGTERM` is received: the Kubernetes informers, the DAG
/// rebuild worker, and the xDS ADS server. Returns once the xDS server has
/// finished draining in-flight streams.
pub async fn serve(config: AppConfig) -> Result<()> {
    observability::init_observability(&config.observability).await?;
    observability::log_config_info(&config);

    let config = std::sync::Arc::new(config);

    let client = k8s::informer::build_client(&config.kubernetes).await?;
    let (object_cache, rebuild_rx) = cache::ObjectCache::new();
    k8s::informer::spawn_all(client, object_cache.clone());

    let xds_cache = std::sync::Arc::new(xds::XdsCache::new());
    let status_reporter = std::sync::Arc::new(status::StatusReporter::new(status::LoggingStatusSink));

    tokio::spawn(xds::rebuild::run(
        object_cache,
        rebuild_rx,
        xds_cache.clone(),
        config.clone(),
        status_reporter,
    ));

    let shutdown_signal = async {
        shutdown::wait_for_signal().await;
        tracing::info!("shutdown signal received, draining xDS streams");
    };

    xds::start_server(&config.xds, config.xds.tls.clone(), xds_cache, shutdown_signal).await
}

mod shutdown {
    /// Resolves on `SIGINT` (ctrl-c) or, on Unix, `SIGTERM` — the signal a
    /// Kubernetes `kubectl delete pod` sends before its grace period expires.
    pub async fn wait_for_signal() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_looks_like_semver() {
        let components: Vec<_> = VERSION.split('.').collect();
        assert!(components.len() >= 3, "version should follow semver: {VERSION}");
        assert!(components.iter().all(|part| !part.is_empty()));
        assert_eq!(APP_NAME, "glidepath");
    }
}
