//! # DAG Rebuild Worker
//!
//! The single task that turns an [`crate::cache::ObjectCache`] rebuild
//! signal into a fresh [`crate::dag::Dag`], translates it, and pushes the
//! result into the [`crate::xds::cache::XdsCache`] in the push order spec
//! §5 names: CDS, then EDS, then LDS, then RDS, then SDS. Object statuses
//! from the same builder run go to the [`crate::status::StatusReporter`].
//! Grounded on the teacher's single-writer pattern (`XdsState` is mutated
//! only from within `apply_built_resources`, never concurrently).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::cache::ObjectCache;
use crate::config::AppConfig;
use crate::dag;
use crate::endpoint;
use crate::status::{StatusReporter, StatusSink};
use crate::translate::{self, CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL, LISTENER_TYPE_URL, ROUTE_TYPE_URL, SECRET_TYPE_URL};
use crate::xds::cache::XdsCache;

/// Runs forever, processing one rebuild request at a time. The capacity-1
/// coalescing channel in [`ObjectCache`] guarantees this loop never falls
/// behind: any rebuild request that arrives mid-run is captured by the next
/// `recv` rather than queued.
#[instrument(skip_all)]
pub async fn run<S: StatusSink>(
    object_cache: Arc<ObjectCache>,
    mut rebuild_rx: mpsc::Receiver<()>,
    xds_cache: Arc<XdsCache>,
    config: Arc<AppConfig>,
    status_reporter: Arc<StatusReporter<S>>,
) {
    // An initial rebuild runs immediately so a cold start with zero informer
    // events yet still publishes an (empty) resource set.
    rebuild_once(&object_cache, &xds_cache, &config, &status_reporter).await;

    while rebuild_rx.recv().await.is_some() {
        rebuild_once(&object_cache, &xds_cache, &config, &status_reporter).await;
    }

    info!("DAG rebuild worker stopped: rebuild channel closed");
}

async fn rebuild_once<S: StatusSink>(
    object_cache: &Arc<ObjectCache>,
    xds_cache: &Arc<XdsCache>,
    config: &Arc<AppConfig>,
    status_reporter: &Arc<StatusReporter<S>>,
) {
    let started = Instant::now();
    let snapshot = object_cache.snapshot();

    let (built_dag, statuses) = dag::build(&snapshot, config);
    let translated = translate::translate(&built_dag, config);
    let endpoints = endpoint::build_endpoints(&built_dag, &snapshot);

    xds_cache.apply(CLUSTER_TYPE_URL, translated.clusters);
    xds_cache.apply(ENDPOINT_TYPE_URL, endpoints);
    xds_cache.apply(LISTENER_TYPE_URL, translated.listeners);
    xds_cache.apply(ROUTE_TYPE_URL, translated.routes);
    xds_cache.apply(SECRET_TYPE_URL, translated.secrets);

    let status_count = statuses.len();
    status_reporter.report(statuses).await;

    if let Some(metrics) = crate::observability::metrics::get_metrics().await {
        metrics.record_dag_build(started.elapsed().as_secs_f64(), status_count);
        metrics.set_xds_resource_version(CLUSTER_TYPE_URL, xds_cache.type_version(CLUSTER_TYPE_URL));
    }

    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        objects = snapshot.len(),
        statuses = status_count,
        "DAG rebuild complete"
    );
}
