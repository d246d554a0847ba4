//! # SOTW Aggregated Discovery Service
//!
//! The State-of-the-World ADS stream: every response carries the complete
//! resource set for a type URL, not just what changed. Grounded on the
//! teacher's `xds::services::stream::run_stream_loop` and
//! `xds::services::minimal::MinimalAggregatedDiscoveryService`, generalized
//! from the teacher's static per-request resource builders to read a live
//! [`crate::xds::cache::XdsCache`].

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

use envoy_types::pb::envoy::service::discovery::v3::{
    aggregated_discovery_service_server::AggregatedDiscoveryService, DeltaDiscoveryRequest,
    DeltaDiscoveryResponse, DiscoveryRequest, DiscoveryResponse,
};

use crate::xds::cache::XdsCache;
use crate::xds::delta;

#[derive(Clone, Debug)]
struct LastDiscoverySnapshot {
    version: Arc<str>,
    nonce: Arc<str>,
}

/// Builds a full-state `DiscoveryResponse` for `request.type_url`, honoring
/// an explicit (non-wildcard) `resource_names` subscription.
fn build_response(cache: &XdsCache, request: &DiscoveryRequest) -> DiscoveryResponse {
    let resources = cache.resources_for(&request.type_url, &request.resource_names);
    DiscoveryResponse {
        version_info: cache.type_version(&request.type_url).to_string(),
        resources: resources.into_iter().map(|r| r.body).collect(),
        type_url: request.type_url.clone(),
        nonce: uuid::Uuid::new_v4().to_string(),
        canary: false,
        control_plane: None,
        resource_errors: Vec::new(),
    }
}

/// Runs the SOTW stream loop for one client connection: services incoming
/// `DiscoveryRequest`s (detecting ACK/NACK so duplicates are not
/// reprocessed) and pushes a fresh snapshot for every type URL the client
/// has subscribed to whenever the cache broadcasts a change.
pub fn run_stream_loop(
    cache: Arc<XdsCache>,
    mut in_stream: tonic::Streaming<DiscoveryRequest>,
) -> ReceiverStream<std::result::Result<DiscoveryResponse, Status>> {
    let (tx, rx) = tokio::sync::mpsc::channel(100);
    let last_sent = Arc::new(Mutex::new(HashMap::<String, LastDiscoverySnapshot>::new()));
    let mut update_rx = cache.subscribe();
    let subscribed_names = Arc::new(Mutex::new(HashMap::<String, Vec<String>>::new()));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                result = in_stream.next() => {
                    match result {
                        Some(Ok(request)) => {
                            let node_id = request.node.as_ref().map(|n| n.id.clone()).unwrap_or_default();
                            let current_version = cache.type_version(&request.type_url).to_string();

                            let is_ack = {
                                let guard = last_sent.lock().expect("lock poisoned");
                                guard.get(&request.type_url).map(|snapshot| {
                                    !request.response_nonce.is_empty()
                                        && request.response_nonce == snapshot.nonce.as_ref()
                                        && request.version_info == snapshot.version.as_ref()
                                        && request.error_detail.is_none()
                                        && snapshot.version.as_ref() == current_version
                                }).unwrap_or(false)
                            };

                            if let Some(error_detail) = request.error_detail.as_ref() {
                                warn!(
                                    type_url = %request.type_url,
                                    error_message = %error_detail.message,
                                    node_id = %node_id,
                                    "[NACK] Envoy rejected previous ADS response"
                                );
                                crate::xds::record_request(&request.type_url, &node_id, false).await;
                            } else if is_ack {
                                debug!(type_url = %request.type_url, node_id = %node_id, "[ACK] skipping duplicate ADS request");
                                crate::xds::record_request(&request.type_url, &node_id, true).await;
                                continue;
                            } else {
                                crate::xds::record_request(&request.type_url, &node_id, true).await;
                            }

                            {
                                let mut guard = subscribed_names.lock().expect("lock poisoned");
                                guard.insert(request.type_url.clone(), request.resource_names.clone());
                            }

                            let response = build_response(&cache, &request);
                            {
                                let mut guard = last_sent.lock().expect("lock poisoned");
                                guard.insert(
                                    response.type_url.clone(),
                                    LastDiscoverySnapshot {
                                        version: Arc::from(response.version_info.as_str()),
                                        nonce: Arc::from(response.nonce.as_str()),
                                    },
                                );
                            }
                            crate::xds::record_version(&response.type_url, cache.type_version(&response.type_url)).await;

                            if tx.send(Ok(response)).await.is_err() {
                                error!("ADS response receiver dropped");
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "error receiving ADS request");
                            let _ = tx.send(Err(e)).await;
                            break;
                        }
                        None => {
                            info!("ADS stream ended by client");
                            break;
                        }
                    }
                }
                update = update_rx.recv() => {
                    match update {
                        Ok(update) => {
                            let interested: Vec<(String, Vec<String>)> = {
                                let guard = subscribed_names.lock().expect("lock poisoned");
                                guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
                            };
                            for delta in &update.deltas {
                                let Some((_, names)) = interested.iter().find(|(t, _)| t == &delta.type_url) else { continue };
                                let request = DiscoveryRequest {
                                    type_url: delta.type_url.clone(),
                                    resource_names: names.clone(),
                                    ..Default::default()
                                };
                                let response = build_response(&cache, &request);
                                {
                                    let mut guard = last_sent.lock().expect("lock poisoned");
                                    guard.insert(
                                        response.type_url.clone(),
                                        LastDiscoverySnapshot {
                                            version: Arc::from(response.version_info.as_str()),
                                            nonce: Arc::from(response.nonce.as_str()),
                                        },
                                    );
                                }
                                crate::xds::record_version(&response.type_url, cache.type_version(&response.type_url)).await;
                                if tx.send(Ok(response)).await.is_err() {
                                    error!("ADS push receiver dropped");
                                    return;
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "ADS stream missed update notifications");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            warn!("xDS cache update channel closed");
                            break;
                        }
                    }
                }
            }
        }
    });

    ReceiverStream::new(rx)
}

#[derive(Debug)]
pub struct AdsService {
    cache: Arc<XdsCache>,
}

impl AdsService {
    pub fn new(cache: Arc<XdsCache>) -> Self {
        Self { cache }
    }
}

#[tonic::async_trait]
impl AggregatedDiscoveryService for AdsService {
    type StreamAggregatedResourcesStream =
        Pin<Box<dyn Stream<Item = std::result::Result<DiscoveryResponse, Status>> + Send>>;
    type DeltaAggregatedResourcesStream =
        Pin<Box<dyn Stream<Item = std::result::Result<DeltaDiscoveryResponse, Status>> + Send>>;

    async fn stream_aggregated_resources(
        &self,
        request: Request<tonic::Streaming<DiscoveryRequest>>,
    ) -> std::result::Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
        info!("new ADS (SOTW) stream connection");
        crate::xds::record_connection("ads/sotw", true).await;
        let stream = run_stream_loop(self.cache.clone(), request.into_inner());
        Ok(Response::new(Box::pin(stream)))
    }

    async fn delta_aggregated_resources(
        &self,
        request: Request<tonic::Streaming<DeltaDiscoveryRequest>>,
    ) -> std::result::Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        info!("new ADS (delta) stream connection");
        crate::xds::record_connection("ads/delta", true).await;
        let stream = delta::run_delta_loop(self.cache.clone(), request.into_inner());
        Ok(Response::new(Box::pin(stream)))
    }
}
