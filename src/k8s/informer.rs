//! # Informer Adapter
//!
//! Bridges `kube::runtime::watcher` event streams to [`crate::cache::ObjectCache`].
//! The informer/watch layer itself is an external collaborator per spec §1
//! ("out of scope... specified only by the interface the core consumes");
//! this module is the thin, concrete wiring a runnable binary needs on top
//! of that interface, grounded on the teacher's `kube`-based client setup.

use futures::StreamExt;
use kube::runtime::watcher::{self, Event};
use kube::{Api, Client};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::ObjectCache;
use crate::errors::Result;
use crate::k8s::types::{ObjectKind, ObjectMeta, WatchedObject};

/// Runs one `kube::runtime::watcher` stream for a single Kubernetes kind,
/// translating each event into an [`ObjectCache`] mutation. Spawned once
/// per watched kind by [`run_informers`].
pub async fn run_watch<K, F>(
    client: Client,
    cache: Arc<ObjectCache>,
    kind: ObjectKind,
    convert: F,
) where
    K: kube::Resource + Clone + std::fmt::Debug + for<'de> serde::Deserialize<'de> + Send + 'static,
    K::DynamicType: Default,
    F: Fn(K) -> Option<WatchedObject> + Send + Sync + 'static,
{
    let api: Api<K> = Api::all(client);
    let mut stream = Box::pin(watcher::watcher(api, watcher::Config::default()).default_backoff());

    loop {
        match stream.next().await {
            Some(Ok(Event::Apply(obj))) => {
                if let Some(watched) = convert(obj) {
                    cache.upsert(watched);
                }
            }
            Some(Ok(Event::Delete(obj))) => {
                if let Some(watched) = convert(obj) {
                    cache.delete(kind, watched.meta().nsname());
                }
            }
            Some(Ok(Event::Init)) | Some(Ok(Event::InitApply(_))) | Some(Ok(Event::InitDone)) => {
                debug!(%kind, "informer resync in progress");
            }
            Some(Err(error)) => {
                warn!(%kind, %error, "informer watch stream error, retrying with backoff");
            }
            None => {
                warn!(%kind, "informer watch stream ended, this should not happen with default_backoff");
                break;
            }
        }
    }
}

/// Constructs a `kube::Client` from the process configuration (in-cluster
/// or kubeconfig-file based) per §6's Kubernetes client surface.
pub async fn build_client(config: &crate::config::KubernetesConfig) -> Result<Client> {
    let client = if config.in_cluster {
        Client::try_default().await?
    } else if let Some(path) = &config.kubeconfig_path {
        let kubeconfig = kube::config::Kubeconfig::read_from(path)
            .map_err(|e| crate::errors::Error::config_with_source("invalid kubeconfig", Box::new(e)))?;
        let options = kube::config::KubeConfigOptions::default();
        let client_config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &options).await.map_err(|e| {
                crate::errors::Error::config_with_source("failed to build kube config", Box::new(e))
            })?;
        Client::try_from(client_config)?
    } else {
        Client::try_default().await?
    };
    Ok(client)
}

pub fn meta_from<K: kube::Resource<DynamicType = ()>>(obj: &K) -> Option<ObjectMeta> {
    let meta = obj.meta();
    Some(ObjectMeta {
        namespace: meta.namespace.clone()?,
        name: meta.name.clone()?,
        creation_timestamp: meta
            .creation_timestamp
            .as_ref()
            .map(|t| t.0)
            .unwrap_or_else(chrono::Utc::now),
        generation: meta.generation.unwrap_or(0),
        annotations: meta
            .annotations
            .as_ref()
            .map(|a| a.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default(),
    })
}

/// Spawns one [`run_watch`] task per kind this control plane understands
/// (spec §6's input list). Each task runs for the lifetime of the process;
/// a watch that errors retries with `default_backoff` rather than
/// terminating the process.
pub fn spawn_all(client: Client, cache: Arc<ObjectCache>) {
    use crate::k8s::convert;
    use crate::k8s::crds::{ExtensionService, HTTPProxy, TLSCertificateDelegation};
    use crate::k8s::gateway_api::{Gateway, GatewayClass, HTTPRoute, ReferenceGrant, TCPRoute, TLSRoute};
    use crate::k8s::types::WatchedObject;
    use k8s_openapi::api::core::v1::{Secret, Service};
    use k8s_openapi::api::discovery::v1::EndpointSlice;
    use k8s_openapi::api::networking::v1::Ingress;

    macro_rules! spawn_watch {
        ($kind:expr, $ty:ty, $convert:expr) => {
            tokio::spawn(run_watch::<$ty, _>(client.clone(), cache.clone(), $kind, $convert));
        };
    }

    spawn_watch!(ObjectKind::Service, Service, |obj: Service| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::Service(convert::service_to_object(meta, obj)))
    });

    spawn_watch!(ObjectKind::EndpointSlice, EndpointSlice, |obj: EndpointSlice| {
        let meta = meta_from(&obj)?;
        convert::endpoint_slice_to_object(meta, obj).map(WatchedObject::EndpointSlice)
    });

    spawn_watch!(ObjectKind::Secret, Secret, |obj: Secret| {
        let meta = meta_from(&obj)?;
        convert::secret_to_object(meta, obj).map(WatchedObject::Secret)
    });

    spawn_watch!(ObjectKind::Ingress, Ingress, |obj: Ingress| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::Ingress(convert::ingress_to_object(meta, obj)))
    });

    spawn_watch!(ObjectKind::HttpProxy, HTTPProxy, |obj: HTTPProxy| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::HttpProxy(obj.spec.into_object(meta)))
    });

    spawn_watch!(
        ObjectKind::TlsCertificateDelegation,
        TLSCertificateDelegation,
        |obj: TLSCertificateDelegation| {
            let meta = meta_from(&obj)?;
            Some(WatchedObject::TlsCertificateDelegation(obj.spec.into_object(meta)))
        }
    );

    spawn_watch!(ObjectKind::ExtensionService, ExtensionService, |obj: ExtensionService| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::ExtensionService(obj.spec.into_object(meta)))
    });

    spawn_watch!(ObjectKind::Gateway, Gateway, |obj: Gateway| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::Gateway(obj.spec.into_object(meta)))
    });

    spawn_watch!(ObjectKind::HttpRoute, HTTPRoute, |obj: HTTPRoute| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::HttpRoute(obj.spec.into_object(meta)))
    });

    spawn_watch!(ObjectKind::TlsRoute, TLSRoute, |obj: TLSRoute| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::TlsRoute(obj.spec.into_object(meta)))
    });

    spawn_watch!(ObjectKind::TcpRoute, TCPRoute, |obj: TCPRoute| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::TcpRoute(obj.spec.into_object(meta)))
    });

    spawn_watch!(ObjectKind::ReferenceGrant, ReferenceGrant, |obj: ReferenceGrant| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::ReferenceGrant(obj.spec.into_object(meta)))
    });

    spawn_watch!(ObjectKind::GatewayClass, GatewayClass, |obj: GatewayClass| {
        let meta = meta_from(&obj)?;
        Some(WatchedObject::GatewayClass(obj.spec.into_object(meta)))
    });
}
