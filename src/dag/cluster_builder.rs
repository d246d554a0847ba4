//! # Cluster Materialization
//!
//! Spec §4.2 pass 7: every Service-reference discovered while resolving
//! routes is turned into a stable Cluster key and deduplicated. Identity is
//! the quintuple (namespace, service, port, upstream-protocol hash, policy
//! hash); two routes that differ only in upstream policy get two distinct
//! Clusters sharing one EDS service-identity (spec §4.3 "Endpoint
//! translator specifics").

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::model::{
    CircuitBreakerSpec, Cluster, ClusterKind, HealthCheckSpec, LoadBalancingPolicy,
    UpstreamProtocol, UpstreamTlsValidation,
};
use super::service_index::ServiceIndex;
use super::status::StatusReason;
use crate::k8s::types::ServiceObject;

#[derive(Debug, Clone, Default)]
pub struct ClusterPolicy {
    pub upstream_protocol: UpstreamProtocol,
    pub load_balancing: LoadBalancingPolicy,
    pub health_check: Option<HealthCheckSpec>,
    pub tls_validation: Option<UpstreamTlsValidation>,
    pub client_certificate_secret_key: Option<String>,
    pub circuit_breaker: Option<CircuitBreakerSpec>,
}

impl Default for UpstreamProtocol {
    fn default() -> Self {
        UpstreamProtocol::Http11
    }
}

impl Default for LoadBalancingPolicy {
    fn default() -> Self {
        LoadBalancingPolicy::RoundRobin
    }
}

pub struct ClusterBuilder<'a> {
    service_index: &'a ServiceIndex,
    clusters: BTreeMap<String, Cluster>,
}

impl<'a> ClusterBuilder<'a> {
    pub fn new(service_index: &'a ServiceIndex) -> Self {
        Self { service_index, clusters: BTreeMap::new() }
    }

    /// Resolves (and if necessary materializes) the Cluster for a
    /// (namespace, service, port) reference under the given policy.
    /// Returns the stable cluster key, or an error reason if the Service
    /// or port cannot be resolved.
    pub fn resolve(
        &mut self,
        namespace: &str,
        service_name: &str,
        port: u16,
        policy: ClusterPolicy,
    ) -> Result<String, StatusReason> {
        let resolved_port = self
            .service_index
            .resolve_port(namespace, service_name, port)
            .ok_or(StatusReason::MissingService)?;

        let service = self.service_index.get(namespace, service_name).expect("resolved above");
        let key = cluster_key(namespace, service_name, resolved_port, &policy);

        self.clusters.entry(key.clone()).or_insert_with(|| {
            build_cluster(namespace, service_name, resolved_port, service, policy)
        });

        Ok(key)
    }

    pub fn into_clusters(self) -> BTreeMap<String, Cluster> {
        self.clusters
    }
}

fn build_cluster(
    namespace: &str,
    service_name: &str,
    port: u16,
    service: &ServiceObject,
    policy: ClusterPolicy,
) -> Cluster {
    let key = cluster_key(namespace, service_name, port, &policy);
    let kind = match &service.external_name {
        Some(dns_name) => ClusterKind::StrictDns { dns_name: dns_name.clone(), sni_override: None },
        None => ClusterKind::Eds {
            service_identity: format!("{namespace}/{service_name}/{port}"),
        },
    };

    Cluster {
        key,
        namespace: namespace.to_string(),
        service_name: service_name.to_string(),
        service_port: port,
        kind,
        upstream_protocol: policy.upstream_protocol,
        load_balancing: policy.load_balancing,
        health_check: policy.health_check,
        tls_validation: policy.tls_validation,
        client_certificate_secret_key: policy.client_certificate_secret_key,
        circuit_breaker: policy.circuit_breaker,
    }
}

fn cluster_key(namespace: &str, service_name: &str, port: u16, policy: &ClusterPolicy) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", policy.upstream_protocol));
    hasher.update(format!("{:?}", policy.load_balancing));
    hasher.update(format!("{:?}", policy.health_check));
    hasher.update(format!("{:?}", policy.tls_validation));
    hasher.update(format!("{:?}", policy.client_certificate_secret_key));
    hasher.update(format!("{:?}", policy.circuit_breaker));
    let policy_hash = hex::encode(hasher.finalize())[..16].to_string();

    format!("{namespace}/{service_name}/{port}/{:?}/{policy_hash}", policy.upstream_protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ObjectCache;
    use crate::k8s::types::{ObjectMeta, ServicePort, WatchedObject};
    use chrono::Utc;

    fn service_index_with(name: &str, port: u16) -> ServiceIndex {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: ObjectMeta {
                namespace: "default".into(),
                name: name.into(),
                creation_timestamp: Utc::now(),
                generation: 1,
                annotations: Default::default(),
            },
            ports: vec![ServicePort { name: None, port, target_port: None, app_protocol: None }],
            external_name: None,
        }));
        ServiceIndex::build(&cache.snapshot())
    }

    #[test]
    fn same_service_port_and_policy_deduplicates_to_one_cluster() {
        let index = service_index_with("svc1", 80);
        let mut builder = ClusterBuilder::new(&index);
        let a = builder.resolve("default", "svc1", 80, ClusterPolicy::default()).unwrap();
        let b = builder.resolve("default", "svc1", 80, ClusterPolicy::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(builder.into_clusters().len(), 1);
    }

    #[test]
    fn different_upstream_policy_yields_distinct_clusters_sharing_eds_identity() {
        let index = service_index_with("svc1", 80);
        let mut builder = ClusterBuilder::new(&index);
        let a = builder
            .resolve(
                "default",
                "svc1",
                80,
                ClusterPolicy { upstream_protocol: UpstreamProtocol::H2, ..Default::default() },
            )
            .unwrap();
        let b = builder.resolve("default", "svc1", 80, ClusterPolicy::default()).unwrap();
        assert_ne!(a, b);

        let clusters = builder.into_clusters();
        let ClusterKind::Eds { service_identity: id_a } = &clusters[&a].kind else { panic!() };
        let ClusterKind::Eds { service_identity: id_b } = &clusters[&b].kind else { panic!() };
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn missing_port_is_rejected() {
        let index = service_index_with("svc1", 80);
        let mut builder = ClusterBuilder::new(&index);
        let result = builder.resolve("default", "svc1", 81, ClusterPolicy::default());
        assert_eq!(result.unwrap_err(), StatusReason::MissingService);
    }
}
