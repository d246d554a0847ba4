//! # Endpoint Translator (EDS)
//!
//! Unlike LDS/RDS/CDS/SDS, endpoint assignments are not driven by the DAG:
//! an EndpointSlice change must update a `ClusterLoadAssignment` without
//! waiting for (or triggering) a DAG rebuild, since endpoint churn is far
//! more frequent than route/policy churn (spec §4.3 "Endpoint translator
//! specifics" — "runs independently of the nine-pass builder"). This module
//! reads `EndpointSlice` objects straight out of a [`crate::cache::Snapshot`]
//! and aggregates them by `service_identity` (`{namespace}/{service}/{port}`,
//! spec §3), the same string every upstream-policy variant of a Cluster for
//! that Service shares (see [`crate::dag::cluster_builder`]).
//!
//! Grounded on the teacher's `xds::resources::endpoints_from_config`
//! `ClusterLoadAssignment` construction, generalized from its static config
//! rows to live `EndpointSlice` aggregation.

use std::collections::BTreeMap;

use envoy_types::pb::envoy::config::core::v3::{address::Address as AddressType, Address, SocketAddress};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint::HostIdentifier, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use prost::Message;

use crate::cache::Snapshot;
use crate::dag::model::{ClusterKind, Dag};
use crate::k8s::types::{ObjectKind, WatchedObject};
use crate::translate::{BuiltResource, ENDPOINT_TYPE_URL};

/// Builds one `ClusterLoadAssignment` per distinct EDS `service_identity`
/// referenced by the current DAG. A `service_identity` with no matching
/// EndpointSlice yet (the Service exists but has no ready backends) still
/// gets an assignment with zero endpoints, which is a valid (if inert)
/// response, not an omission (spec §4.3 "empty endpoint set").
pub fn build_endpoints(dag: &Dag, snapshot: &Snapshot) -> Vec<BuiltResource> {
    let service_identities: std::collections::BTreeSet<&str> = dag
        .clusters
        .values()
        .filter_map(|cluster| match &cluster.kind {
            ClusterKind::Eds { service_identity } => Some(service_identity.as_str()),
            ClusterKind::StrictDns { .. } => None,
        })
        .collect();

    if service_identities.is_empty() {
        return Vec::new();
    }

    let mut addresses_by_identity: BTreeMap<&str, Vec<(String, bool)>> = BTreeMap::new();
    for (_, object) in snapshot.of_kind(ObjectKind::EndpointSlice) {
        let WatchedObject::EndpointSlice(slice) = object else { continue };
        let identity = format!("{}/{}/{}", slice.meta.namespace, slice.service_name, slice.port);
        if let Some(&matched) = service_identities.iter().find(|id| **id == identity.as_str()) {
            let entry = addresses_by_identity.entry(matched).or_default();
            for addr in &slice.addresses {
                entry.push((addr.ip.clone(), addr.ready));
            }
        }
    }

    service_identities
        .into_iter()
        .map(|identity| {
            let port: u16 = identity.rsplit('/').next().and_then(|p| p.parse().ok()).unwrap_or(0);
            let addresses = addresses_by_identity.get(identity).cloned().unwrap_or_default();
            built(identity, to_cluster_load_assignment(identity, port, &addresses))
        })
        .collect()
}

fn built(name: &str, assignment: ClusterLoadAssignment) -> BuiltResource {
    BuiltResource {
        name: name.to_string(),
        resource: envoy_types::pb::google::protobuf::Any {
            type_url: ENDPOINT_TYPE_URL.to_string(),
            value: assignment.encode_to_vec(),
        },
    }
}

/// Not-ready addresses are excluded by default (spec §4.3 "only Ready
/// addresses are eligible"); there is currently no opt-in to include
/// terminating/not-ready endpoints.
fn to_cluster_load_assignment(identity: &str, port: u16, addresses: &[(String, bool)]) -> ClusterLoadAssignment {
    let lb_endpoints = addresses
        .iter()
        .filter(|(_, ready)| *ready)
        .map(|(ip, _)| {
            let socket_address = SocketAddress {
                address: ip.clone(),
                port_specifier: Some(
                    envoy_types::pb::envoy::config::core::v3::socket_address::PortSpecifier::PortValue(
                        port as u32,
                    ),
                ),
                ..Default::default()
            };
            let endpoint = Endpoint {
                address: Some(Address { address: Some(AddressType::SocketAddress(socket_address)) }),
                ..Default::default()
            };
            LbEndpoint { host_identifier: Some(HostIdentifier::Endpoint(endpoint)), ..Default::default() }
        })
        .collect();

    ClusterLoadAssignment {
        cluster_name: identity.to_string(),
        endpoints: vec![LocalityLbEndpoints { lb_endpoints, ..Default::default() }],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ObjectCache;
    use crate::dag::model::{Cluster, LoadBalancingPolicy, UpstreamProtocol};
    use crate::k8s::types::{EndpointAddress, EndpointSliceObject, ObjectMeta};
    use chrono::Utc;

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta { namespace: "default".into(), name: name.into(), creation_timestamp: Utc::now(), generation: 1, annotations: Default::default() }
    }

    fn dag_with_eds_cluster() -> Dag {
        let mut dag = Dag::default();
        dag.clusters.insert(
            "default/web/80/Http11/x".into(),
            Cluster {
                key: "default/web/80/Http11/x".into(),
                namespace: "default".into(),
                service_name: "web".into(),
                service_port: 80,
                kind: ClusterKind::Eds { service_identity: "default/web/80".into() },
                upstream_protocol: UpstreamProtocol::Http11,
                load_balancing: LoadBalancingPolicy::RoundRobin,
                health_check: None,
                tls_validation: None,
                client_certificate_secret_key: None,
                circuit_breaker: None,
            },
        );
        dag
    }

    #[test]
    fn ready_addresses_are_included_and_not_ready_excluded() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::EndpointSlice(EndpointSliceObject {
            meta: meta("web-abc"),
            service_name: "web".into(),
            port_name: None,
            port: 80,
            addresses: vec![
                EndpointAddress { ip: "10.0.0.1".into(), ready: true },
                EndpointAddress { ip: "10.0.0.2".into(), ready: false },
            ],
        }));

        let built = build_endpoints(&dag_with_eds_cluster(), &cache.snapshot());
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].name, "default/web/80");

        let assignment = ClusterLoadAssignment::decode(&built[0].resource.value[..]).unwrap();
        assert_eq!(assignment.endpoints[0].lb_endpoints.len(), 1);
    }

    #[test]
    fn missing_endpoint_slice_still_produces_empty_assignment() {
        let (cache, _rx) = ObjectCache::new();
        let built = build_endpoints(&dag_with_eds_cluster(), &cache.snapshot());
        assert_eq!(built.len(), 1);
        let assignment = ClusterLoadAssignment::decode(&built[0].resource.value[..]).unwrap();
        assert!(assignment.endpoints[0].lb_endpoints.is_empty());
    }
}
