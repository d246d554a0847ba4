//! # Cluster Translator (CDS)
//!
//! One envoy-types `Cluster` per [`crate::dag::model::Cluster`]. EDS
//! clusters point at `service_identity` as their `ClusterLoadAssignment`
//! name so an independently-running [`crate::endpoint`] translator can
//! publish matching assignments without the cluster translator ever
//! touching an `EndpointSlice`. Grounded on the teacher's
//! `xds::cluster::ClusterConfig::to_envoy_cluster`.

use envoy_types::pb::envoy::config::cluster::v3::cluster::{
    CircuitBreakers as EnvoyCircuitBreakers, ClusterDiscoveryType, DiscoveryType, LbPolicy,
};
use envoy_types::pb::envoy::config::cluster::v3::Cluster as EnvoyCluster;
use envoy_types::pb::envoy::config::core::v3::health_check::{HealthChecker, HttpHealthCheck};
use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, Address, HealthCheck as EnvoyHealthCheck, RoutingPriority, SocketAddress,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint::HostIdentifier, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
    common_tls_context::ValidationContextType, CertificateValidationContext, CombinedCertificateValidationContext,
    CommonTlsContext, UpstreamTlsContext,
};
use envoy_types::pb::google::protobuf::{Duration as PbDuration, UInt32Value};
use prost::Message;

use crate::dag::model::{Cluster, ClusterKind, CircuitBreakerSpec, Dag, HealthCheckSpec, LoadBalancingPolicy, UpstreamTlsValidation};

use super::{BuiltResource, CLUSTER_TYPE_URL};

pub fn build_clusters(dag: &Dag) -> Vec<BuiltResource> {
    dag.clusters.values().map(to_built_resource).collect()
}

fn to_built_resource(cluster: &Cluster) -> BuiltResource {
    let envoy_cluster = to_envoy_cluster(cluster);
    BuiltResource {
        name: cluster.key.clone(),
        resource: envoy_types::pb::google::protobuf::Any {
            type_url: CLUSTER_TYPE_URL.to_string(),
            value: envoy_cluster.encode_to_vec(),
        },
    }
}

fn to_envoy_cluster(cluster: &Cluster) -> EnvoyCluster {
    let (cluster_discovery_type, load_assignment) = match &cluster.kind {
        ClusterKind::Eds { service_identity } => (
            Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32)),
            Some(ClusterLoadAssignment { cluster_name: service_identity.clone(), ..Default::default() }),
        ),
        ClusterKind::StrictDns { dns_name, .. } => {
            let socket_address = SocketAddress {
                address: dns_name.clone(),
                port_specifier: Some(
                    envoy_types::pb::envoy::config::core::v3::socket_address::PortSpecifier::PortValue(
                        cluster.service_port as u32,
                    ),
                ),
                ..Default::default()
            };
            let endpoint = Endpoint {
                address: Some(Address { address: Some(AddressType::SocketAddress(socket_address)) }),
                ..Default::default()
            };
            let lb_endpoint =
                LbEndpoint { host_identifier: Some(HostIdentifier::Endpoint(endpoint)), ..Default::default() };
            (
                Some(ClusterDiscoveryType::Type(DiscoveryType::StrictDns as i32)),
                Some(ClusterLoadAssignment {
                    cluster_name: cluster.key.clone(),
                    endpoints: vec![LocalityLbEndpoints { lb_endpoints: vec![lb_endpoint], ..Default::default() }],
                    ..Default::default()
                }),
            )
        }
    };

    EnvoyCluster {
        name: cluster.key.clone(),
        connect_timeout: Some(PbDuration { seconds: 5, nanos: 0 }),
        cluster_discovery_type,
        load_assignment,
        lb_policy: to_lb_policy(cluster.load_balancing) as i32,
        health_checks: cluster.health_check.iter().map(to_health_check).collect(),
        circuit_breakers: cluster.circuit_breaker.as_ref().map(to_circuit_breakers),
        transport_socket: transport_socket(cluster),
        ..Default::default()
    }
}

fn to_health_check(spec: &HealthCheckSpec) -> EnvoyHealthCheck {
    EnvoyHealthCheck {
        timeout: Some(PbDuration { seconds: spec.timeout_seconds as i64, nanos: 0 }),
        interval: Some(PbDuration { seconds: spec.interval_seconds as i64, nanos: 0 }),
        unhealthy_threshold: Some(UInt32Value { value: spec.unhealthy_threshold }),
        healthy_threshold: Some(UInt32Value { value: spec.healthy_threshold }),
        health_checker: Some(HealthChecker::HttpHealthCheck(HttpHealthCheck {
            path: spec.path.clone(),
            ..Default::default()
        })),
        ..Default::default()
    }
}

fn to_circuit_breakers(spec: &CircuitBreakerSpec) -> EnvoyCircuitBreakers {
    use envoy_types::pb::envoy::config::cluster::v3::cluster::circuit_breakers::Thresholds;
    EnvoyCircuitBreakers {
        thresholds: vec![Thresholds {
            priority: RoutingPriority::Default as i32,
            max_connections: Some(UInt32Value { value: spec.max_connections }),
            max_pending_requests: Some(UInt32Value { value: spec.max_pending_requests }),
            max_requests: Some(UInt32Value { value: spec.max_requests }),
            max_retries: Some(UInt32Value { value: spec.max_retries }),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Upstream TLS: SDS-indirected, mirroring the downstream transport socket
/// the listener translator builds (spec §4.3 "SDS indirection"). Only
/// emitted when the upstream protocol calls for TLS or a validation/client
/// certificate policy is attached.
fn transport_socket(
    cluster: &Cluster,
) -> Option<envoy_types::pb::envoy::config::core::v3::TransportSocket> {
    use envoy_types::pb::envoy::config::core::v3::ConfigSource;
    use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::SdsSecretConfig;

    if cluster.upstream_protocol != crate::dag::model::UpstreamProtocol::Tls
        && cluster.tls_validation.is_none()
        && cluster.client_certificate_secret_key.is_none()
    {
        return None;
    }

    let sds_config = |name: &str| SdsSecretConfig {
        name: name.to_string(),
        sds_config: Some(ConfigSource {
            config_source_specifier: Some(
                envoy_types::pb::envoy::config::core::v3::config_source::ConfigSourceSpecifier::Ads(
                    envoy_types::pb::envoy::config::core::v3::AggregatedConfigSource::default(),
                ),
            ),
            ..Default::default()
        }),
        ..Default::default()
    };

    let validation_context_type = cluster.tls_validation.as_ref().map(|validation: &UpstreamTlsValidation| {
        ValidationContextType::CombinedValidationContext(CombinedCertificateValidationContext {
            default_validation_context: Some(CertificateValidationContext {
                match_typed_subject_alt_names: validation
                    .subject_alt_names
                    .iter()
                    .map(|san| envoy_types::pb::envoy::r#type::matcher::v3::SubjectAltNameMatcher {
                        san_type: envoy_types::pb::envoy::r#type::matcher::v3::subject_alt_name_matcher::SanType::Dns as i32,
                        matcher: Some(envoy_types::pb::envoy::r#type::matcher::v3::StringMatcher {
                            match_pattern: Some(
                                envoy_types::pb::envoy::r#type::matcher::v3::string_matcher::MatchPattern::Exact(
                                    san.clone(),
                                ),
                            ),
                            ignore_case: false,
                        }),
                    })
                    .collect(),
                ..Default::default()
            }),
            validation_context_sds_secret_config: Some(sds_config(&validation.ca_secret_key)),
        })
    });

    let common_tls_context = CommonTlsContext {
        tls_certificate_sds_secret_configs: cluster
            .client_certificate_secret_key
            .iter()
            .map(|key| sds_config(key))
            .collect(),
        validation_context_type,
        ..Default::default()
    };

    let upstream_ctx = UpstreamTlsContext { common_tls_context: Some(common_tls_context), ..Default::default() };

    Some(envoy_types::pb::envoy::config::core::v3::TransportSocket {
        name: "envoy.transport_sockets.tls".to_string(),
        config_type: Some(envoy_types::pb::envoy::config::core::v3::transport_socket::ConfigType::TypedConfig(
            envoy_types::pb::google::protobuf::Any {
                type_url: "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext"
                    .to_string(),
                value: upstream_ctx.encode_to_vec(),
            },
        )),
        ..Default::default()
    })
}

fn to_lb_policy(policy: LoadBalancingPolicy) -> LbPolicy {
    match policy {
        LoadBalancingPolicy::RoundRobin => LbPolicy::RoundRobin,
        LoadBalancingPolicy::WeightedLeastRequest => LbPolicy::LeastRequest,
        LoadBalancingPolicy::Random => LbPolicy::Random,
        LoadBalancingPolicy::RingHash => LbPolicy::RingHash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::model::{ClusterKind, UpstreamProtocol};

    #[test]
    fn eds_cluster_points_load_assignment_at_service_identity() {
        let cluster = Cluster {
            key: "default/web/80/Http11/abc".into(),
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
        };
        let envoy_cluster = to_envoy_cluster(&cluster);
        assert_eq!(envoy_cluster.load_assignment.unwrap().cluster_name, "default/web/80");
    }

    fn base_cluster() -> Cluster {
        Cluster {
            key: "default/web/80/Http11/abc".into(),
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
        }
    }

    #[test]
    fn health_check_carries_http_path_and_thresholds() {
        let cluster = Cluster {
            health_check: Some(HealthCheckSpec {
                path: "/healthz".into(),
                interval_seconds: 5,
                timeout_seconds: 2,
                unhealthy_threshold: 3,
                healthy_threshold: 2,
            }),
            ..base_cluster()
        };
        let envoy_cluster = to_envoy_cluster(&cluster);
        assert_eq!(envoy_cluster.health_checks.len(), 1);
        let hc = &envoy_cluster.health_checks[0];
        assert_eq!(hc.interval, Some(PbDuration { seconds: 5, nanos: 0 }));
        match &hc.health_checker {
            Some(HealthChecker::HttpHealthCheck(http)) => assert_eq!(http.path, "/healthz"),
            other => panic!("expected HttpHealthCheck, got {other:?}"),
        }
    }

    #[test]
    fn circuit_breaker_thresholds_map_onto_default_priority() {
        let cluster = Cluster {
            circuit_breaker: Some(CircuitBreakerSpec {
                max_connections: 100,
                max_pending_requests: 50,
                max_requests: 200,
                max_retries: 3,
            }),
            ..base_cluster()
        };
        let envoy_cluster = to_envoy_cluster(&cluster);
        let thresholds = &envoy_cluster.circuit_breakers.unwrap().thresholds[0];
        assert_eq!(thresholds.max_connections, Some(UInt32Value { value: 100 }));
        assert_eq!(thresholds.priority, RoutingPriority::Default as i32);
    }

    #[test]
    fn upstream_tls_cluster_gets_transport_socket() {
        let cluster = Cluster { upstream_protocol: UpstreamProtocol::Tls, ..base_cluster() };
        let envoy_cluster = to_envoy_cluster(&cluster);
        assert!(envoy_cluster.transport_socket.is_some());
    }

    #[test]
    fn http11_cluster_with_no_tls_policy_has_no_transport_socket() {
        let envoy_cluster = to_envoy_cluster(&base_cluster());
        assert!(envoy_cluster.transport_socket.is_none());
    }
}
