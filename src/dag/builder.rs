//! # DAG Builder Orchestrator
//!
//! Runs all nine passes of spec §4.2 over one [`Snapshot`] and returns the
//! finished [`Dag`] plus one [`ObjectStatus`] per root object. This is the
//! single pure entry point the rebuild worker calls on every cache change;
//! see [`crate::cache::ObjectCache`] for the change-notification side.

use std::collections::BTreeMap;

use super::cluster_builder::ClusterBuilder;
use super::delegation::DelegationSet;
use super::gateway_api;
use super::httpproxy;
use super::ingress;
use super::model::{
    Dag, FilterChain, FilterChainKind, Listener, ListenerProtocol,
};
use super::secrets::ValidatedSecrets;
use super::service_index::ServiceIndex;
use super::status::ObjectStatus;
use crate::cache::Snapshot;
use crate::config::AppConfig;

/// Builds the full DAG for one snapshot. Pure: given the same snapshot and
/// configuration, always returns bit-for-bit the same `Dag` (spec §8
/// "Determinism").
pub fn build(snapshot: &Snapshot, config: &AppConfig) -> (Dag, Vec<ObjectStatus>) {
    let service_index = ServiceIndex::build(snapshot);
    let validated_secrets = ValidatedSecrets::build(snapshot);
    let delegation = DelegationSet::build(snapshot);
    let mut cluster_builder = ClusterBuilder::new(&service_index);

    let mut statuses = Vec::new();

    let proxy_output = httpproxy::process(
        snapshot,
        &validated_secrets,
        &delegation,
        &config.control_plane,
        &mut cluster_builder,
    );
    let mut virtual_hosts = proxy_output.virtual_hosts;
    let mut secure_virtual_hosts = proxy_output.secure_virtual_hosts;
    let mut tls_passthroughs = proxy_output.tls_passthroughs;
    statuses.extend(proxy_output.statuses);

    let ingress_statuses = ingress::process(
        snapshot,
        &validated_secrets,
        &delegation,
        &config.control_plane,
        &mut cluster_builder,
        &mut virtual_hosts,
        &mut secure_virtual_hosts,
    );
    statuses.extend(ingress_statuses);

    let gateway_output = gateway_api::process(
        snapshot,
        &validated_secrets,
        &delegation,
        &config.control_plane,
        &mut cluster_builder,
        &mut virtual_hosts,
        &mut secure_virtual_hosts,
    );
    tls_passthroughs.extend(gateway_output.tls_passthroughs);
    statuses.extend(gateway_output.statuses);

    let clusters = cluster_builder.into_clusters();

    // SDS isolation (spec §8): only secrets actually referenced by a
    // resolved vhost, client-validation context, or fallback certificate
    // enter the DAG's secret map.
    let mut referenced_secret_keys: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for svh in secure_virtual_hosts.values() {
        referenced_secret_keys.insert(svh.secret_key.clone());
        if let Some(cv) = &svh.client_validation_secret_key {
            referenced_secret_keys.insert(cv.clone());
        }
        if let Some(fallback) = &svh.fallback_secret_key {
            referenced_secret_keys.insert(fallback.clone());
        }
    }
    for cluster in clusters.values() {
        if let Some(validation) = &cluster.tls_validation {
            referenced_secret_keys.insert(validation.ca_secret_key.clone());
        }
        if let Some(client_cert) = &cluster.client_certificate_secret_key {
            referenced_secret_keys.insert(client_cert.clone());
        }
    }

    let secrets: BTreeMap<String, super::model::Secret> = validated_secrets
        .all()
        .filter(|(key, _)| referenced_secret_keys.contains(*key))
        .map(|(key, secret)| (key.clone(), secret.clone()))
        .collect();

    let insecure_listener = Some(Listener {
        name: "ingress_http".to_string(),
        address: config.listeners.bind_address.clone(),
        port: config.listeners.insecure_port as u32,
        protocol: ListenerProtocol::Http,
        filter_chains: vec![FilterChain { name: "ingress_http".to_string(), kind: FilterChainKind::Http }],
    });

    let secure_listener = if secure_virtual_hosts.is_empty() && tls_passthroughs.is_empty() {
        None
    } else {
        let mut filter_chains = Vec::new();
        for (fqdn, svh) in &secure_virtual_hosts {
            if svh.fallback_certificate {
                if let Some(fallback_secret_key) = &svh.fallback_secret_key {
                    filter_chains.push(FilterChain {
                        name: "filterchaintlsfallback".to_string(),
                        kind: FilterChainKind::HttpsFallback {
                            secret_key: fallback_secret_key.clone(),
                            fqdn: fqdn.clone(),
                        },
                    });
                }
            } else if let Some(tcp_proxy) = &svh.tcp_proxy {
                if let Some(first) = tcp_proxy.clusters.first() {
                    filter_chains.push(FilterChain {
                        name: format!("tcp/{fqdn}"),
                        kind: FilterChainKind::TcpTerminated {
                            sni: fqdn.clone(),
                            secret_key: svh.secret_key.clone(),
                            cluster_key: first.cluster_key.clone(),
                        },
                    });
                }
            } else {
                filter_chains.push(FilterChain {
                    name: format!("https/{fqdn}"),
                    kind: FilterChainKind::HttpsTerminated {
                        sni: fqdn.clone(),
                        secret_key: svh.secret_key.clone(),
                        fqdn: fqdn.clone(),
                    },
                });
            }
        }
        for (fqdn, entry) in &tls_passthroughs {
            filter_chains.push(FilterChain {
                name: format!("passthrough/{fqdn}"),
                kind: FilterChainKind::TlsPassthrough { sni: fqdn.clone(), cluster_key: entry.cluster_key.clone() },
            });
        }

        Some(Listener {
            name: "ingress_https".to_string(),
            address: config.listeners.bind_address.clone(),
            port: config.listeners.secure_port as u32,
            protocol: ListenerProtocol::Https,
            filter_chains,
        })
    };

    let dag = Dag {
        insecure_listener,
        secure_listener,
        virtual_hosts,
        secure_virtual_hosts,
        clusters,
        secrets,
        extension_services: BTreeMap::new(),
        tls_passthroughs,
    };

    (dag, statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ObjectCache;
    use crate::k8s::types::{
        HttpProxyObject, ObjectMeta, RouteActionSpec, RouteConditionsSpec, RouteServiceSpec, RouteSpec,
        SecretKind, SecretObject, ServiceObject, ServicePort, TlsSpec, VirtualHostSpec, WatchedObject,
    };
    use crate::config::settings::NamespacedName;
    use chrono::Utc;

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            namespace: "default".into(),
            name: name.into(),
            creation_timestamp: Utc::now(),
            generation: 1,
            annotations: Default::default(),
        }
    }

    #[test]
    fn simple_proxy_without_tls_produces_only_insecure_listener() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: meta("web"),
            ports: vec![ServicePort { name: None, port: 80, target_port: None, app_protocol: None }],
            external_name: None,
        }));
        cache.upsert(WatchedObject::HttpProxy(HttpProxyObject {
            meta: meta("proxy"),
            virtualhost: Some(VirtualHostSpec {
                fqdn: "example.com".into(),
                tls: None,
                cors_policy: None,
                rate_limit_policy: None,
                authorization: None,
            }),
            routes: vec![RouteSpec {
                conditions: RouteConditionsSpec::default(),
                action: RouteActionSpec::Services(vec![RouteServiceSpec {
                    name: "web".into(),
                    port: 80,
                    weight: 1,
                    upstream_protocol: None,
                    validation_ca_secret: None,
                    validation_subject_name: None,
                    load_balancing_policy: None,
                    health_check: None,
                    circuit_breaker: None,
                }]),
                permit_insecure: false,
                enable_websockets: false,
                timeout_policy: None,
                retry_policy: None,
                rate_limit_policy: None,
                cors_policy: None,
                request_headers_policy: None,
                response_headers_policy: None,
                host_rewrite: None,
                mirror_policy: None,
                session_affinity: None,
                ip_allow_deny: Vec::new(),
                jwt_verification_policy: None,
                authorization: None,
                internal_redirect_policy: None,
            }],
            includes: Vec::new(),
            tcpproxy: None,
        }));

        let snapshot = cache.snapshot();
        let config = AppConfig::default();
        let (dag, statuses) = build(&snapshot, &config);

        assert!(statuses.iter().all(ObjectStatus::is_valid));
        assert!(dag.insecure_listener.is_some());
        assert!(dag.secure_listener.is_none());
        assert_eq!(dag.virtual_hosts["example.com"].routes.len(), 1);
        assert_eq!(dag.clusters.len(), 1);
    }

    #[test]
    fn https_fallback_filter_chain_uses_configured_fallback_cert_not_vhost_sni_cert() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: meta("web"),
            ports: vec![ServicePort { name: None, port: 80, target_port: None, app_protocol: None }],
            external_name: None,
        }));
        cache.upsert(WatchedObject::Secret(SecretObject {
            meta: meta("sni-cert"),
            kind: SecretKind::Tls,
            tls_crt: Some(b"sni-cert".to_vec()),
            tls_key: Some(b"sni-key".to_vec()),
            ca_bundle: None,
        }));
        cache.upsert(WatchedObject::Secret(SecretObject {
            meta: meta("fallback-cert"),
            kind: SecretKind::Tls,
            tls_crt: Some(b"fallback-cert".to_vec()),
            tls_key: Some(b"fallback-key".to_vec()),
            ca_bundle: None,
        }));
        cache.upsert(WatchedObject::HttpProxy(HttpProxyObject {
            meta: meta("proxy"),
            virtualhost: Some(VirtualHostSpec {
                fqdn: "example.com".into(),
                tls: Some(TlsSpec {
                    secret_name: Some("sni-cert".into()),
                    secret_namespace: None,
                    minimum_tls_version: None,
                    maximum_tls_version: None,
                    passthrough: false,
                    client_validation_ca_secret: None,
                    enable_fallback_certificate: true,
                }),
                cors_policy: None,
                rate_limit_policy: None,
                authorization: None,
            }),
            routes: vec![RouteSpec {
                conditions: RouteConditionsSpec::default(),
                action: RouteActionSpec::Services(vec![RouteServiceSpec {
                    name: "web".into(),
                    port: 80,
                    weight: 1,
                    upstream_protocol: None,
                    validation_ca_secret: None,
                    validation_subject_name: None,
                    load_balancing_policy: None,
                    health_check: None,
                    circuit_breaker: None,
                }]),
                permit_insecure: false,
                enable_websockets: false,
                timeout_policy: None,
                retry_policy: None,
                rate_limit_policy: None,
                cors_policy: None,
                request_headers_policy: None,
                response_headers_policy: None,
                host_rewrite: None,
                mirror_policy: None,
                session_affinity: None,
                ip_allow_deny: Vec::new(),
                jwt_verification_policy: None,
                authorization: None,
                internal_redirect_policy: None,
            }],
            includes: Vec::new(),
            tcpproxy: None,
        }));

        let snapshot = cache.snapshot();
        let mut config = AppConfig::default();
        config.control_plane.fallback_certificate =
            Some(NamespacedName { namespace: "default".into(), name: "fallback-cert".into() });
        let (dag, statuses) = build(&snapshot, &config);

        assert!(statuses.iter().all(ObjectStatus::is_valid));
        let svh = &dag.secure_virtual_hosts["example.com"];
        assert!(svh.fallback_certificate);
        let fallback_key = svh.fallback_secret_key.as_ref().expect("fallback secret key resolved");
        assert_ne!(fallback_key, &svh.secret_key, "fallback chain must not reuse the vhost's own SNI cert");
        assert!(dag.secrets.contains_key(fallback_key), "fallback secret must survive SDS isolation");

        let secure_listener = dag.secure_listener.as_ref().expect("secure listener built");
        let fallback_chain = secure_listener
            .filter_chains
            .iter()
            .find(|fc| matches!(&fc.kind, FilterChainKind::HttpsFallback { .. }))
            .expect("fallback filter chain present");
        match &fallback_chain.kind {
            FilterChainKind::HttpsFallback { secret_key, .. } => assert_eq!(secret_key, fallback_key),
            _ => unreachable!(),
        }
    }

    #[test]
    fn session_affinity_overrides_explicit_load_balancing_policy_on_backing_cluster() {
        use crate::k8s::types::{CircuitBreakerPolicySpec, HealthCheckPolicySpec, SessionAffinitySpec};

        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: meta("web"),
            ports: vec![ServicePort { name: None, port: 80, target_port: None, app_protocol: None }],
            external_name: None,
        }));
        cache.upsert(WatchedObject::HttpProxy(HttpProxyObject {
            meta: meta("proxy"),
            virtualhost: Some(VirtualHostSpec {
                fqdn: "example.com".into(),
                tls: None,
                cors_policy: None,
                rate_limit_policy: None,
                authorization: None,
            }),
            routes: vec![RouteSpec {
                conditions: RouteConditionsSpec::default(),
                action: RouteActionSpec::Services(vec![RouteServiceSpec {
                    name: "web".into(),
                    port: 80,
                    weight: 1,
                    upstream_protocol: None,
                    validation_ca_secret: None,
                    validation_subject_name: None,
                    load_balancing_policy: Some("WeightedLeastRequest".into()),
                    health_check: Some(HealthCheckPolicySpec {
                        path: "/healthz".into(),
                        interval_seconds: 5,
                        timeout_seconds: 1,
                        unhealthy_threshold: 3,
                        healthy_threshold: 2,
                    }),
                    circuit_breaker: Some(CircuitBreakerPolicySpec {
                        max_connections: 100,
                        max_pending_requests: 50,
                        max_requests: 200,
                        max_retries: 3,
                    }),
                }]),
                permit_insecure: false,
                enable_websockets: false,
                timeout_policy: None,
                retry_policy: None,
                rate_limit_policy: None,
                cors_policy: None,
                request_headers_policy: None,
                response_headers_policy: None,
                host_rewrite: None,
                mirror_policy: None,
                session_affinity: Some(SessionAffinitySpec { cookie_name: "sticky".into(), ttl_seconds: None }),
                ip_allow_deny: Vec::new(),
                jwt_verification_policy: None,
                authorization: None,
                internal_redirect_policy: None,
            }],
            includes: Vec::new(),
            tcpproxy: None,
        }));

        let snapshot = cache.snapshot();
        let config = AppConfig::default();
        let (dag, statuses) = build(&snapshot, &config);

        assert!(statuses.iter().all(ObjectStatus::is_valid));
        assert_eq!(dag.clusters.len(), 1);
        let cluster = dag.clusters.values().next().expect("one cluster");
        assert_eq!(cluster.load_balancing, crate::dag::model::LoadBalancingPolicy::RingHash);
        let health_check = cluster.health_check.as_ref().expect("health check threaded through");
        assert_eq!(health_check.path, "/healthz");
        let circuit_breaker = cluster.circuit_breaker.as_ref().expect("circuit breaker threaded through");
        assert_eq!(circuit_breaker.max_connections, 100);
    }
}
