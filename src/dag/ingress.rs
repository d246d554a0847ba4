//! # Ingress Pass
//!
//! A simpler sibling to [`crate::dag::httpproxy`]: classic `networking.k8s.io/v1`
//! Ingress objects carry no policy surface beyond host/path routing, a
//! default backend, and per-host TLS (spec §3 "Ingress"). Every Ingress is
//! independently a root — there is no include tree and no FQDN-conflict
//! resolution across Ingress objects, since distinct Ingress objects
//! legitimately contribute rules to the same host.

use std::collections::BTreeMap;

use super::cluster_builder::{ClusterBuilder, ClusterPolicy};
use super::delegation::DelegationSet;
use super::model::{
    PathMatch, Route, RouteAction, RouteConditions, SecureVirtualHost, TlsVersion, VirtualHost,
    WeightedClusterRef,
};
use super::secrets::ValidatedSecrets;
use super::sort::sort_routes;
use super::status::{ObjectStatus, StatusReason};
use crate::cache::Snapshot;
use crate::config::ControlPlaneConfig;
use crate::k8s::types::{IngressObject, IngressPathType, ObjectKind, WatchedObject};

pub struct IngressPassOutput {
    pub virtual_hosts: BTreeMap<String, VirtualHost>,
    pub secure_virtual_hosts: BTreeMap<String, SecureVirtualHost>,
    pub statuses: Vec<ObjectStatus>,
}

const WILDCARD_HOST: &str = "*";

fn route_for_path(
    ingress: &IngressObject,
    namespace: &str,
    path: &crate::k8s::types::IngressPathRule,
    clusters: &mut ClusterBuilder,
) -> Result<Route, StatusReason> {
    let path_literal = path.path.clone().unwrap_or_else(|| "/".to_string());
    let path_match = match path.path_type {
        IngressPathType::Exact => PathMatch::Exact(path_literal),
        IngressPathType::Prefix | IngressPathType::ImplementationSpecific => {
            PathMatch::Prefix(path_literal)
        }
    };

    let key = clusters.resolve(
        namespace,
        &path.backend.service_name,
        path.backend.service_port,
        ClusterPolicy::default(),
    )?;

    let _ = ingress;
    Ok(Route {
        conditions: RouteConditions { path: path_match, headers: Vec::new() },
        action: RouteAction::Cluster(vec![WeightedClusterRef { cluster_key: key, weight: 1 }]),
        force_ssl_redirect_on_insecure_plane: false,
        enable_websockets: false,
        request_headers: None,
        response_headers: None,
        retry: None,
        timeout: None,
        cors: None,
        rate_limit: None,
        ip_allow_deny: Vec::new(),
        jwt_verification: None,
        ext_authz: None,
        mirror: None,
        host_rewrite: None,
        session_affinity: None,
        internal_redirect: None,
    })
}

pub fn process(
    snapshot: &Snapshot,
    secrets: &ValidatedSecrets,
    delegation: &DelegationSet,
    control_plane: &ControlPlaneConfig,
    clusters: &mut ClusterBuilder,
    virtual_hosts: &mut BTreeMap<String, VirtualHost>,
    secure_virtual_hosts: &mut BTreeMap<String, SecureVirtualHost>,
) -> Vec<ObjectStatus> {
    let mut statuses = Vec::new();

    for (key, object) in snapshot.of_kind(ObjectKind::Ingress) {
        let WatchedObject::Ingress(ingress) = object else { continue };
        let namespace = key.nsname.namespace.clone();

        let tls_secret_by_host = resolve_tls(ingress, &namespace, secrets, delegation, control_plane);

        let mut failed = None;
        let mut by_host: BTreeMap<String, Vec<Route>> = BTreeMap::new();

        for rule in &ingress.rules {
            let host = rule.host.clone().unwrap_or_else(|| WILDCARD_HOST.to_string());
            for path in &rule.paths {
                match route_for_path(ingress, &namespace, path, clusters) {
                    Ok(route) => by_host.entry(host.clone()).or_default().push(route),
                    Err(reason) => {
                        failed = Some(reason);
                        break;
                    }
                }
            }
            if failed.is_some() {
                break;
            }
        }

        if let Some(default_backend) = &ingress.default_backend {
            if failed.is_none() {
                match clusters.resolve(
                    &namespace,
                    &default_backend.service_name,
                    default_backend.service_port,
                    ClusterPolicy::default(),
                ) {
                    Ok(cluster_key) => {
                        by_host.entry(WILDCARD_HOST.to_string()).or_default().push(Route {
                            conditions: RouteConditions {
                                path: PathMatch::Prefix("/".to_string()),
                                headers: Vec::new(),
                            },
                            action: RouteAction::Cluster(vec![WeightedClusterRef {
                                cluster_key,
                                weight: 1,
                            }]),
                            force_ssl_redirect_on_insecure_plane: false,
                            enable_websockets: false,
                            request_headers: None,
                            response_headers: None,
                            retry: None,
                            timeout: None,
                            cors: None,
                            rate_limit: None,
                            ip_allow_deny: Vec::new(),
                            jwt_verification: None,
                            ext_authz: None,
                            mirror: None,
                            host_rewrite: None,
                            session_affinity: None,
                            internal_redirect: None,
                        });
                    }
                    Err(reason) => failed = Some(reason),
                }
            }
        }

        if let Some(reason) = failed {
            statuses.push(ObjectStatus::invalid(
                key.clone(),
                ingress.meta.generation,
                reason,
                "an Ingress backend reference could not be resolved",
            ));
            continue;
        }

        for (host, mut routes) in by_host {
            sort_routes(&mut routes);

            virtual_hosts
                .entry(host.clone())
                .and_modify(|vh| vh.routes.extend(routes.clone()))
                .or_insert_with(|| VirtualHost { fqdn: host.clone(), routes: routes.clone(), cors: None, rate_limit: None });

            if let Some(secret_key) = tls_secret_by_host.get(&host).or_else(|| tls_secret_by_host.get(WILDCARD_HOST))
            {
                secure_virtual_hosts
                    .entry(host.clone())
                    .and_modify(|svh| svh.routes.extend(routes.clone()))
                    .or_insert_with(|| SecureVirtualHost {
                        fqdn: host.clone(),
                        routes: routes.clone(),
                        secret_key: secret_key.clone(),
                        minimum_tls_version: control_plane_floor(control_plane.tls_min_version),
                        maximum_tls_version: control_plane_floor(control_plane.tls_max_version),
                        cipher_suites: control_plane.cipher_suites.clone(),
                        client_validation_secret_key: None,
                        jwt_providers: Vec::new(),
                        ext_authz: None,
                        rate_limit: None,
                        cors: None,
                        fallback_certificate: false,
                        fallback_secret_key: None,
                        tcp_proxy: None,
                    });
            }
        }

        statuses.push(ObjectStatus::valid(key.clone(), ingress.meta.generation));
    }

    statuses
}

fn control_plane_floor(floor: crate::config::TlsVersionFloor) -> TlsVersion {
    match floor {
        crate::config::TlsVersionFloor::V1_2 => TlsVersion::V1_2,
        crate::config::TlsVersionFloor::V1_3 => TlsVersion::V1_3,
    }
}

/// Resolves one secret per TLS host entry. A host not covered by any
/// `spec.tls` entry with a resolvable secret simply gets no secure vhost.
fn resolve_tls(
    ingress: &IngressObject,
    namespace: &str,
    secrets: &ValidatedSecrets,
    delegation: &DelegationSet,
    _control_plane: &ControlPlaneConfig,
) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();

    for tls in &ingress.tls {
        let (secret_ns, secret_name) = match ingress.cross_namespace_secret_annotation.as_deref() {
            Some(reference) if reference.contains('/') => {
                let mut parts = reference.splitn(2, '/');
                (parts.next().unwrap().to_string(), parts.next().unwrap().to_string())
            }
            _ => (namespace.to_string(), tls.secret_name.clone()),
        };

        let permitted = secret_ns == namespace
            || ingress.cross_namespace_secret_annotation.is_some()
            || delegation.is_permitted(&secret_ns, &secret_name, namespace);
        if !permitted {
            continue;
        }

        let Some(entry) = secrets.get(&secret_ns, &secret_name) else { continue };

        let hosts = if tls.hosts.is_empty() { vec![WILDCARD_HOST.to_string()] } else { tls.hosts.clone() };
        for host in hosts {
            result.insert(host, entry.key.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ObjectCache;
    use crate::k8s::types::{
        IngressBackend, IngressPathRule, IngressRule, ObjectMeta, ServiceObject, ServicePort,
    };
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
    fn simple_host_and_path_rule_produces_one_route() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: meta("web"),
            ports: vec![ServicePort { name: None, port: 80, target_port: None, app_protocol: None }],
            external_name: None,
        }));
        cache.upsert(WatchedObject::Ingress(IngressObject {
            meta: meta("example"),
            rules: vec![IngressRule {
                host: Some("example.com".into()),
                paths: vec![IngressPathRule {
                    path: Some("/".into()),
                    path_type: IngressPathType::Prefix,
                    backend: IngressBackend { service_name: "web".into(), service_port: 80 },
                }],
            }],
            tls: Vec::new(),
            default_backend: None,
            cross_namespace_secret_annotation: None,
        }));

        let snapshot = cache.snapshot();
        let service_index = super::super::service_index::ServiceIndex::build(&snapshot);
        let mut clusters = ClusterBuilder::new(&service_index);
        let secrets = ValidatedSecrets::build(&snapshot);
        let delegation = DelegationSet::build(&snapshot);
        let control_plane = ControlPlaneConfig::default();

        let mut virtual_hosts = BTreeMap::new();
        let mut secure_virtual_hosts = BTreeMap::new();
        let statuses = process(
            &snapshot,
            &secrets,
            &delegation,
            &control_plane,
            &mut clusters,
            &mut virtual_hosts,
            &mut secure_virtual_hosts,
        );

        assert!(statuses.iter().all(ObjectStatus::is_valid));
        assert_eq!(virtual_hosts["example.com"].routes.len(), 1);
    }
}
