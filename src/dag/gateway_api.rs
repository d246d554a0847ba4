//! # Gateway API Pass
//!
//! Treats `Gateway`+its `HTTPRoute`/`TLSRoute`/`TCPRoute` set as an alternate
//! root kind alongside [`crate::dag::httpproxy`] and [`crate::dag::ingress`]
//! (spec §4.2 pass 4), subject to the same FQDN-uniqueness and
//! TLS-delegation rules HTTPProxy uses.
//!
//! The slimmed CRD shapes in `k8s/gateway_api.rs` carry no `parentRefs`
//! equivalent linking a route back to a `Gateway` listener, so there is no
//! attachment data to resolve a route against a specific listener's
//! hostname/TLS config. Each `HTTPRoute`/`TLSRoute` is instead treated as
//! directly authoritative over its own `hostnames`/`sni_names`: it is a root
//! in its own right, FQDN-conflict-checked against both its Gateway API
//! siblings and whatever HTTPProxy (which runs first, see `builder::build`)
//! already claimed, rather than silently merged the way `ingress::process`
//! merges same-host Ingress rules. `Gateway` objects themselves carry no
//! routing surface in this model; they only gate acceptance through
//! `GatewayClass`.
//!
//! `TCPRoute` has no hostname or SNI to key a filter chain on — every entry
//! on the secure listener here is SNI-matched — so it cannot attach
//! anywhere. Its backend is still resolved through `ClusterBuilder` (so the
//! Service it names participates in CDS/EDS like any other backend), but it
//! contributes no listener entry; see `DESIGN.md`.

use std::collections::{BTreeMap, BTreeSet};

use super::cluster_builder::{ClusterBuilder, ClusterPolicy};
use super::delegation::DelegationSet;
use super::model::{
    PathMatch, Route, RouteAction, RouteConditions, SecureVirtualHost, TlsPassthroughEntry, VirtualHost,
    WeightedClusterRef,
};
use super::secrets::ValidatedSecrets;
use super::sort::sort_routes;
use super::status::{ObjectStatus, StatusReason};
use crate::cache::Snapshot;
use crate::config::ControlPlaneConfig;
use crate::k8s::types::{
    GatewayClassObject, HttpRouteObject, NsName, ObjectKey, ObjectKind, TlsRouteObject, WatchedObject,
};

pub struct GatewayApiPassOutput {
    pub tls_passthroughs: BTreeMap<String, TlsPassthroughEntry>,
    pub statuses: Vec<ObjectStatus>,
}

type RouteKey = (String, String);

fn route_for_rule(
    rule: &crate::k8s::types::HttpRouteRule,
    namespace: &str,
    clusters: &mut ClusterBuilder,
) -> Result<Route, StatusReason> {
    let path_match = if let Some(exact) = &rule.path_exact {
        PathMatch::Exact(exact.clone())
    } else {
        PathMatch::Prefix(rule.path_prefix.clone().unwrap_or_else(|| "/".to_string()))
    };

    let mut refs = Vec::with_capacity(rule.backend_refs.len());
    for backend in &rule.backend_refs {
        let key = clusters.resolve(namespace, &backend.service_name, backend.service_port, ClusterPolicy::default())?;
        refs.push(WeightedClusterRef { cluster_key: key, weight: 1 });
    }

    Ok(Route {
        conditions: RouteConditions { path: path_match, headers: Vec::new() },
        action: RouteAction::Cluster(refs),
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

/// Gateway acceptance: valid iff `gateway_class_name` resolves to a known
/// `GatewayClass`. This gates status only — listeners carry no routing
/// surface of their own in this model, so acceptance does not otherwise
/// affect the DAG.
fn process_gateways(snapshot: &Snapshot, statuses: &mut Vec<ObjectStatus>) {
    let classes: BTreeSet<String> = snapshot
        .of_kind(ObjectKind::GatewayClass)
        .filter_map(|(_, object)| match object {
            WatchedObject::GatewayClass(GatewayClassObject { meta, .. }) => Some(meta.name.clone()),
            _ => None,
        })
        .collect();

    for (key, object) in snapshot.of_kind(ObjectKind::Gateway) {
        let WatchedObject::Gateway(gateway) = object else { continue };
        let object_key = ObjectKey::new(ObjectKind::Gateway, NsName::new(key.nsname.namespace.clone(), key.nsname.name.clone()));
        if classes.contains(&gateway.gateway_class_name) {
            statuses.push(ObjectStatus::valid(object_key, gateway.meta.generation));
        } else {
            statuses.push(ObjectStatus::invalid(
                object_key,
                gateway.meta.generation,
                StatusReason::InvalidPolicy,
                format!("gatewayClassName {} has no matching GatewayClass", gateway.gateway_class_name),
            ));
        }
    }
}

fn process_http_routes(
    snapshot: &Snapshot,
    clusters: &mut ClusterBuilder,
    virtual_hosts: &mut BTreeMap<String, VirtualHost>,
    secure_virtual_hosts: &BTreeMap<String, SecureVirtualHost>,
    statuses: &mut Vec<ObjectStatus>,
) {
    let mut routes: BTreeMap<RouteKey, &HttpRouteObject> = BTreeMap::new();
    for (key, object) in snapshot.of_kind(ObjectKind::HttpRoute) {
        if let WatchedObject::HttpRoute(route) = object {
            routes.insert((key.nsname.namespace.clone(), key.nsname.name.clone()), route);
        }
    }

    // Group candidate routes by FQDN, same oldest-creation-wins arbitration
    // httpproxy.rs uses, so Gateway API roots compete amongst themselves
    // exactly like HTTPProxy roots do.
    let mut by_fqdn: BTreeMap<String, Vec<RouteKey>> = BTreeMap::new();
    for (key, route) in &routes {
        for hostname in &route.hostnames {
            by_fqdn.entry(hostname.clone()).or_default().push(key.clone());
        }
    }

    let mut winners: BTreeSet<RouteKey> = BTreeSet::new();
    for (fqdn, mut candidates) in by_fqdn {
        candidates.sort_by(|a, b| {
            routes[a].meta.creation_timestamp.cmp(&routes[b].meta.creation_timestamp).then_with(|| a.cmp(b))
        });
        let winner = candidates[0].clone();

        if virtual_hosts.contains_key(&fqdn) || secure_virtual_hosts.contains_key(&fqdn) {
            // HTTPProxy already claimed this FQDN; the Gateway API pass runs
            // after it and defers rather than overwriting an already-routed
            // vhost.
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::HttpRoute, NsName::new(winner.0.clone(), winner.1.clone())),
                routes[&winner].meta.generation,
                StatusReason::FqdnConflict,
                format!("fqdn {fqdn} already claimed by an HTTPProxy or Ingress"),
            ));
            for loser in &candidates[1..] {
                statuses.push(ObjectStatus::invalid(
                    ObjectKey::new(ObjectKind::HttpRoute, NsName::new(loser.0.clone(), loser.1.clone())),
                    routes[loser].meta.generation,
                    StatusReason::FqdnConflict,
                    format!("fqdn {fqdn} already claimed by an HTTPProxy or Ingress"),
                ));
            }
            continue;
        }

        for loser in &candidates[1..] {
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::HttpRoute, NsName::new(loser.0.clone(), loser.1.clone())),
                routes[loser].meta.generation,
                StatusReason::FqdnConflict,
                format!("fqdn {fqdn} already claimed by {}/{}", winner.0, winner.1),
            ));
        }
        winners.insert(winner);
    }

    for key in &winners {
        let route = routes[key];
        let namespace = &key.0;

        let mut resolution_failed = None;
        let mut rule_routes = Vec::with_capacity(route.rules.len());
        for rule in &route.rules {
            match route_for_rule(rule, namespace, clusters) {
                Ok(r) => rule_routes.push(r),
                Err(reason) => {
                    resolution_failed = Some(reason);
                    break;
                }
            }
        }

        if let Some(reason) = resolution_failed {
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::HttpRoute, NsName::new(key.0.clone(), key.1.clone())),
                route.meta.generation,
                reason,
                "an HTTPRoute backend reference could not be resolved",
            ));
            continue;
        }

        sort_routes(&mut rule_routes);

        for hostname in &route.hostnames {
            virtual_hosts.insert(
                hostname.clone(),
                VirtualHost { fqdn: hostname.clone(), routes: rule_routes.clone(), cors: None, rate_limit: None },
            );
        }

        statuses.push(ObjectStatus::valid(
            ObjectKey::new(ObjectKind::HttpRoute, NsName::new(key.0.clone(), key.1.clone())),
            route.meta.generation,
        ));
    }
}

fn process_tls_routes(
    snapshot: &Snapshot,
    clusters: &mut ClusterBuilder,
    tls_passthroughs: &mut BTreeMap<String, TlsPassthroughEntry>,
    secure_virtual_hosts: &BTreeMap<String, SecureVirtualHost>,
    statuses: &mut Vec<ObjectStatus>,
) {
    let mut by_sni: BTreeMap<String, Vec<(RouteKey, &TlsRouteObject)>> = BTreeMap::new();
    for (key, object) in snapshot.of_kind(ObjectKind::TlsRoute) {
        if let WatchedObject::TlsRoute(route) = object {
            let route_key = (key.nsname.namespace.clone(), key.nsname.name.clone());
            for sni in &route.sni_names {
                by_sni.entry(sni.clone()).or_default().push((route_key.clone(), route));
            }
        }
    }

    for (sni, mut candidates) in by_sni {
        candidates.sort_by(|(a_key, a), (b_key, b)| {
            a.meta.creation_timestamp.cmp(&b.meta.creation_timestamp).then_with(|| a_key.cmp(b_key))
        });
        let (winner_key, winner) = candidates[0].clone();

        if tls_passthroughs.contains_key(&sni) || secure_virtual_hosts.contains_key(&sni) {
            for (loser_key, loser) in &candidates {
                statuses.push(ObjectStatus::invalid(
                    ObjectKey::new(ObjectKind::TlsRoute, NsName::new(loser_key.0.clone(), loser_key.1.clone())),
                    loser.meta.generation,
                    StatusReason::FqdnConflict,
                    format!("sni {sni} already claimed by an HTTPProxy TLS passthrough"),
                ));
            }
            continue;
        }

        for (loser_key, loser) in &candidates[1..] {
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::TlsRoute, NsName::new(loser_key.0.clone(), loser_key.1.clone())),
                loser.meta.generation,
                StatusReason::FqdnConflict,
                format!("sni {sni} already claimed by {}/{}", winner_key.0, winner_key.1),
            ));
        }

        let backend = match winner.backend_refs.first() {
            Some(backend) => backend,
            None => {
                statuses.push(ObjectStatus::invalid(
                    ObjectKey::new(ObjectKind::TlsRoute, NsName::new(winner_key.0.clone(), winner_key.1.clone())),
                    winner.meta.generation,
                    StatusReason::MissingService,
                    "TLSRoute has no backendRefs",
                ));
                continue;
            }
        };

        match clusters.resolve(&winner_key.0, &backend.service_name, backend.service_port, ClusterPolicy::default()) {
            Ok(cluster_key) => {
                tls_passthroughs.insert(sni.clone(), TlsPassthroughEntry { fqdn: sni, cluster_key });
                statuses.push(ObjectStatus::valid(
                    ObjectKey::new(ObjectKind::TlsRoute, NsName::new(winner_key.0.clone(), winner_key.1.clone())),
                    winner.meta.generation,
                ));
            }
            Err(reason) => statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::TlsRoute, NsName::new(winner_key.0.clone(), winner_key.1.clone())),
                winner.meta.generation,
                reason,
                "TLSRoute backend could not be resolved",
            )),
        }
    }
}

/// TCPRoute carries no hostname/SNI, so it cannot attach to the SNI-keyed
/// secure listener this control plane builds. Its backend is still
/// resolved, so the Service it names is materialized into a cluster and
/// participates in CDS/EDS, but no filter chain is produced for it.
fn process_tcp_routes(snapshot: &Snapshot, clusters: &mut ClusterBuilder, statuses: &mut Vec<ObjectStatus>) {
    for (key, object) in snapshot.of_kind(ObjectKind::TcpRoute) {
        let WatchedObject::TcpRoute(route) = object else { continue };
        let object_key = ObjectKey::new(ObjectKind::TcpRoute, NsName::new(key.nsname.namespace.clone(), key.nsname.name.clone()));

        let backend = match route.backend_refs.first() {
            Some(backend) => backend,
            None => {
                statuses.push(ObjectStatus::invalid(
                    object_key,
                    route.meta.generation,
                    StatusReason::MissingService,
                    "TCPRoute has no backendRefs",
                ));
                continue;
            }
        };

        match clusters.resolve(&key.nsname.namespace, &backend.service_name, backend.service_port, ClusterPolicy::default()) {
            Ok(_) => statuses.push(ObjectStatus::valid(object_key, route.meta.generation)),
            Err(reason) => statuses.push(ObjectStatus::invalid(
                object_key,
                route.meta.generation,
                reason,
                "TCPRoute backend could not be resolved",
            )),
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn process(
    snapshot: &Snapshot,
    _secrets: &ValidatedSecrets,
    _delegation: &DelegationSet,
    _control_plane: &ControlPlaneConfig,
    clusters: &mut ClusterBuilder,
    virtual_hosts: &mut BTreeMap<String, VirtualHost>,
    secure_virtual_hosts: &mut BTreeMap<String, SecureVirtualHost>,
) -> GatewayApiPassOutput {
    let mut statuses = Vec::new();
    let mut tls_passthroughs = BTreeMap::new();

    process_gateways(snapshot, &mut statuses);
    process_http_routes(snapshot, clusters, virtual_hosts, secure_virtual_hosts, &mut statuses);
    process_tls_routes(snapshot, clusters, &mut tls_passthroughs, secure_virtual_hosts, &mut statuses);
    process_tcp_routes(snapshot, clusters, &mut statuses);

    GatewayApiPassOutput { tls_passthroughs, statuses }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ObjectCache;
    use crate::k8s::types::{
        GatewayClassObject, GatewayObject, HttpRouteRule, IngressBackend, ObjectMeta, ServiceObject, ServicePort,
        TcpRouteObject, TlsRouteObject,
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
    fn gateway_with_known_class_is_valid() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::GatewayClass(GatewayClassObject {
            meta: meta("known"),
            controller_name: "example.com/controller".into(),
        }));
        cache.upsert(WatchedObject::Gateway(GatewayObject {
            meta: meta("gw"),
            gateway_class_name: "known".into(),
            listener_names: vec!["http".into()],
        }));

        let snapshot = cache.snapshot();
        let index = crate::dag::service_index::ServiceIndex::build(&snapshot);
        let mut clusters = ClusterBuilder::new(&index);
        let mut virtual_hosts = BTreeMap::new();
        let mut secure_virtual_hosts = BTreeMap::new();
        let secrets = ValidatedSecrets::build(&snapshot);
        let delegation = DelegationSet::build(&snapshot);
        let config = ControlPlaneConfig::default();

        let output = process(
            &snapshot,
            &secrets,
            &delegation,
            &config,
            &mut clusters,
            &mut virtual_hosts,
            &mut secure_virtual_hosts,
        );
        assert!(output.statuses.iter().any(ObjectStatus::is_valid));
    }

    #[test]
    fn gateway_with_unknown_class_is_invalid() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Gateway(GatewayObject {
            meta: meta("gw"),
            gateway_class_name: "missing".into(),
            listener_names: vec!["http".into()],
        }));

        let snapshot = cache.snapshot();
        let index = crate::dag::service_index::ServiceIndex::build(&snapshot);
        let mut clusters = ClusterBuilder::new(&index);
        let mut virtual_hosts = BTreeMap::new();
        let mut secure_virtual_hosts = BTreeMap::new();
        let secrets = ValidatedSecrets::build(&snapshot);
        let delegation = DelegationSet::build(&snapshot);
        let config = ControlPlaneConfig::default();

        let output = process(
            &snapshot,
            &secrets,
            &delegation,
            &config,
            &mut clusters,
            &mut virtual_hosts,
            &mut secure_virtual_hosts,
        );
        assert!(!output.statuses.iter().any(ObjectStatus::is_valid));
    }

    #[test]
    fn http_route_hostname_produces_virtual_host() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: meta("web"),
            ports: vec![ServicePort { name: None, port: 80, target_port: None, app_protocol: None }],
            external_name: None,
        }));
        cache.upsert(WatchedObject::HttpRoute(HttpRouteObject {
            meta: meta("route"),
            hostnames: vec!["gw.example.com".into()],
            rules: vec![HttpRouteRule {
                path_prefix: Some("/".into()),
                path_exact: None,
                backend_refs: vec![IngressBackend { service_name: "web".into(), service_port: 80 }],
            }],
        }));

        let snapshot = cache.snapshot();
        let index = crate::dag::service_index::ServiceIndex::build(&snapshot);
        let mut clusters = ClusterBuilder::new(&index);
        let mut virtual_hosts = BTreeMap::new();
        let mut secure_virtual_hosts = BTreeMap::new();
        let secrets = ValidatedSecrets::build(&snapshot);
        let delegation = DelegationSet::build(&snapshot);
        let config = ControlPlaneConfig::default();

        let output = process(
            &snapshot,
            &secrets,
            &delegation,
            &config,
            &mut clusters,
            &mut virtual_hosts,
            &mut secure_virtual_hosts,
        );

        assert!(output.statuses.iter().all(ObjectStatus::is_valid));
        assert_eq!(virtual_hosts["gw.example.com"].routes.len(), 1);
    }

    #[test]
    fn two_http_routes_claiming_same_hostname_oldest_wins() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: meta("web"),
            ports: vec![ServicePort { name: None, port: 80, target_port: None, app_protocol: None }],
            external_name: None,
        }));

        let mut older = meta("route-a");
        older.creation_timestamp = Utc::now() - chrono::Duration::seconds(60);
        cache.upsert(WatchedObject::HttpRoute(HttpRouteObject {
            meta: older,
            hostnames: vec!["gw.example.com".into()],
            rules: vec![HttpRouteRule {
                path_prefix: Some("/a".into()),
                path_exact: None,
                backend_refs: vec![IngressBackend { service_name: "web".into(), service_port: 80 }],
            }],
        }));
        cache.upsert(WatchedObject::HttpRoute(HttpRouteObject {
            meta: meta("route-b"),
            hostnames: vec!["gw.example.com".into()],
            rules: vec![HttpRouteRule {
                path_prefix: Some("/b".into()),
                path_exact: None,
                backend_refs: vec![IngressBackend { service_name: "web".into(), service_port: 80 }],
            }],
        }));

        let snapshot = cache.snapshot();
        let index = crate::dag::service_index::ServiceIndex::build(&snapshot);
        let mut clusters = ClusterBuilder::new(&index);
        let mut virtual_hosts = BTreeMap::new();
        let mut secure_virtual_hosts = BTreeMap::new();
        let secrets = ValidatedSecrets::build(&snapshot);
        let delegation = DelegationSet::build(&snapshot);
        let config = ControlPlaneConfig::default();

        let output = process(
            &snapshot,
            &secrets,
            &delegation,
            &config,
            &mut clusters,
            &mut virtual_hosts,
            &mut secure_virtual_hosts,
        );

        let invalid_count = output.statuses.iter().filter(|s| !s.is_valid()).count();
        assert_eq!(invalid_count, 1, "younger HTTPRoute must lose the FQDN conflict");
        match virtual_hosts["gw.example.com"].routes[0].conditions.path {
            PathMatch::Prefix(ref p) => assert_eq!(p, "/a"),
            _ => panic!("expected prefix match"),
        }
    }

    #[test]
    fn http_route_defers_to_already_claimed_httpproxy_fqdn() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::HttpRoute(HttpRouteObject {
            meta: meta("route"),
            hostnames: vec!["taken.example.com".into()],
            rules: vec![HttpRouteRule {
                path_prefix: Some("/".into()),
                path_exact: None,
                backend_refs: vec![IngressBackend { service_name: "web".into(), service_port: 80 }],
            }],
        }));

        let snapshot = cache.snapshot();
        let index = crate::dag::service_index::ServiceIndex::build(&snapshot);
        let mut clusters = ClusterBuilder::new(&index);
        let mut virtual_hosts = BTreeMap::new();
        virtual_hosts.insert(
            "taken.example.com".to_string(),
            VirtualHost { fqdn: "taken.example.com".into(), routes: Vec::new(), cors: None, rate_limit: None },
        );
        let mut secure_virtual_hosts = BTreeMap::new();
        let secrets = ValidatedSecrets::build(&snapshot);
        let delegation = DelegationSet::build(&snapshot);
        let config = ControlPlaneConfig::default();

        let output = process(
            &snapshot,
            &secrets,
            &delegation,
            &config,
            &mut clusters,
            &mut virtual_hosts,
            &mut secure_virtual_hosts,
        );

        assert!(!output.statuses.iter().any(ObjectStatus::is_valid));
        assert!(virtual_hosts["taken.example.com"].routes.is_empty(), "HTTPProxy's vhost must not be overwritten");
    }

    #[test]
    fn tls_route_produces_tls_passthrough_entry() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: meta("web"),
            ports: vec![ServicePort { name: None, port: 443, target_port: None, app_protocol: None }],
            external_name: None,
        }));
        cache.upsert(WatchedObject::TlsRoute(TlsRouteObject {
            meta: meta("tlsroute"),
            sni_names: vec!["secure.example.com".into()],
            backend_refs: vec![IngressBackend { service_name: "web".into(), service_port: 443 }],
        }));

        let snapshot = cache.snapshot();
        let index = crate::dag::service_index::ServiceIndex::build(&snapshot);
        let mut clusters = ClusterBuilder::new(&index);
        let mut virtual_hosts = BTreeMap::new();
        let mut secure_virtual_hosts = BTreeMap::new();
        let secrets = ValidatedSecrets::build(&snapshot);
        let delegation = DelegationSet::build(&snapshot);
        let config = ControlPlaneConfig::default();

        let output = process(
            &snapshot,
            &secrets,
            &delegation,
            &config,
            &mut clusters,
            &mut virtual_hosts,
            &mut secure_virtual_hosts,
        );

        assert!(output.statuses.iter().all(ObjectStatus::is_valid));
        assert!(output.tls_passthroughs.contains_key("secure.example.com"));
    }

    #[test]
    fn tcp_route_resolves_cluster_but_produces_no_listener_entry() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(WatchedObject::Service(ServiceObject {
            meta: meta("web"),
            ports: vec![ServicePort { name: None, port: 9000, target_port: None, app_protocol: None }],
            external_name: None,
        }));
        cache.upsert(WatchedObject::TcpRoute(TcpRouteObject {
            meta: meta("tcproute"),
            backend_refs: vec![IngressBackend { service_name: "web".into(), service_port: 9000 }],
        }));

        let snapshot = cache.snapshot();
        let index = crate::dag::service_index::ServiceIndex::build(&snapshot);
        let mut clusters = ClusterBuilder::new(&index);
        let mut virtual_hosts = BTreeMap::new();
        let mut secure_virtual_hosts = BTreeMap::new();
        let secrets = ValidatedSecrets::build(&snapshot);
        let delegation = DelegationSet::build(&snapshot);
        let config = ControlPlaneConfig::default();

        let output = process(
            &snapshot,
            &secrets,
            &delegation,
            &config,
            &mut clusters,
            &mut virtual_hosts,
            &mut secure_virtual_hosts,
        );

        assert!(output.statuses.iter().all(ObjectStatus::is_valid));
        assert!(output.tls_passthroughs.is_empty());
    }
}
