//! # HTTPProxy Root-Object Pass
//!
//! Spec §4.2 passes 4-6: resolve TLS (subject to delegation), resolve
//! service references, flatten `includes`, and sort routes — for every
//! HTTPProxy root (a proxy carrying a `virtualhost` block). Implements the
//! include-tree DFS with a per-walk visited set (spec §9) and the FQDN
//! uniqueness tie-break (spec §8 "FQDN uniqueness").

use std::collections::{BTreeMap, BTreeSet};

use super::cluster_builder::{ClusterBuilder, ClusterPolicy};
use super::delegation::DelegationSet;
use super::duration::parse_go_duration_seconds;
use super::model::{
    PathMatch, ResolvedCors, ResolvedHostRewrite, ResolvedInternalRedirectPolicy,
    ResolvedMirrorPolicy, ResolvedRedirect, ResolvedRetryPolicy, ResolvedTimeoutPolicy, Route,
    RouteAction, RouteConditions, RouteExtAuthz, SecureVirtualHost, TlsVersion, VhostExtAuthz,
    VirtualHost, WeightedClusterRef,
};
use super::secrets::ValidatedSecrets;
use super::status::{ObjectStatus, StatusReason};
use crate::config::ControlPlaneConfig;
use crate::k8s::types::{
    HeaderConditionSpec, HttpProxyObject, ObjectKind, ObjectKey, PathConditionSpec,
    RedirectPathRewrite, RouteActionSpec, RouteConditionsSpec, RouteSpec,
};
use crate::cache::Snapshot;

pub struct HttpProxyPassOutput {
    pub virtual_hosts: BTreeMap<String, VirtualHost>,
    pub secure_virtual_hosts: BTreeMap<String, SecureVirtualHost>,
    pub tls_passthroughs: BTreeMap<String, super::model::TlsPassthroughEntry>,
    pub statuses: Vec<ObjectStatus>,
}

#[derive(Debug, Clone, Default)]
struct PathPrefixAccumulator {
    prefix: String,
    headers: Vec<HeaderConditionSpec>,
}

impl PathPrefixAccumulator {
    fn extend(&self, edge: &RouteConditionsSpec) -> Self {
        let added_prefix = match &edge.path {
            Some(PathConditionSpec::Prefix(p)) => p.clone(),
            _ => String::new(),
        };
        let mut headers = self.headers.clone();
        headers.extend(edge.headers.iter().cloned());
        Self { prefix: join_path(&self.prefix, &added_prefix), headers }
    }
}

fn join_path(a: &str, b: &str) -> String {
    if b.is_empty() {
        return if a.is_empty() { "/".to_string() } else { a.to_string() };
    }
    let a_trimmed = a.trim_end_matches('/');
    let b_norm = if let Some(stripped) = b.strip_prefix('/') { stripped.to_string() } else { b.to_string() };
    format!("{a_trimmed}/{b_norm}")
}

fn resolve_conditions(accum: &PathPrefixAccumulator, own: &RouteConditionsSpec) -> RouteConditions {
    let path = match own.path.clone().unwrap_or(PathConditionSpec::Prefix("/".to_string())) {
        PathConditionSpec::Prefix(p) => PathMatch::Prefix(join_path(&accum.prefix, &p)),
        PathConditionSpec::Exact(p) => PathMatch::Exact(join_path(&accum.prefix, &p)),
        PathConditionSpec::Regex(p) => PathMatch::Regex(format!("{}{}", accum.prefix, p)),
    };
    let mut headers = accum.headers.clone();
    headers.extend(own.headers.iter().cloned());
    RouteConditions { path, headers }
}

type ProxyKey = (String, String);

/// Depth-first include flattening. `visited` spans the entire walk from
/// one root (not just the current ancestor chain): re-entering an
/// already-visited node anywhere in the walk is a loop (spec §4.2 pass 5).
fn flatten(
    key: &ProxyKey,
    proxies: &BTreeMap<ProxyKey, &HttpProxyObject>,
    visited: &mut BTreeSet<ProxyKey>,
    accum: &PathPrefixAccumulator,
    out: &mut Vec<(RouteSpec, RouteConditions)>,
) -> Result<(), StatusReason> {
    if !visited.insert(key.clone()) {
        return Err(StatusReason::IncludeLoop);
    }

    let Some(proxy) = proxies.get(key) else { return Ok(()) };

    for route in &proxy.routes {
        out.push((route.clone(), resolve_conditions(accum, &route.conditions)));
    }

    for include in &proxy.includes {
        let target_ns = include.namespace.clone().unwrap_or_else(|| key.0.clone());
        let target_key = (target_ns, include.name.clone());
        let child_accum = accum.extend(&include.conditions);
        flatten(&target_key, proxies, visited, &child_accum, out)?;
    }

    Ok(())
}

fn parse_tls_version(value: &str) -> Option<TlsVersion> {
    match value {
        "1.2" => Some(TlsVersion::V1_2),
        "1.3" => Some(TlsVersion::V1_3),
        _ => None,
    }
}

fn control_plane_floor(floor: crate::config::TlsVersionFloor) -> TlsVersion {
    match floor {
        crate::config::TlsVersionFloor::V1_2 => TlsVersion::V1_2,
        crate::config::TlsVersionFloor::V1_3 => TlsVersion::V1_3,
    }
}

fn resolve_cors(spec: &crate::k8s::types::CorsPolicySpec) -> Result<ResolvedCors, String> {
    let seconds = parse_go_duration_seconds(&spec.max_age)
        .ok_or_else(|| format!("invalid CORS max-age duration '{}'", spec.max_age))?;
    if seconds < 0.0 {
        return Err(format!("CORS max-age must not be negative, got '{}'", spec.max_age));
    }
    Ok(ResolvedCors {
        allow_origin_exact: spec.allow_origin.clone(),
        allow_methods: spec.allow_methods.join(","),
        allow_headers: spec.allow_headers.join(","),
        expose_headers: spec.expose_headers.join(","),
        allow_credentials: spec.allow_credentials,
        max_age_seconds: (seconds.round() as i64).to_string(),
    })
}

fn resolve_retry(spec: &crate::k8s::types::RetryPolicySpec) -> Result<ResolvedRetryPolicy, String> {
    let num_retries = match spec.num_retries {
        n if n < 0 => 0,
        0 => 1,
        n => n as u32,
    };
    let per_try_timeout_seconds = match &spec.per_try_timeout {
        Some(s) => Some(
            parse_go_duration_seconds(s)
                .filter(|v| *v >= 0.0)
                .ok_or_else(|| format!("invalid per-try-timeout '{s}'"))?,
        ),
        None => None,
    };
    Ok(ResolvedRetryPolicy {
        num_retries,
        retry_on: spec.retry_on.clone().unwrap_or_else(|| "5xx".to_string()),
        per_try_timeout_seconds,
    })
}

fn resolve_timeout(spec: &crate::k8s::types::TimeoutPolicySpec) -> Result<ResolvedTimeoutPolicy, String> {
    let resolve = |s: &Option<String>| -> Result<Option<f64>, String> {
        match s {
            Some(v) => Ok(Some(
                parse_go_duration_seconds(v)
                    .filter(|secs| *secs >= 0.0)
                    .ok_or_else(|| format!("invalid timeout '{v}'"))?,
            )),
            None => Ok(None),
        }
    };
    Ok(ResolvedTimeoutPolicy {
        response_timeout_seconds: resolve(&spec.response_timeout)?,
        idle_timeout_seconds: resolve(&spec.idle_timeout)?,
    })
}

fn resolve_route_ext_authz(
    global_enabled: bool,
    vhost_disabled: bool,
    route_override: &Option<crate::k8s::types::AuthPolicySpec>,
) -> Option<RouteExtAuthz> {
    if !global_enabled {
        return None;
    }
    match route_override {
        Some(o) => Some(RouteExtAuthz { disabled: o.disabled, context_extensions: o.context_extensions.clone() }),
        None => Some(RouteExtAuthz { disabled: vhost_disabled, context_extensions: Default::default() }),
    }
}

fn resolve_load_balancing_policy(
    strategy: Option<&str>,
    session_affinity_enabled: bool,
) -> super::model::LoadBalancingPolicy {
    if session_affinity_enabled {
        return super::model::LoadBalancingPolicy::RingHash;
    }
    match strategy {
        Some("WeightedLeastRequest") => super::model::LoadBalancingPolicy::WeightedLeastRequest,
        Some("Random") => super::model::LoadBalancingPolicy::Random,
        Some("RingHash") => super::model::LoadBalancingPolicy::RingHash,
        _ => super::model::LoadBalancingPolicy::RoundRobin,
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_action(
    action: &RouteActionSpec,
    namespace: &str,
    clusters: &mut ClusterBuilder,
    session_affinity_enabled: bool,
) -> Result<RouteAction, StatusReason> {
    match action {
        RouteActionSpec::Services(services) => {
            let mut refs = Vec::with_capacity(services.len());
            for service in services {
                let policy = ClusterPolicy {
                    upstream_protocol: match service.upstream_protocol.as_deref() {
                        Some("h2c") => super::model::UpstreamProtocol::H2c,
                        Some("h2") => super::model::UpstreamProtocol::H2,
                        Some("tls") => super::model::UpstreamProtocol::Tls,
                        _ => super::model::UpstreamProtocol::Http11,
                    },
                    load_balancing: resolve_load_balancing_policy(
                        service.load_balancing_policy.as_deref(),
                        session_affinity_enabled,
                    ),
                    health_check: service.health_check.as_ref().map(|h| super::model::HealthCheckSpec {
                        path: h.path.clone(),
                        interval_seconds: h.interval_seconds,
                        timeout_seconds: h.timeout_seconds,
                        unhealthy_threshold: h.unhealthy_threshold,
                        healthy_threshold: h.healthy_threshold,
                    }),
                    circuit_breaker: service.circuit_breaker.as_ref().map(|c| super::model::CircuitBreakerSpec {
                        max_connections: c.max_connections,
                        max_pending_requests: c.max_pending_requests,
                        max_requests: c.max_requests,
                        max_retries: c.max_retries,
                    }),
                    tls_validation: service.validation_ca_secret.as_ref().map(|ca| {
                        super::model::UpstreamTlsValidation {
                            ca_secret_key: ca.clone(),
                            subject_alt_names: service
                                .validation_subject_name
                                .clone()
                                .map(|s| vec![s])
                                .unwrap_or_default(),
                        }
                    }),
                    ..Default::default()
                };
                let key = clusters.resolve(namespace, &service.name, service.port, policy)?;
                refs.push(WeightedClusterRef {
                    cluster_key: key,
                    weight: if service.weight == 0 { 1 } else { service.weight },
                });
            }
            Ok(RouteAction::Cluster(refs))
        }
        RouteActionSpec::Redirect(redirect) => Ok(RouteAction::Redirect(ResolvedRedirect {
            hostname: redirect.hostname.clone(),
            scheme: redirect.scheme.clone(),
            status_code: redirect.status_code,
            path_rewrite_literal: match &redirect.path_rewrite {
                RedirectPathRewrite::Literal(l) => Some(l.clone()),
                RedirectPathRewrite::None => None,
            },
        })),
        RouteActionSpec::DirectResponse(dr) => {
            Ok(RouteAction::DirectResponse { status_code: dr.status_code, body: dr.body.clone() })
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_route(
    spec: &RouteSpec,
    conditions: RouteConditions,
    namespace: &str,
    clusters: &mut ClusterBuilder,
    global_ext_authz_enabled: bool,
    vhost_authz_disabled: bool,
    force_ssl_redirect: bool,
) -> Result<Route, StatusReason> {
    let action = resolve_action(&spec.action, namespace, clusters, spec.session_affinity.is_some())?;

    let cors = spec.cors_policy.as_ref().map(resolve_cors).transpose().map_err(|_| StatusReason::InvalidPolicy)?;
    let retry = spec.retry_policy.as_ref().map(resolve_retry).transpose().map_err(|_| StatusReason::InvalidPolicy)?;
    let timeout =
        spec.timeout_policy.as_ref().map(resolve_timeout).transpose().map_err(|_| StatusReason::InvalidPolicy)?;

    let mirror = spec
        .mirror_policy
        .as_ref()
        .map(|m| -> Result<ResolvedMirrorPolicy, StatusReason> {
            let key = clusters.resolve(namespace, &m.service_name, m.service_port, ClusterPolicy::default())?;
            Ok(ResolvedMirrorPolicy { cluster_key: key, weight_percent: m.weight_percent })
        })
        .transpose()?;

    let ext_authz =
        resolve_route_ext_authz(global_ext_authz_enabled, vhost_authz_disabled, &spec.authorization);

    Ok(Route {
        conditions,
        action,
        force_ssl_redirect_on_insecure_plane: force_ssl_redirect && !spec.permit_insecure,
        enable_websockets: spec.enable_websockets,
        request_headers: spec.request_headers_policy.clone(),
        response_headers: spec.response_headers_policy.clone(),
        retry,
        timeout,
        cors,
        rate_limit: spec.rate_limit_policy.clone(),
        ip_allow_deny: spec.ip_allow_deny.clone(),
        jwt_verification: spec.jwt_verification_policy.clone(),
        ext_authz,
        mirror,
        host_rewrite: spec
            .host_rewrite
            .as_ref()
            .map(|h| ResolvedHostRewrite { literal: h.literal.clone(), header: h.header.clone() }),
        session_affinity: spec.session_affinity.clone(),
        internal_redirect: spec.internal_redirect_policy.as_ref().map(ResolvedInternalRedirectPolicy::from_spec),
    })
}

pub fn process(
    snapshot: &Snapshot,
    secrets: &ValidatedSecrets,
    delegation: &DelegationSet,
    control_plane: &ControlPlaneConfig,
    clusters: &mut ClusterBuilder,
) -> HttpProxyPassOutput {
    let mut proxies: BTreeMap<ProxyKey, &HttpProxyObject> = BTreeMap::new();
    for (_, object) in snapshot.of_kind(ObjectKind::HttpProxy) {
        if let crate::k8s::types::WatchedObject::HttpProxy(proxy) = object {
            proxies.insert((proxy.meta.namespace.clone(), proxy.meta.name.clone()), proxy);
        }
    }

    let roots: Vec<ProxyKey> =
        proxies.iter().filter(|(_, p)| p.virtualhost.is_some()).map(|(k, _)| k.clone()).collect();

    // Group roots by FQDN, oldest creation timestamp wins ties broken
    // lexically by (namespace, name) for full determinism (spec §8).
    let mut by_fqdn: BTreeMap<String, Vec<ProxyKey>> = BTreeMap::new();
    for key in &roots {
        let fqdn = proxies[key].virtualhost.as_ref().unwrap().fqdn.clone();
        by_fqdn.entry(fqdn).or_default().push(key.clone());
    }

    let mut winners: BTreeSet<ProxyKey> = BTreeSet::new();
    let mut statuses = Vec::new();
    for (_, mut candidates) in by_fqdn {
        candidates.sort_by(|a, b| {
            proxies[a]
                .meta
                .creation_timestamp
                .cmp(&proxies[b].meta.creation_timestamp)
                .then_with(|| a.cmp(b))
        });
        let winner = candidates[0].clone();
        for loser in &candidates[1..] {
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(loser.0.clone(), loser.1.clone())),
                proxies[loser].meta.generation,
                StatusReason::FqdnConflict,
                format!("fqdn already claimed by {}/{}", winner.0, winner.1),
            ));
        }
        winners.insert(winner);
    }

    let mut reachable: BTreeSet<ProxyKey> = BTreeSet::new();
    let mut virtual_hosts = BTreeMap::new();
    let mut secure_virtual_hosts = BTreeMap::new();
    let mut tls_passthroughs = BTreeMap::new();

    for root_key in &winners {
        let proxy = proxies[root_key];
        let vhost_spec = proxy.virtualhost.as_ref().expect("root has virtualhost");

        let mut walk_visited = BTreeSet::new();
        let mut raw_routes = Vec::new();
        if let Err(reason) = flatten(root_key, &proxies, &mut walk_visited, &PathPrefixAccumulator::default(), &mut raw_routes) {
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(root_key.0.clone(), root_key.1.clone())),
                proxy.meta.generation,
                reason,
                "include tree contains a cycle",
            ));
            continue;
        }
        reachable.extend(walk_visited.iter().cloned());

        if vhost_spec.tls.as_ref().map(|tls| tls.passthrough).unwrap_or(false) {
            match resolve_tls_passthrough(proxy, root_key, clusters) {
                Ok(entry) => {
                    tls_passthroughs.insert(vhost_spec.fqdn.clone(), entry);
                    statuses.push(ObjectStatus::valid(
                        ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(root_key.0.clone(), root_key.1.clone())),
                        proxy.meta.generation,
                    ));
                }
                Err(reason) => statuses.push(ObjectStatus::invalid(
                    ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(root_key.0.clone(), root_key.1.clone())),
                    proxy.meta.generation,
                    reason,
                    "TLS passthrough requires a tcpproxy with a resolvable service",
                )),
            }
            continue;
        }

        // Resolve TLS (if any), subject to delegation and fallback-cert rules.
        let mut secret_key: Option<String> = None;
        let mut fallback_certificate = false;
        let mut fallback_secret_key: Option<String> = None;
        let mut client_validation_secret_key = None;
        let mut min_tls = control_plane_floor(control_plane.tls_min_version);
        let mut max_tls = control_plane_floor(control_plane.tls_max_version);
        let mut invalid_tls: Option<String> = None;

        if let Some(tls) = &vhost_spec.tls {
            if tls.enable_fallback_certificate && tls.client_validation_ca_secret.is_some() {
                invalid_tls = Some("fallback certificate cannot be combined with client validation".to_string());
            } else if let Some(name) = &tls.secret_name {
                let secret_ns = tls.secret_namespace.clone().unwrap_or_else(|| root_key.0.clone());
                if !delegation.is_permitted(&secret_ns, name, &root_key.0) {
                    invalid_tls = Some(format!("secret {secret_ns}/{name} not delegated to {}", root_key.0));
                } else if let Some(entry) = secrets.get(&secret_ns, name) {
                    secret_key = Some(entry.key.clone());
                } else {
                    invalid_tls = Some(format!("secret {secret_ns}/{name} not found or invalid"));
                }
            }

            if invalid_tls.is_none() && tls.enable_fallback_certificate {
                match &control_plane.fallback_certificate {
                    Some(fallback) if delegation.is_permitted(&fallback.namespace, &fallback.name, &root_key.0) => {
                        match secrets.get(&fallback.namespace, &fallback.name) {
                            Some(entry) => {
                                fallback_certificate = true;
                                fallback_secret_key = Some(entry.key.clone());
                            }
                            None => {
                                invalid_tls = Some(format!(
                                    "fallback certificate {}/{} not found or invalid",
                                    fallback.namespace, fallback.name
                                ));
                            }
                        }
                    }
                    _ => {
                        invalid_tls =
                            Some("fallback certificate enabled but not configured or not delegated".to_string());
                    }
                }
            }

            if invalid_tls.is_none() {
                if let Some(cvc) = &tls.client_validation_ca_secret {
                    let ns = root_key.0.clone();
                    if let Some(entry) = secrets.get(&ns, cvc) {
                        client_validation_secret_key = Some(entry.key.clone());
                    } else {
                        invalid_tls = Some(format!("client validation CA secret {ns}/{cvc} not found"));
                    }
                }
            }

            if let Some(requested_min) = tls.minimum_tls_version.as_deref().and_then(parse_tls_version) {
                min_tls = min_tls.max(requested_min);
            }
            if let Some(requested_max) = tls.maximum_tls_version.as_deref().and_then(parse_tls_version) {
                max_tls = max_tls.max(requested_max);
            }
            max_tls = max_tls.max(min_tls);
        }

        if let Some(reason) = invalid_tls {
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(root_key.0.clone(), root_key.1.clone())),
                proxy.meta.generation,
                StatusReason::InvalidTls,
                reason,
            ));
            continue;
        }

        let global_ext_authz_enabled = control_plane.global_ext_authz.is_some();
        let vhost_authz_disabled = vhost_spec.authorization.as_ref().map(|a| a.disabled).unwrap_or(false);
        let force_ssl_redirect = secret_key.is_some() || fallback_certificate;

        let mut resolution_failed = None;
        let mut routes = Vec::with_capacity(raw_routes.len());
        for (route_spec, conditions) in raw_routes {
            match resolve_route(
                &route_spec,
                conditions,
                &root_key.0,
                clusters,
                global_ext_authz_enabled,
                vhost_authz_disabled,
                force_ssl_redirect,
            ) {
                Ok(route) => routes.push(route),
                Err(reason) => {
                    resolution_failed = Some(reason);
                    break;
                }
            }
        }

        if let Some(reason) = resolution_failed {
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(root_key.0.clone(), root_key.1.clone())),
                proxy.meta.generation,
                reason,
                "a route policy failed validation",
            ));
            continue;
        }

        super::sort::sort_routes(&mut routes);

        let cors = vhost_spec.cors_policy.as_ref().map(resolve_cors);
        if let Some(Err(_)) = cors {
            statuses.push(ObjectStatus::invalid(
                ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(root_key.0.clone(), root_key.1.clone())),
                proxy.meta.generation,
                StatusReason::InvalidPolicy,
                "vhost CORS policy failed validation",
            ));
            continue;
        }
        let cors = cors.and_then(Result::ok);

        virtual_hosts.insert(
            vhost_spec.fqdn.clone(),
            VirtualHost {
                fqdn: vhost_spec.fqdn.clone(),
                routes: routes.clone(),
                cors: cors.clone(),
                rate_limit: vhost_spec.rate_limit_policy.clone(),
            },
        );

        if let Some(secret_key) = secret_key.clone() {
            let tcp_proxy = proxy.tcpproxy.as_ref().map(|t| {
                let mut clusters_refs = Vec::new();
                for service in &t.services {
                    if let Ok(key) =
                        clusters.resolve(&root_key.0, &service.name, service.port, ClusterPolicy::default())
                    {
                        clusters_refs.push(WeightedClusterRef {
                            cluster_key: key,
                            weight: if service.weight == 0 { 1 } else { service.weight },
                        });
                    }
                }
                super::model::TcpProxy { clusters: clusters_refs }
            });

            secure_virtual_hosts.insert(
                vhost_spec.fqdn.clone(),
                SecureVirtualHost {
                    fqdn: vhost_spec.fqdn.clone(),
                    routes,
                    secret_key,
                    minimum_tls_version: min_tls,
                    maximum_tls_version: max_tls,
                    cipher_suites: control_plane.cipher_suites.clone(),
                    client_validation_secret_key,
                    jwt_providers: Vec::new(),
                    ext_authz: control_plane.global_ext_authz.as_ref().map(|_| VhostExtAuthz {
                        extension_service_key: format!(
                            "{}/{}",
                            control_plane.global_ext_authz.as_ref().unwrap().namespace,
                            control_plane.global_ext_authz.as_ref().unwrap().name
                        ),
                        disabled: vhost_authz_disabled,
                    }),
                    rate_limit: vhost_spec.rate_limit_policy.clone(),
                    cors,
                    fallback_certificate,
                    fallback_secret_key,
                    tcp_proxy,
                },
            );
        }

        statuses.push(ObjectStatus::valid(
            ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(root_key.0.clone(), root_key.1.clone())),
            proxy.meta.generation,
        ));
    }

    for (key, proxy) in &proxies {
        if proxy.virtualhost.is_some() || reachable.contains(key) {
            continue;
        }
        if winners.contains(key) {
            continue;
        }
        statuses.push(ObjectStatus::invalid(
            ObjectKey::new(ObjectKind::HttpProxy, crate::k8s::types::NsName::new(key.0.clone(), key.1.clone())),
            proxy.meta.generation,
            StatusReason::OrphanedRoute,
            "not reachable from any root HTTPProxy",
        ));
    }

    HttpProxyPassOutput { virtual_hosts, secure_virtual_hosts, tls_passthroughs, statuses }
}

fn resolve_tls_passthrough(
    proxy: &HttpProxyObject,
    root_key: &ProxyKey,
    clusters: &mut ClusterBuilder,
) -> Result<super::model::TlsPassthroughEntry, StatusReason> {
    let fqdn = proxy.virtualhost.as_ref().expect("root has virtualhost").fqdn.clone();
    let service = proxy
        .tcpproxy
        .as_ref()
        .and_then(|t| t.services.first())
        .ok_or(StatusReason::InvalidTls)?;
    let cluster_key =
        clusters.resolve(&root_key.0, &service.name, service.port, ClusterPolicy::default())?;
    Ok(super::model::TlsPassthroughEntry { fqdn, cluster_key })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::types::CorsPolicySpec;

    fn cors_spec(max_age: &str) -> CorsPolicySpec {
        CorsPolicySpec {
            allow_origin: vec!["*".to_string()],
            allow_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allow_headers: Vec::new(),
            expose_headers: Vec::new(),
            allow_credentials: true,
            max_age: max_age.to_string(),
        }
    }

    #[test]
    fn cors_ten_minutes_resolves_to_six_hundred_seconds() {
        let resolved = resolve_cors(&cors_spec("10m")).expect("valid duration");
        assert_eq!(resolved.max_age_seconds, "600");
        assert_eq!(resolved.allow_methods, "GET,POST,OPTIONS");
        assert!(resolved.allow_credentials);
        assert_eq!(resolved.allow_origin_exact, vec!["*".to_string()]);
    }

    #[test]
    fn cors_zero_seconds_disables_preflight_cache() {
        let resolved = resolve_cors(&cors_spec("0s")).expect("valid duration");
        assert_eq!(resolved.max_age_seconds, "0");
    }

    #[test]
    fn cors_negative_max_age_is_rejected() {
        assert!(resolve_cors(&cors_spec("-10m")).is_err());
    }

    #[test]
    fn zero_num_retries_maps_to_one() {
        let spec = crate::k8s::types::RetryPolicySpec { num_retries: 0, retry_on: None, per_try_timeout: None };
        let resolved = resolve_retry(&spec).expect("valid retry policy");
        assert_eq!(resolved.num_retries, 1);
    }

    #[test]
    fn negative_num_retries_clamps_to_zero() {
        let spec = crate::k8s::types::RetryPolicySpec { num_retries: -1, retry_on: None, per_try_timeout: None };
        let resolved = resolve_retry(&spec).expect("valid retry policy");
        assert_eq!(resolved.num_retries, 0);
    }

    #[test]
    fn session_affinity_forces_ring_hash_regardless_of_explicit_strategy() {
        assert_eq!(
            resolve_load_balancing_policy(Some("WeightedLeastRequest"), true),
            super::super::model::LoadBalancingPolicy::RingHash
        );
    }

    #[test]
    fn explicit_strategy_is_honored_without_session_affinity() {
        assert_eq!(
            resolve_load_balancing_policy(Some("Random"), false),
            super::super::model::LoadBalancingPolicy::Random
        );
    }

    #[test]
    fn unset_strategy_without_session_affinity_defaults_to_round_robin() {
        assert_eq!(resolve_load_balancing_policy(None, false), super::super::model::LoadBalancingPolicy::RoundRobin);
    }
}
