//! # DAG Entity Model
//!
//! The in-memory, acyclic translation graph (spec §3). Every entity here is
//! produced fresh by one builder run ([`crate::dag::builder::build`]); the
//! whole graph is discarded and replaced, never mutated in place. Identity
//! between DAGs produced on different runs is by stable string key (the
//! cluster key, the secret key, ...), never by pointer.

use std::collections::BTreeMap;

use crate::k8s::types::{
    AllowCrossSchemeRedirect, HeaderConditionSpec, IpAllowDenySpec, JwtVerificationPolicySpec,
    RateLimitPolicySpec, SessionAffinitySpec,
};

/// The full output of one builder run. Field maps are keyed for
/// deterministic (sorted) iteration downstream, per spec §9.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dag {
    pub insecure_listener: Option<Listener>,
    pub secure_listener: Option<Listener>,
    /// Insecure-plane (`ingress_http`) virtual hosts, keyed by FQDN.
    pub virtual_hosts: BTreeMap<String, VirtualHost>,
    /// Secure-plane (`https/<fqdn>`) virtual hosts, keyed by FQDN.
    pub secure_virtual_hosts: BTreeMap<String, SecureVirtualHost>,
    pub clusters: BTreeMap<String, Cluster>,
    pub secrets: BTreeMap<String, Secret>,
    pub extension_services: BTreeMap<String, ExtensionServiceEntry>,
    /// TLS-passthrough SNI matches on the secure listener: straight TCP
    /// proxying with no termination, keyed by fqdn (spec §3 "TLS
    /// passthrough").
    pub tls_passthroughs: BTreeMap<String, TlsPassthroughEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsPassthroughEntry {
    pub fqdn: String,
    pub cluster_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerProtocol {
    Http,
    Https,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listener {
    pub name: String,
    pub address: String,
    pub port: u32,
    pub protocol: ListenerProtocol,
    pub filter_chains: Vec<FilterChain>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub name: String,
    pub kind: FilterChainKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterChainKind {
    /// The single chain on the insecure listener: HCM routing to
    /// RouteConfiguration `ingress_http`.
    Http,
    /// An SNI-matched, TLS-terminated HTTPS chain: HCM routing to
    /// RouteConfiguration `https/<fqdn>`.
    HttpsTerminated { sni: String, secret_key: String, fqdn: String },
    /// The fallback chain that matches connections carrying no (or no
    /// matching) SNI, named `filterchaintlsfallback` (spec §8 S3).
    HttpsFallback { secret_key: String, fqdn: String },
    /// SNI-matched straight TCP proxying with no TLS termination.
    TlsPassthrough { sni: String, cluster_key: String },
    /// SNI-matched TLS termination followed by TCP proxying (TCPProxy's
    /// "terminated" mode, spec §3).
    TcpTerminated { sni: String, secret_key: String, cluster_key: String },
}

/// An insecure-plane virtual host (`ingress_http`).
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualHost {
    pub fqdn: String,
    pub routes: Vec<Route>,
    pub cors: Option<ResolvedCors>,
    pub rate_limit: Option<RateLimitPolicySpec>,
}

/// A secure-plane virtual host (`https/<fqdn>`), additionally owning TLS
/// material and the policies that only make sense on an authenticated
/// connection.
#[derive(Debug, Clone, PartialEq)]
pub struct SecureVirtualHost {
    pub fqdn: String,
    pub routes: Vec<Route>,
    pub secret_key: String,
    pub minimum_tls_version: TlsVersion,
    pub maximum_tls_version: TlsVersion,
    pub cipher_suites: Vec<String>,
    pub client_validation_secret_key: Option<String>,
    pub jwt_providers: Vec<String>,
    pub ext_authz: Option<VhostExtAuthz>,
    pub rate_limit: Option<RateLimitPolicySpec>,
    pub cors: Option<ResolvedCors>,
    pub fallback_certificate: bool,
    /// The control-plane-configured fallback certificate's secret key
    /// (`Secret`'s map key in `Dag.secrets`), resolved once delegation
    /// permits it. Set only when `fallback_certificate` is true.
    pub fallback_secret_key: Option<String>,
    pub tcp_proxy: Option<TcpProxy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    V1_2,
    V1_3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VhostExtAuthz {
    pub extension_service_key: String,
    pub disabled: bool,
}

/// A SecureVirtualHost terminal TCP proxy node (spec §3 "TCPProxy").
#[derive(Debug, Clone, PartialEq)]
pub struct TcpProxy {
    pub clusters: Vec<WeightedClusterRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedClusterRef {
    pub cluster_key: String,
    pub weight: u32,
}

/// CORS policy, resolved to the exact numeric/string semantics the
/// translator emits verbatim (spec §4.2 "CORS max-age").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCors {
    pub allow_origin_exact: Vec<String>,
    pub allow_methods: String,
    pub allow_headers: String,
    pub expose_headers: String,
    pub allow_credentials: bool,
    pub max_age_seconds: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathMatch {
    /// Ordered so that `Exact > Regex > Prefix` when compared for
    /// specificity (spec §9 "exact before regex before prefix"); see
    /// [`crate::dag::sort`] for the actual comparator, which does not rely
    /// on this derived order directly but mirrors it.
    Exact(String),
    Regex(String),
    Prefix(String),
}

impl PathMatch {
    pub fn literal(&self) -> &str {
        match self {
            PathMatch::Exact(s) | PathMatch::Regex(s) | PathMatch::Prefix(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteConditions {
    pub path: PathMatch,
    pub headers: Vec<HeaderConditionSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    Cluster(Vec<WeightedClusterRef>),
    Redirect(ResolvedRedirect),
    DirectResponse { status_code: u32, body: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRedirect {
    pub hostname: Option<String>,
    pub scheme: Option<String>,
    pub status_code: u32,
    pub path_rewrite_literal: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRetryPolicy {
    pub num_retries: u32,
    pub retry_on: String,
    pub per_try_timeout_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTimeoutPolicy {
    pub response_timeout_seconds: Option<f64>,
    pub idle_timeout_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInternalRedirectPolicy {
    pub max_internal_redirects: u32,
    pub redirect_response_codes: Vec<u32>,
    pub predicates: Vec<InternalRedirectPredicate>,
    pub allow_cross_scheme_redirect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalRedirectPredicate {
    SafeCrossScheme,
    PreviousRoutes,
}

impl ResolvedInternalRedirectPolicy {
    pub fn from_spec(
        spec: &crate::k8s::types::InternalRedirectPolicySpec,
    ) -> ResolvedInternalRedirectPolicy {
        let mut predicates = Vec::new();
        let allow_cross_scheme_redirect = match spec.allow_cross_scheme_redirect {
            AllowCrossSchemeRedirect::Never => false,
            AllowCrossSchemeRedirect::SafeOnly => {
                predicates.push(InternalRedirectPredicate::SafeCrossScheme);
                true
            }
            AllowCrossSchemeRedirect::Always => true,
        };
        if spec.deny_repeated_route_redirect {
            predicates.push(InternalRedirectPredicate::PreviousRoutes);
        }
        ResolvedInternalRedirectPolicy {
            max_internal_redirects: spec.max_internal_redirects,
            redirect_response_codes: spec.redirect_response_codes.clone(),
            predicates,
            allow_cross_scheme_redirect,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHostRewrite {
    pub literal: Option<String>,
    pub header: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMirrorPolicy {
    pub cluster_key: String,
    pub weight_percent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteExtAuthz {
    pub disabled: bool,
    pub context_extensions: std::collections::BTreeMap<String, String>,
}

/// A single route. Sort key (spec §4.2/§9) is computed over `conditions`
/// by [`crate::dag::sort::route_sort_key`]; sorting itself is applied once
/// by the builder, so the stored `Vec<Route>` on a vhost is already in its
/// final order.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub conditions: RouteConditions,
    pub action: RouteAction,
    /// When set, emitting this route onto the *insecure* vhost plane must
    /// produce a 301-to-HTTPS upgrade instead of `action` (spec §4.3 "Route
    /// translator specifics").
    pub force_ssl_redirect_on_insecure_plane: bool,
    pub enable_websockets: bool,
    pub request_headers: Option<crate::k8s::types::HeaderMutationSpec>,
    pub response_headers: Option<crate::k8s::types::HeaderMutationSpec>,
    pub retry: Option<ResolvedRetryPolicy>,
    pub timeout: Option<ResolvedTimeoutPolicy>,
    pub cors: Option<ResolvedCors>,
    pub rate_limit: Option<RateLimitPolicySpec>,
    pub ip_allow_deny: Vec<IpAllowDenySpec>,
    pub jwt_verification: Option<JwtVerificationPolicySpec>,
    pub ext_authz: Option<RouteExtAuthz>,
    pub mirror: Option<ResolvedMirrorPolicy>,
    pub host_rewrite: Option<ResolvedHostRewrite>,
    pub session_affinity: Option<SessionAffinitySpec>,
    pub internal_redirect: Option<ResolvedInternalRedirectPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamProtocol {
    Http11,
    H2c,
    H2,
    Tls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalancingPolicy {
    RoundRobin,
    WeightedLeastRequest,
    Random,
    RingHash,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckSpec {
    pub path: String,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamTlsValidation {
    pub ca_secret_key: String,
    pub subject_alt_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerSpec {
    pub max_connections: u32,
    pub max_pending_requests: u32,
    pub max_requests: u32,
    pub max_retries: u32,
}

/// One discovered (Service, Port, upstream-policy) combination. Identity is
/// the `key` string, not this struct's address — two `ClusterKind::Eds`
/// clusters with the same `key` coming from different builder runs are the
/// same logical cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub key: String,
    pub namespace: String,
    pub service_name: String,
    pub service_port: u16,
    pub kind: ClusterKind,
    pub upstream_protocol: UpstreamProtocol,
    pub load_balancing: LoadBalancingPolicy,
    pub health_check: Option<HealthCheckSpec>,
    pub tls_validation: Option<UpstreamTlsValidation>,
    pub client_certificate_secret_key: Option<String>,
    pub circuit_breaker: Option<CircuitBreakerSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterKind {
    /// Backed by a matching EndpointSlice stream; the string is the
    /// service-identity EDS cluster name shared by every policy variant of
    /// the same Service (spec §4.3 "Endpoint translator specifics").
    Eds { service_identity: String },
    /// A single DNS name resolved via `STRICT_DNS` (ExternalName Service or
    /// ExtensionService upstream).
    StrictDns { dns_name: String, sni_override: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    TlsCertificate,
    ValidationContext,
}

/// Resolved certificate material, identified by (namespace, name,
/// content-hash) flattened into `key` (spec §3 "Secret").
#[derive(Debug, Clone, PartialEq)]
pub struct Secret {
    pub key: String,
    pub kind: SecretKind,
    pub namespace: String,
    pub name: String,
    pub content_hash: String,
    pub tls_crt: Option<Vec<u8>>,
    pub tls_key: Option<Vec<u8>>,
    pub ca_bundle: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionServiceEntry {
    pub key: String,
    pub cluster_key: String,
}
