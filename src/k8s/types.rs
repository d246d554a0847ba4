//! # Watched Object Types
//!
//! Typed representations of every kind the informer collaborator delivers
//! (§6 "Input events"). These are intentionally slimmer than the real
//! Kubernetes API types: only the fields the DAG builder ever reads are
//! kept, so a snapshot comparison in [`crate::cache::ObjectCache`] excludes
//! `resourceVersion` / `managedFields` / `status` by construction rather
//! than by a denylist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds the control plane watches, per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Service,
    EndpointSlice,
    Secret,
    Ingress,
    HttpProxy,
    TlsCertificateDelegation,
    ExtensionService,
    Gateway,
    HttpRoute,
    TlsRoute,
    TcpRoute,
    ReferenceGrant,
    GatewayClass,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A namespace+name identity. Distinct from [`crate::config::NamespacedName`],
/// which names a static configuration reference rather than a live object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NsName {
    pub namespace: String,
    pub name: String,
}

impl NsName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for NsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Object identity as stored in the cache: kind plus namespaced name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub nsname: NsName,
}

impl ObjectKey {
    pub fn new(kind: ObjectKind, nsname: NsName) -> Self {
        Self { kind, nsname }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.nsname)
    }
}

/// Metadata common to every watched object, used for uniqueness tie-breaks
/// (§4.2 FQDN conflict, §8 "oldest creation timestamp") and status emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    pub creation_timestamp: DateTime<Utc>,
    pub generation: i64,
    pub annotations: std::collections::BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn nsname(&self) -> NsName {
        NsName::new(self.namespace.clone(), self.name.clone())
    }
}

/// A port on a `Service`, identified by either name or number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: Option<String>,
    pub port: u16,
    pub target_port: Option<u16>,
    pub app_protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceObject {
    pub meta: ObjectMeta,
    pub ports: Vec<ServicePort>,
    /// Set when this is an ExternalName service (§3 "ExternalName cluster").
    pub external_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAddress {
    pub ip: String,
    pub ready: bool,
}

/// A single EndpointSlice. Real EndpointSlices are sharded per-service;
/// the endpoint translator aggregates all slices for a service identity
/// before computing a `ClusterLoadAssignment` (§4.3 "Endpoint translator
/// specifics").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSliceObject {
    pub meta: ObjectMeta,
    /// The owning Service name (from the `kubernetes.io/service-name` label).
    pub service_name: String,
    pub port_name: Option<String>,
    pub port: u16,
    pub addresses: Vec<EndpointAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretKind {
    Tls,
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretObject {
    pub meta: ObjectMeta,
    pub kind: SecretKind,
    /// PEM certificate chain (TLS) or CA bundle (Opaque), raw bytes.
    pub tls_crt: Option<Vec<u8>>,
    pub tls_key: Option<Vec<u8>>,
    pub ca_bundle: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressBackend {
    pub service_name: String,
    pub service_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressPathRule {
    pub path: Option<String>,
    pub path_type: IngressPathType,
    pub backend: IngressBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngressPathType {
    Exact,
    Prefix,
    ImplementationSpecific,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    /// `None` / empty host means the wildcard `*` host.
    pub host: Option<String>,
    pub paths: Vec<IngressPathRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressTls {
    pub hosts: Vec<String>,
    pub secret_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressObject {
    pub meta: ObjectMeta,
    pub rules: Vec<IngressRule>,
    pub tls: Vec<IngressTls>,
    pub default_backend: Option<IngressBackend>,
    /// `projectcontour.io/tls-cert-namespace`-style annotation permitting a
    /// cross-namespace secret reference without a TLSCertificateDelegation.
    pub cross_namespace_secret_annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsCertificateDelegationObject {
    pub meta: ObjectMeta,
    /// secret name (in this object's own namespace) -> target namespaces
    /// allowed to reference it. `["*"]` is the wildcard.
    pub delegations: Vec<DelegationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationEntry {
    pub secret_name: String,
    pub target_namespaces: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtensionProtocolVersion {
    V2,
    V3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionServiceObject {
    pub meta: ObjectMeta,
    pub services: Vec<IngressBackend>,
    pub protocol_version: ExtensionProtocolVersion,
    pub timeout_policy_response_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayObject {
    pub meta: ObjectMeta,
    pub gateway_class_name: String,
    pub listener_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRouteObject {
    pub meta: ObjectMeta,
    pub hostnames: Vec<String>,
    pub rules: Vec<HttpRouteRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRouteRule {
    pub path_prefix: Option<String>,
    pub path_exact: Option<String>,
    pub backend_refs: Vec<IngressBackend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsRouteObject {
    pub meta: ObjectMeta,
    pub sni_names: Vec<String>,
    pub backend_refs: Vec<IngressBackend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpRouteObject {
    pub meta: ObjectMeta,
    pub backend_refs: Vec<IngressBackend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceGrantObject {
    pub meta: ObjectMeta,
    pub from_namespaces: Vec<String>,
    pub to_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayClassObject {
    pub meta: ObjectMeta,
    pub controller_name: String,
}

// --- HTTPProxy, the richest input kind; see spec §3/§4.2. ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowCrossSchemeRedirect {
    Never,
    SafeOnly,
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalRedirectPolicySpec {
    pub max_internal_redirects: u32,
    pub redirect_response_codes: Vec<u32>,
    pub deny_repeated_route_redirect: bool,
    pub allow_cross_scheme_redirect: AllowCrossSchemeRedirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsPolicySpec {
    pub allow_origin: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Go-style duration string, e.g. `"10m"`, `"0s"`, `"-10m"`.
    pub max_age: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimitDescriptorEntry {
    RemoteAddress,
    GenericKey(String),
    RequestHeader { header_name: String, descriptor_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicySpec {
    pub descriptors: Vec<RateLimitDescriptorEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPolicySpec {
    pub disabled: bool,
    pub context_extensions: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtVerificationPolicySpec {
    pub require_any: Vec<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSpec {
    pub secret_name: Option<String>,
    pub secret_namespace: Option<String>,
    pub minimum_tls_version: Option<String>,
    pub maximum_tls_version: Option<String>,
    pub passthrough: bool,
    pub client_validation_ca_secret: Option<String>,
    pub enable_fallback_certificate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualHostSpec {
    pub fqdn: String,
    pub tls: Option<TlsSpec>,
    pub cors_policy: Option<CorsPolicySpec>,
    pub rate_limit_policy: Option<RateLimitPolicySpec>,
    pub authorization: Option<AuthPolicySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathConditionSpec {
    Prefix(String),
    Exact(String),
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderConditionSpec {
    pub name: String,
    pub present: bool,
    pub exact: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConditionsSpec {
    pub path: Option<PathConditionSpec>,
    pub headers: Vec<HeaderConditionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteServiceSpec {
    pub name: String,
    pub port: u16,
    pub weight: u32,
    pub upstream_protocol: Option<String>,
    pub validation_ca_secret: Option<String>,
    pub validation_subject_name: Option<String>,
    /// `RoundRobin` | `WeightedLeastRequest` | `Random` | `RingHash`.
    /// Session affinity on the owning route overrides this to `RingHash`
    /// regardless of what is set here.
    pub load_balancing_policy: Option<String>,
    pub health_check: Option<HealthCheckPolicySpec>,
    pub circuit_breaker: Option<CircuitBreakerPolicySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckPolicySpec {
    pub path: String,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerPolicySpec {
    pub max_connections: u32,
    pub max_pending_requests: u32,
    pub max_requests: u32,
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicySpec {
    pub response_timeout: Option<String>,
    pub idle_timeout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicySpec {
    pub num_retries: i32,
    pub retry_on: Option<String>,
    pub per_try_timeout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMutationSpec {
    pub set: std::collections::BTreeMap<String, String>,
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRewriteSpec {
    pub literal: Option<String>,
    pub header: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorPolicySpec {
    pub service_name: String,
    pub service_port: u16,
    pub weight_percent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAffinitySpec {
    pub cookie_name: String,
    pub ttl_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAllowDenySpec {
    pub cidr: String,
    pub allow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectPathRewrite {
    None,
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectPolicySpec {
    pub hostname: Option<String>,
    pub scheme: Option<String>,
    pub status_code: u32,
    pub path_rewrite: RedirectPathRewrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectResponseSpec {
    pub status_code: u32,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteActionSpec {
    Services(Vec<RouteServiceSpec>),
    Redirect(RedirectPolicySpec),
    DirectResponse(DirectResponseSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub conditions: RouteConditionsSpec,
    pub action: RouteActionSpec,
    pub permit_insecure: bool,
    pub enable_websockets: bool,
    pub timeout_policy: Option<TimeoutPolicySpec>,
    pub retry_policy: Option<RetryPolicySpec>,
    pub rate_limit_policy: Option<RateLimitPolicySpec>,
    pub cors_policy: Option<CorsPolicySpec>,
    pub request_headers_policy: Option<HeaderMutationSpec>,
    pub response_headers_policy: Option<HeaderMutationSpec>,
    pub host_rewrite: Option<HostRewriteSpec>,
    pub mirror_policy: Option<MirrorPolicySpec>,
    pub session_affinity: Option<SessionAffinitySpec>,
    pub ip_allow_deny: Vec<IpAllowDenySpec>,
    pub jwt_verification_policy: Option<JwtVerificationPolicySpec>,
    pub authorization: Option<AuthPolicySpec>,
    pub internal_redirect_policy: Option<InternalRedirectPolicySpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeSpec {
    pub name: String,
    pub namespace: Option<String>,
    pub conditions: RouteConditionsSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpProxySpec {
    pub services: Vec<RouteServiceSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProxyObject {
    pub meta: ObjectMeta,
    pub virtualhost: Option<VirtualHostSpec>,
    pub routes: Vec<RouteSpec>,
    pub includes: Vec<IncludeSpec>,
    pub tcpproxy: Option<TcpProxySpec>,
}

/// A single cached object, tagged with its kind for dispatch in the
/// DAG builder passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WatchedObject {
    Service(ServiceObject),
    EndpointSlice(EndpointSliceObject),
    Secret(SecretObject),
    Ingress(IngressObject),
    HttpProxy(HttpProxyObject),
    TlsCertificateDelegation(TlsCertificateDelegationObject),
    ExtensionService(ExtensionServiceObject),
    Gateway(GatewayObject),
    HttpRoute(HttpRouteObject),
    TlsRoute(TlsRouteObject),
    TcpRoute(TcpRouteObject),
    ReferenceGrant(ReferenceGrantObject),
    GatewayClass(GatewayClassObject),
}

impl WatchedObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            WatchedObject::Service(_) => ObjectKind::Service,
            WatchedObject::EndpointSlice(_) => ObjectKind::EndpointSlice,
            WatchedObject::Secret(_) => ObjectKind::Secret,
            WatchedObject::Ingress(_) => ObjectKind::Ingress,
            WatchedObject::HttpProxy(_) => ObjectKind::HttpProxy,
            WatchedObject::TlsCertificateDelegation(_) => ObjectKind::TlsCertificateDelegation,
            WatchedObject::ExtensionService(_) => ObjectKind::ExtensionService,
            WatchedObject::Gateway(_) => ObjectKind::Gateway,
            WatchedObject::HttpRoute(_) => ObjectKind::HttpRoute,
            WatchedObject::TlsRoute(_) => ObjectKind::TlsRoute,
            WatchedObject::TcpRoute(_) => ObjectKind::TcpRoute,
            WatchedObject::ReferenceGrant(_) => ObjectKind::ReferenceGrant,
            WatchedObject::GatewayClass(_) => ObjectKind::GatewayClass,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            WatchedObject::Service(o) => &o.meta,
            WatchedObject::EndpointSlice(o) => &o.meta,
            WatchedObject::Secret(o) => &o.meta,
            WatchedObject::Ingress(o) => &o.meta,
            WatchedObject::HttpProxy(o) => &o.meta,
            WatchedObject::TlsCertificateDelegation(o) => &o.meta,
            WatchedObject::ExtensionService(o) => &o.meta,
            WatchedObject::Gateway(o) => &o.meta,
            WatchedObject::HttpRoute(o) => &o.meta,
            WatchedObject::TlsRoute(o) => &o.meta,
            WatchedObject::TcpRoute(o) => &o.meta,
            WatchedObject::ReferenceGrant(o) => &o.meta,
            WatchedObject::GatewayClass(o) => &o.meta,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind(), self.meta().nsname())
    }
}
