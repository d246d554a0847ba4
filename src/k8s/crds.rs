//! # Custom Resource Definitions
//!
//! `kube::CustomResource` wire shapes for the three Contour-style CRDs this
//! control plane owns. These mirror the on-wire CRD spec field-for-field;
//! [`crate::k8s::types`] holds the slimmer internal representation the DAG
//! builder actually consumes, and `From<...Crd> for ...Object` below is the
//! seam between them.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::*;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "projectcontour.io",
    version = "v1",
    kind = "HTTPProxy",
    namespaced,
    status = "HttpProxyStatus"
)]
pub struct HttpProxySpecCrd {
    pub virtualhost: Option<VirtualHostCrd>,
    #[serde(default)]
    pub routes: Vec<RouteCrd>,
    #[serde(default)]
    pub includes: Vec<IncludeCrd>,
    pub tcpproxy: Option<TcpProxyCrd>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HttpProxyStatus {
    #[serde(default)]
    pub current_status: String,
    #[serde(default)]
    pub description: String,
    pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VirtualHostCrd {
    pub fqdn: String,
    pub tls: Option<TlsCrd>,
    pub cors_policy: Option<CorsPolicyCrd>,
    pub rate_limit_policy: Option<RateLimitPolicyCrd>,
    pub authorization: Option<AuthPolicyCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TlsCrd {
    pub secret_name: Option<String>,
    pub minimum_tls_version: Option<String>,
    pub maximum_tls_version: Option<String>,
    #[serde(default)]
    pub passthrough: bool,
    pub client_validation: Option<ClientValidationCrd>,
    #[serde(default)]
    pub enable_fallback_certificate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientValidationCrd {
    pub ca_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CorsPolicyCrd {
    #[serde(default)]
    pub allow_origin: Vec<String>,
    #[serde(default)]
    pub allow_methods: Vec<String>,
    #[serde(default)]
    pub allow_headers: Vec<String>,
    #[serde(default)]
    pub expose_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
    #[serde(default)]
    pub max_age: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitPolicyCrd {
    #[serde(default)]
    pub descriptors: Vec<RateLimitDescriptorCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitDescriptorCrd {
    pub remote_address: Option<bool>,
    pub generic_key: Option<String>,
    pub request_header: Option<RequestHeaderDescriptorCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestHeaderDescriptorCrd {
    pub header_name: String,
    pub descriptor_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuthPolicyCrd {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub context_extensions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RouteCrd {
    #[serde(default)]
    pub conditions: Vec<RouteConditionCrd>,
    #[serde(default)]
    pub services: Vec<RouteServiceCrd>,
    pub redirect_policy: Option<RedirectPolicyCrd>,
    pub direct_response_policy: Option<DirectResponseCrd>,
    #[serde(default)]
    pub permit_insecure: bool,
    #[serde(default)]
    pub enable_websockets: bool,
    pub timeout_policy: Option<TimeoutPolicyCrd>,
    pub retry_policy: Option<RetryPolicyCrd>,
    pub rate_limit_policy: Option<RateLimitPolicyCrd>,
    pub cors_policy: Option<CorsPolicyCrd>,
    pub request_headers_policy: Option<HeaderMutationCrd>,
    pub response_headers_policy: Option<HeaderMutationCrd>,
    pub host_rewrite_policy: Option<HostRewriteCrd>,
    pub mirror_policy: Option<MirrorPolicyCrd>,
    pub session_affinity_policy: Option<SessionAffinityCrd>,
    #[serde(default)]
    pub ip_allow_deny: Vec<IpAllowDenyCrd>,
    pub jwt_verification_policy: Option<JwtVerificationPolicyCrd>,
    pub authorization: Option<AuthPolicyCrd>,
    pub internal_redirect_policy: Option<InternalRedirectPolicyCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RouteConditionCrd {
    pub prefix: Option<String>,
    pub exact: Option<String>,
    pub regex: Option<String>,
    pub header: Option<HeaderConditionCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderConditionCrd {
    pub name: String,
    #[serde(default)]
    pub present: bool,
    pub exact: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RouteServiceCrd {
    pub name: String,
    pub port: u16,
    #[serde(default)]
    pub weight: u32,
    pub protocol: Option<String>,
    pub validation: Option<UpstreamValidationCrd>,
    pub load_balancing_policy: Option<String>,
    pub health_check_policy: Option<HealthCheckPolicyCrd>,
    pub circuit_breaker_policy: Option<CircuitBreakerPolicyCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpstreamValidationCrd {
    pub ca_secret: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthCheckPolicyCrd {
    pub path: String,
    #[serde(default = "default_health_check_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_health_check_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_health_check_threshold")]
    pub unhealthy_threshold: u32,
    #[serde(default = "default_health_check_threshold")]
    pub healthy_threshold: u32,
}

fn default_health_check_interval_seconds() -> u64 {
    10
}

fn default_health_check_timeout_seconds() -> u64 {
    2
}

fn default_health_check_threshold() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CircuitBreakerPolicyCrd {
    #[serde(default)]
    pub max_connections: u32,
    #[serde(default)]
    pub max_pending_requests: u32,
    #[serde(default)]
    pub max_requests: u32,
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RedirectPolicyCrd {
    pub hostname: Option<String>,
    pub scheme: Option<String>,
    #[serde(default)]
    pub status_code: u32,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DirectResponseCrd {
    pub status_code: u32,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TimeoutPolicyCrd {
    pub response: Option<String>,
    pub idle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetryPolicyCrd {
    #[serde(default)]
    pub num_retries: i32,
    pub retry_on: Option<String>,
    pub per_try_timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeaderMutationCrd {
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HostRewriteCrd {
    pub literal: Option<String>,
    pub header: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MirrorPolicyCrd {
    pub name: String,
    pub port: u16,
    pub weight: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionAffinityCrd {
    pub cookie_name: String,
    pub ttl_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IpAllowDenyCrd {
    pub cidr: String,
    #[serde(default)]
    pub allow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JwtVerificationPolicyCrd {
    #[serde(default)]
    pub require_any: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InternalRedirectPolicyCrd {
    #[serde(default)]
    pub max_internal_redirects: u32,
    #[serde(default)]
    pub redirect_response_codes: Vec<u32>,
    #[serde(default)]
    pub deny_repeated_route_redirect: bool,
    #[serde(default)]
    pub allow_cross_scheme_redirect: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IncludeCrd {
    pub name: String,
    pub namespace: Option<String>,
    #[serde(default)]
    pub conditions: Vec<RouteConditionCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TcpProxyCrd {
    #[serde(default)]
    pub services: Vec<RouteServiceCrd>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "projectcontour.io",
    version = "v1",
    kind = "TLSCertificateDelegation",
    namespaced
)]
pub struct TlsCertificateDelegationSpecCrd {
    pub delegations: Vec<CertDelegationCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CertDelegationCrd {
    pub secret_name: String,
    pub target_namespaces: Vec<String>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "projectcontour.io",
    version = "v1alpha1",
    kind = "ExtensionService",
    namespaced
)]
pub struct ExtensionServiceSpecCrd {
    pub services: Vec<RouteServiceCrd>,
    #[serde(default)]
    pub protocol_version: String,
    pub timeout_policy: Option<TimeoutPolicyCrd>,
}

fn parse_allow_cross_scheme(value: &str) -> AllowCrossSchemeRedirect {
    match value {
        "Always" => AllowCrossSchemeRedirect::Always,
        "SafeOnly" => AllowCrossSchemeRedirect::SafeOnly,
        _ => AllowCrossSchemeRedirect::Never,
    }
}

impl From<RouteConditionCrd> for HeaderConditionSpec {
    fn from(c: RouteConditionCrd) -> Self {
        let header = c.header.expect("header condition expected");
        HeaderConditionSpec { name: header.name, present: header.present, exact: header.exact }
    }
}

fn conditions_from_crd(raw: &[RouteConditionCrd]) -> RouteConditionsSpec {
    let mut out = RouteConditionsSpec::default();
    for c in raw {
        if let Some(p) = &c.prefix {
            out.path = Some(PathConditionSpec::Prefix(p.clone()));
        } else if let Some(e) = &c.exact {
            out.path = Some(PathConditionSpec::Exact(e.clone()));
        } else if let Some(r) = &c.regex {
            out.path = Some(PathConditionSpec::Regex(r.clone()));
        } else if let Some(h) = &c.header {
            out.headers.push(HeaderConditionSpec {
                name: h.name.clone(),
                present: h.present,
                exact: h.exact.clone(),
            });
        }
    }
    out
}

fn descriptors_from_crd(policy: &RateLimitPolicyCrd) -> RateLimitPolicySpec {
    let descriptors = policy
        .descriptors
        .iter()
        .map(|d| {
            if let Some(key) = &d.generic_key {
                RateLimitDescriptorEntry::GenericKey(key.clone())
            } else if let Some(h) = &d.request_header {
                RateLimitDescriptorEntry::RequestHeader {
                    header_name: h.header_name.clone(),
                    descriptor_key: h.descriptor_key.clone(),
                }
            } else {
                RateLimitDescriptorEntry::RemoteAddress
            }
        })
        .collect();
    RateLimitPolicySpec { descriptors }
}

impl RouteServiceCrd {
    fn into_spec(self) -> RouteServiceSpec {
        RouteServiceSpec {
            name: self.name,
            port: self.port,
            weight: self.weight,
            upstream_protocol: self.protocol,
            validation_ca_secret: self.validation.as_ref().map(|v| v.ca_secret.clone()),
            validation_subject_name: self.validation.map(|v| v.subject_name),
            load_balancing_policy: self.load_balancing_policy,
            health_check: self.health_check_policy.map(|h| HealthCheckPolicySpec {
                path: h.path,
                interval_seconds: h.interval_seconds,
                timeout_seconds: h.timeout_seconds,
                unhealthy_threshold: h.unhealthy_threshold,
                healthy_threshold: h.healthy_threshold,
            }),
            circuit_breaker: self.circuit_breaker_policy.map(|c| CircuitBreakerPolicySpec {
                max_connections: c.max_connections,
                max_pending_requests: c.max_pending_requests,
                max_requests: c.max_requests,
                max_retries: c.max_retries,
            }),
        }
    }
}

impl RouteCrd {
    fn into_spec(self) -> RouteSpec {
        let action = if let Some(redirect) = self.redirect_policy {
            RouteActionSpec::Redirect(RedirectPolicySpec {
                hostname: redirect.hostname,
                scheme: redirect.scheme,
                status_code: if redirect.status_code == 0 { 302 } else { redirect.status_code },
                path_rewrite: redirect
                    .path
                    .map(RedirectPathRewrite::Literal)
                    .unwrap_or(RedirectPathRewrite::None),
            })
        } else if let Some(dr) = self.direct_response_policy {
            RouteActionSpec::DirectResponse(DirectResponseSpec {
                status_code: dr.status_code,
                body: dr.body,
            })
        } else {
            RouteActionSpec::Services(
                self.services.into_iter().map(RouteServiceCrd::into_spec).collect(),
            )
        };

        RouteSpec {
            conditions: conditions_from_crd(&self.conditions),
            action,
            permit_insecure: self.permit_insecure,
            enable_websockets: self.enable_websockets,
            timeout_policy: self.timeout_policy.map(|t| TimeoutPolicySpec {
                response_timeout: t.response,
                idle_timeout: t.idle,
            }),
            retry_policy: self.retry_policy.map(|r| RetryPolicySpec {
                num_retries: r.num_retries,
                retry_on: r.retry_on,
                per_try_timeout: r.per_try_timeout,
            }),
            rate_limit_policy: self.rate_limit_policy.as_ref().map(descriptors_from_crd),
            cors_policy: self.cors_policy.map(Into::into),
            request_headers_policy: self.request_headers_policy.map(Into::into),
            response_headers_policy: self.response_headers_policy.map(Into::into),
            host_rewrite: self
                .host_rewrite_policy
                .map(|h| HostRewriteSpec { literal: h.literal, header: h.header }),
            mirror_policy: self.mirror_policy.map(|m| MirrorPolicySpec {
                service_name: m.name,
                service_port: m.port,
                weight_percent: m.weight,
            }),
            session_affinity: self.session_affinity_policy.map(|s| SessionAffinitySpec {
                cookie_name: s.cookie_name,
                ttl_seconds: s.ttl_seconds,
            }),
            ip_allow_deny: self
                .ip_allow_deny
                .into_iter()
                .map(|i| IpAllowDenySpec { cidr: i.cidr, allow: i.allow })
                .collect(),
            jwt_verification_policy: self.jwt_verification_policy.map(|j| {
                JwtVerificationPolicySpec { require_any: j.require_any, disabled: j.disabled }
            }),
            authorization: self.authorization.map(Into::into),
            internal_redirect_policy: self.internal_redirect_policy.map(|p| {
                InternalRedirectPolicySpec {
                    max_internal_redirects: p.max_internal_redirects,
                    redirect_response_codes: p.redirect_response_codes,
                    deny_repeated_route_redirect: p.deny_repeated_route_redirect,
                    allow_cross_scheme_redirect: parse_allow_cross_scheme(
                        &p.allow_cross_scheme_redirect,
                    ),
                }
            }),
        }
    }
}

impl From<HeaderMutationCrd> for HeaderMutationSpec {
    fn from(h: HeaderMutationCrd) -> Self {
        HeaderMutationSpec { set: h.set, remove: h.remove }
    }
}

impl From<CorsPolicyCrd> for CorsPolicySpec {
    fn from(c: CorsPolicyCrd) -> Self {
        CorsPolicySpec {
            allow_origin: c.allow_origin,
            allow_methods: c.allow_methods,
            allow_headers: c.allow_headers,
            expose_headers: c.expose_headers,
            allow_credentials: c.allow_credentials,
            max_age: c.max_age,
        }
    }
}

impl From<AuthPolicyCrd> for AuthPolicySpec {
    fn from(a: AuthPolicyCrd) -> Self {
        AuthPolicySpec { disabled: a.disabled, context_extensions: a.context_extensions }
    }
}

impl HttpProxySpecCrd {
    /// Convert the wire CRD shape into the builder's internal representation.
    pub fn into_object(self, meta: ObjectMeta) -> HttpProxyObject {
        HttpProxyObject {
            meta,
            virtualhost: self.virtualhost.map(|v| VirtualHostSpec {
                fqdn: v.fqdn,
                tls: v.tls.map(|t| TlsSpec {
                    secret_name: t.secret_name,
                    secret_namespace: None,
                    minimum_tls_version: t.minimum_tls_version,
                    maximum_tls_version: t.maximum_tls_version,
                    passthrough: t.passthrough,
                    client_validation_ca_secret: t.client_validation.map(|c| c.ca_secret),
                    enable_fallback_certificate: t.enable_fallback_certificate,
                }),
                cors_policy: v.cors_policy.map(Into::into),
                rate_limit_policy: v.rate_limit_policy.as_ref().map(descriptors_from_crd),
                authorization: v.authorization.map(Into::into),
            }),
            routes: self.routes.into_iter().map(RouteCrd::into_spec).collect(),
            includes: self
                .includes
                .into_iter()
                .map(|i| IncludeSpec {
                    name: i.name,
                    namespace: i.namespace,
                    conditions: conditions_from_crd(&i.conditions),
                })
                .collect(),
            tcpproxy: self.tcpproxy.map(|t| TcpProxySpec {
                services: t.services.into_iter().map(RouteServiceCrd::into_spec).collect(),
            }),
        }
    }
}

impl TlsCertificateDelegationSpecCrd {
    pub fn into_object(self, meta: ObjectMeta) -> TlsCertificateDelegationObject {
        TlsCertificateDelegationObject {
            meta,
            delegations: self
                .delegations
                .into_iter()
                .map(|d| DelegationEntry {
                    secret_name: d.secret_name,
                    target_namespaces: d.target_namespaces,
                })
                .collect(),
        }
    }
}

impl ExtensionServiceSpecCrd {
    pub fn into_object(self, meta: ObjectMeta) -> ExtensionServiceObject {
        ExtensionServiceObject {
            meta,
            services: self
                .services
                .into_iter()
                .map(|s| IngressBackend { service_name: s.name, service_port: s.port })
                .collect(),
            protocol_version: if self.protocol_version == "v2" {
                ExtensionProtocolVersion::V2
            } else {
                ExtensionProtocolVersion::V3
            },
            timeout_policy_response_seconds: None,
        }
    }
}
