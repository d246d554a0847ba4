//! # Gateway API Resources
//!
//! Slimmed `kube::CustomResource` shapes for the subset of the Gateway API
//! this control plane's root-object pass understands (`Gateway`,
//! `HTTPRoute`, `TLSRoute`, `TCPRoute`, `ReferenceGrant`, `GatewayClass`).
//! Full Gateway API conformance is out of scope; these exist so the
//! informer adapter and the DAG builder have something concrete to consume
//! for the kinds named in spec §6.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    GatewayClassObject, GatewayObject, HttpRouteObject, HttpRouteRule, IngressBackend, ObjectMeta,
    ReferenceGrantObject, TcpRouteObject, TlsRouteObject,
};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(group = "gateway.networking.k8s.io", version = "v1", kind = "Gateway", namespaced)]
pub struct GatewaySpecCrd {
    pub gateway_class_name: String,
    #[serde(default)]
    pub listeners: Vec<GatewayListenerCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GatewayListenerCrd {
    pub name: String,
    pub port: u16,
    pub protocol: String,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(group = "gateway.networking.k8s.io", version = "v1", kind = "HTTPRoute", namespaced)]
pub struct HttpRouteSpecCrd {
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub rules: Vec<HttpRouteRuleCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HttpRouteRuleCrd {
    #[serde(default)]
    pub matches: Vec<HttpRouteMatchCrd>,
    #[serde(default)]
    pub backend_refs: Vec<BackendRefCrd>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HttpRouteMatchCrd {
    pub path_prefix: Option<String>,
    pub path_exact: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackendRefCrd {
    pub name: String,
    pub port: u16,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(group = "gateway.networking.k8s.io", version = "v1alpha2", kind = "TLSRoute", namespaced)]
pub struct TlsRouteSpecCrd {
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub backend_refs: Vec<BackendRefCrd>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(group = "gateway.networking.k8s.io", version = "v1alpha2", kind = "TCPRoute", namespaced)]
pub struct TcpRouteSpecCrd {
    #[serde(default)]
    pub backend_refs: Vec<BackendRefCrd>,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1beta1",
    kind = "ReferenceGrant",
    namespaced
)]
pub struct ReferenceGrantSpecCrd {
    #[serde(default)]
    pub from: Vec<ReferenceGrantFromCrd>,
    pub to_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceGrantFromCrd {
    pub namespace: String,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(group = "gateway.networking.k8s.io", version = "v1", kind = "GatewayClass")]
pub struct GatewayClassSpecCrd {
    pub controller_name: String,
}

impl GatewaySpecCrd {
    pub fn into_object(self, meta: ObjectMeta) -> GatewayObject {
        GatewayObject {
            meta,
            gateway_class_name: self.gateway_class_name,
            listener_names: self.listeners.into_iter().map(|l| l.name).collect(),
        }
    }
}

impl HttpRouteSpecCrd {
    pub fn into_object(self, meta: ObjectMeta) -> HttpRouteObject {
        HttpRouteObject {
            meta,
            hostnames: self.hostnames,
            rules: self
                .rules
                .into_iter()
                .map(|r| {
                    let m = r.matches.into_iter().next();
                    HttpRouteRule {
                        path_prefix: m.as_ref().and_then(|m| m.path_prefix.clone()),
                        path_exact: m.and_then(|m| m.path_exact),
                        backend_refs: r
                            .backend_refs
                            .into_iter()
                            .map(|b| IngressBackend { service_name: b.name, service_port: b.port })
                            .collect(),
                    }
                })
                .collect(),
        }
    }
}

impl TlsRouteSpecCrd {
    pub fn into_object(self, meta: ObjectMeta) -> TlsRouteObject {
        TlsRouteObject {
            meta,
            sni_names: self.hostnames,
            backend_refs: self
                .backend_refs
                .into_iter()
                .map(|b| IngressBackend { service_name: b.name, service_port: b.port })
                .collect(),
        }
    }
}

impl TcpRouteSpecCrd {
    pub fn into_object(self, meta: ObjectMeta) -> TcpRouteObject {
        TcpRouteObject {
            meta,
            backend_refs: self
                .backend_refs
                .into_iter()
                .map(|b| IngressBackend { service_name: b.name, service_port: b.port })
                .collect(),
        }
    }
}

impl ReferenceGrantSpecCrd {
    pub fn into_object(self, meta: ObjectMeta) -> ReferenceGrantObject {
        ReferenceGrantObject {
            meta,
            from_namespaces: self.from.into_iter().map(|f| f.namespace).collect(),
            to_name: self.to_name,
        }
    }
}

impl GatewayClassSpecCrd {
    pub fn into_object(self, meta: ObjectMeta) -> GatewayClassObject {
        GatewayClassObject { meta, controller_name: self.controller_name }
    }
}
