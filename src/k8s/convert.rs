//! # Native Kubernetes Type Conversions
//!
//! `From`-style conversions from `k8s-openapi` wire types into the internal
//! `*Object` representations, the native-kind counterpart to the
//! `into_object` methods on the CRD and Gateway API wire shapes in
//! [`crate::k8s::crds`] and [`crate::k8s::gateway_api`]. Kept separate from
//! `types.rs` since that module holds the internal model, not the seam to
//! the upstream wire format.

use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::discovery::v1::EndpointSlice;
use k8s_openapi::api::networking::v1::Ingress;

use super::types::{
    EndpointAddress, EndpointSliceObject, IngressBackend, IngressObject, IngressPathRule,
    IngressPathType, IngressRule, IngressTls, ObjectMeta, SecretKind, SecretObject, ServiceObject,
    ServicePort,
};

const CROSS_NAMESPACE_SECRET_ANNOTATION: &str = "projectcontour.io/tls-cert-namespace";

pub fn service_to_object(meta: ObjectMeta, svc: Service) -> ServiceObject {
    let spec = svc.spec.unwrap_or_default();
    let ports = spec
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|p| ServicePort {
            name: p.name,
            port: p.port as u16,
            target_port: match p.target_port {
                Some(k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(v)) => {
                    Some(v as u16)
                }
                _ => None,
            },
            app_protocol: p.app_protocol,
        })
        .collect();

    let external_name =
        if spec.type_.as_deref() == Some("ExternalName") { spec.external_name } else { None };

    ServiceObject { meta, ports, external_name }
}

/// Internal `EndpointSliceObject`s key one port per object (spec §3
/// `service_identity`), but a real EndpointSlice can carry several. The
/// cache key is the slice's own name, so only the first port the slice
/// lists reaches the endpoint translator for a given slice; multi-port
/// Services should shard their ports across distinct EndpointSlices, which
/// the EndpointSlice controller already does for headless/multi-protocol
/// Services.
pub fn endpoint_slice_to_object(meta: ObjectMeta, slice: EndpointSlice) -> Option<EndpointSliceObject> {
    let service_name = meta
        .annotations
        .get("kubernetes.io/service-name")
        .cloned()
        .unwrap_or_else(|| meta.name.clone());

    let addresses: Vec<EndpointAddress> = slice
        .endpoints
        .iter()
        .flat_map(|ep| {
            let ready = ep.conditions.as_ref().and_then(|c| c.ready).unwrap_or(true);
            ep.addresses.iter().map(move |ip| EndpointAddress { ip: ip.clone(), ready })
        })
        .collect();

    let port = slice.ports.unwrap_or_default().into_iter().next()?;

    Some(EndpointSliceObject {
        meta,
        service_name,
        port_name: port.name,
        port: port.port? as u16,
        addresses,
    })
}

pub fn secret_to_object(meta: ObjectMeta, secret: Secret) -> Option<SecretObject> {
    let data = secret.data.unwrap_or_default();
    let secret_type = secret.type_.as_deref().unwrap_or("Opaque");

    let kind = if secret_type == "kubernetes.io/tls" { SecretKind::Tls } else { SecretKind::Opaque };

    Some(SecretObject {
        meta,
        kind,
        tls_crt: data.get("tls.crt").map(|b| b.0.clone()),
        tls_key: data.get("tls.key").map(|b| b.0.clone()),
        ca_bundle: data.get("ca.crt").map(|b| b.0.clone()),
    })
}

pub fn ingress_to_object(meta: ObjectMeta, ingress: Ingress) -> IngressObject {
    let spec = ingress.spec.unwrap_or_default();

    let rules = spec
        .rules
        .unwrap_or_default()
        .into_iter()
        .filter_map(|rule| {
            let http = rule.http?;
            let paths = http
                .paths
                .into_iter()
                .filter_map(|path| {
                    let backend = ingress_backend(&path.backend)?;
                    let path_type = match path.path_type.as_str() {
                        "Exact" => IngressPathType::Exact,
                        "Prefix" => IngressPathType::Prefix,
                        _ => IngressPathType::ImplementationSpecific,
                    };
                    Some(IngressPathRule { path: path.path, path_type, backend })
                })
                .collect();
            Some(IngressRule { host: rule.host, paths })
        })
        .collect();

    let tls = spec
        .tls
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| {
            Some(IngressTls { hosts: t.hosts.unwrap_or_default(), secret_name: t.secret_name? })
        })
        .collect();

    let default_backend = spec.default_backend.as_ref().and_then(ingress_backend);

    let cross_namespace_secret_annotation =
        meta.annotations.get(CROSS_NAMESPACE_SECRET_ANNOTATION).cloned();

    IngressObject { meta, rules, tls, default_backend, cross_namespace_secret_annotation }
}

fn ingress_backend(
    backend: &k8s_openapi::api::networking::v1::IngressBackend,
) -> Option<IngressBackend> {
    let service = backend.service.as_ref()?;
    let port = service.port.as_ref()?;
    let port_number = port.number.map(|n| n as u16)?;
    Some(IngressBackend { service_name: service.name.clone(), service_port: port_number })
}
