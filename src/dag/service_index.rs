//! # Service + Endpoint Pass
//!
//! Spec §4.2 pass 1: index services by (namespace, name) and resolve the
//! numeric port a route's service reference names against the Service's
//! declared ports.

use std::collections::BTreeMap;

use crate::cache::Snapshot;
use crate::k8s::types::{ObjectKind, ServiceObject, WatchedObject};

#[derive(Debug, Clone, Default)]
pub struct ServiceIndex {
    services: BTreeMap<(String, String), ServiceObject>,
}

impl ServiceIndex {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut services = BTreeMap::new();
        for (_, object) in snapshot.of_kind(ObjectKind::Service) {
            if let WatchedObject::Service(service) = object {
                services.insert(
                    (service.meta.namespace.clone(), service.meta.name.clone()),
                    service.clone(),
                );
            }
        }
        Self { services }
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&ServiceObject> {
        self.services.get(&(namespace.to_string(), name.to_string()))
    }

    /// Resolves a requested numeric port against the Service's declared
    /// ports. Returns `None` if the Service is missing or does not
    /// advertise that port (spec §4.2 "missing/invalid port on a Service
    /// reference").
    pub fn resolve_port(&self, namespace: &str, name: &str, port: u16) -> Option<u16> {
        let service = self.get(namespace, name)?;
        service.ports.iter().find(|p| p.port == port).map(|p| p.port)
    }
}
