//! # Delegation Pass
//!
//! Builds the permission set `(secret-ns, secret-name) -> allowed target
//! namespaces` from every `TLSCertificateDelegation` object in the
//! snapshot (spec §4.2 pass 3), plus the Gateway API's equivalent
//! `ReferenceGrant` objects (spec §6 "cross-namespace references"):
//! a `ReferenceGrant` in the secret's own namespace names the source
//! namespaces permitted to reference it, and optionally a single secret
//! name (`to_name: None` grants every secret in that namespace). Delegation
//! soundness (spec §8) reduces to: a cross-namespace secret reference is
//! visible iff this set says so, or (for Ingress) the source object
//! carries the permitted annotation.

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::Snapshot;
use crate::k8s::types::ObjectKind;

/// `*` target namespace, meaning "any namespace may reference this secret".
pub const WILDCARD_NAMESPACE: &str = "*";

#[derive(Debug, Clone, Default)]
pub struct DelegationSet {
    /// (secret namespace, secret name) -> allowed target namespaces. A
    /// `WILDCARD_NAMESPACE` entry in the set means "all namespaces".
    permissions: BTreeMap<(String, String), BTreeSet<String>>,
    /// secret namespace -> source namespaces permitted to reference *any*
    /// secret in that namespace, from `ReferenceGrant`s with `to_name: None`.
    namespace_wide: BTreeMap<String, BTreeSet<String>>,
}

impl DelegationSet {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut permissions: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
        let mut namespace_wide: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (_, object) in snapshot.of_kind(ObjectKind::TlsCertificateDelegation) {
            let crate::k8s::types::WatchedObject::TlsCertificateDelegation(delegation) = object
            else {
                continue;
            };
            let secret_namespace = delegation.meta.namespace.clone();
            for entry in &delegation.delegations {
                let key = (secret_namespace.clone(), entry.secret_name.clone());
                permissions.entry(key).or_default().extend(entry.target_namespaces.iter().cloned());
            }
        }

        for (_, object) in snapshot.of_kind(ObjectKind::ReferenceGrant) {
            let crate::k8s::types::WatchedObject::ReferenceGrant(grant) = object else { continue };
            let secret_namespace = grant.meta.namespace.clone();
            match &grant.to_name {
                Some(name) => {
                    let key = (secret_namespace, name.clone());
                    permissions.entry(key).or_default().extend(grant.from_namespaces.iter().cloned());
                }
                None => {
                    namespace_wide
                        .entry(secret_namespace)
                        .or_default()
                        .extend(grant.from_namespaces.iter().cloned());
                }
            }
        }

        Self { permissions, namespace_wide }
    }

    /// Whether a root object in `target_namespace` may reference the
    /// secret identified by `(secret_namespace, secret_name)`. References
    /// within the same namespace are always permitted implicitly.
    pub fn is_permitted(
        &self,
        secret_namespace: &str,
        secret_name: &str,
        target_namespace: &str,
    ) -> bool {
        if secret_namespace == target_namespace {
            return true;
        }
        if let Some(targets) = self.permissions.get(&(secret_namespace.to_string(), secret_name.to_string())) {
            if targets.contains(WILDCARD_NAMESPACE) || targets.contains(target_namespace) {
                return true;
            }
        }
        self.namespace_wide
            .get(secret_namespace)
            .map(|targets| targets.contains(WILDCARD_NAMESPACE) || targets.contains(target_namespace))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::types::{DelegationEntry, ObjectMeta, TlsCertificateDelegationObject, WatchedObject};
    use chrono::Utc;

    fn snapshot_with_delegation(secret_name: &str, targets: Vec<&str>) -> Snapshot {
        let (cache, _rx) = crate::cache::ObjectCache::new();
        cache.upsert(WatchedObject::TlsCertificateDelegation(TlsCertificateDelegationObject {
            meta: ObjectMeta {
                namespace: "secret-ns".into(),
                name: "delegation".into(),
                creation_timestamp: Utc::now(),
                generation: 1,
                annotations: Default::default(),
            },
            delegations: vec![DelegationEntry {
                secret_name: secret_name.into(),
                target_namespaces: targets.into_iter().map(String::from).collect(),
            }],
        }));
        cache.snapshot()
    }

    #[test]
    fn same_namespace_reference_always_permitted() {
        let set = DelegationSet::default();
        assert!(set.is_permitted("ns", "secret", "ns"));
    }

    #[test]
    fn cross_namespace_without_delegation_denied() {
        let set = DelegationSet::default();
        assert!(!set.is_permitted("secret-ns", "wildcard", "app-ns"));
    }

    #[test]
    fn cross_namespace_with_explicit_delegation_permitted() {
        let snapshot = snapshot_with_delegation("wildcard", vec!["app-ns"]);
        let set = DelegationSet::build(&snapshot);
        assert!(set.is_permitted("secret-ns", "wildcard", "app-ns"));
        assert!(!set.is_permitted("secret-ns", "wildcard", "other-ns"));
    }

    #[test]
    fn wildcard_target_permits_any_namespace() {
        let snapshot = snapshot_with_delegation("wildcard", vec!["*"]);
        let set = DelegationSet::build(&snapshot);
        assert!(set.is_permitted("secret-ns", "wildcard", "anything"));
    }

    fn snapshot_with_reference_grant(to_name: Option<&str>, from_namespaces: Vec<&str>) -> Snapshot {
        let (cache, _rx) = crate::cache::ObjectCache::new();
        cache.upsert(WatchedObject::ReferenceGrant(crate::k8s::types::ReferenceGrantObject {
            meta: ObjectMeta {
                namespace: "secret-ns".into(),
                name: "grant".into(),
                creation_timestamp: Utc::now(),
                generation: 1,
                annotations: Default::default(),
            },
            from_namespaces: from_namespaces.into_iter().map(String::from).collect(),
            to_name: to_name.map(String::from),
        }));
        cache.snapshot()
    }

    #[test]
    fn reference_grant_named_secret_permits_listed_source_namespace() {
        let snapshot = snapshot_with_reference_grant(Some("tls-cert"), vec!["gateway-ns"]);
        let set = DelegationSet::build(&snapshot);
        assert!(set.is_permitted("secret-ns", "tls-cert", "gateway-ns"));
        assert!(!set.is_permitted("secret-ns", "tls-cert", "other-ns"));
        assert!(!set.is_permitted("secret-ns", "other-cert", "gateway-ns"));
    }

    #[test]
    fn reference_grant_without_to_name_permits_any_secret_in_its_namespace() {
        let snapshot = snapshot_with_reference_grant(None, vec!["gateway-ns"]);
        let set = DelegationSet::build(&snapshot);
        assert!(set.is_permitted("secret-ns", "any-cert", "gateway-ns"));
        assert!(set.is_permitted("secret-ns", "another-cert", "gateway-ns"));
        assert!(!set.is_permitted("secret-ns", "any-cert", "other-ns"));
    }
}
