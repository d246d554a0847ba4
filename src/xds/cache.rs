//! # xDS Resource Cache
//!
//! Holds the last-published resource set per xDS type URL and notifies
//! open streams when it changes. Grounded on the teacher's
//! `xds::state::XdsState`: one `RwLock<HashMap<String, CachedResource>>`
//! per type URL, a monotonic version counter, and a `broadcast` channel
//! publishing a `ResourceUpdate` on every change — the value-equality gate
//! in `apply` is carried over verbatim from `XdsState::apply_built_resources`
//! since it is exactly what spec §8's SDS-isolation property needs: a
//! translator run that produces byte-identical output for a type URL must
//! not bump that type URL's version or wake a stream.
//!
//! The version numbers themselves are drawn from one shared monotonic
//! counter (so every stamped version is globally unique and ordered), but
//! each type URL's *last published* version is tracked independently in
//! `type_versions` (spec §5.2 "monotonic integers per translator cache").
//! A client subscribed to SDS must see the same `version_info` across an
//! unrelated CDS/LDS/RDS-only rebuild.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use envoy_types::pb::google::protobuf::Any;
use tokio::sync::broadcast;

use crate::translate::BuiltResource;

#[derive(Clone, Debug, PartialEq)]
pub struct CachedResource {
    pub name: String,
    pub version: u64,
    pub body: Any,
}

#[derive(Clone, Debug, Default)]
pub struct ResourceDelta {
    pub type_url: String,
    pub added_or_updated: Vec<CachedResource>,
    pub removed: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ResourceUpdate {
    pub version: u64,
    pub deltas: Vec<ResourceDelta>,
}

const BROADCAST_CAPACITY: usize = 256;

pub struct XdsCache {
    version: AtomicU64,
    type_versions: RwLock<HashMap<String, u64>>,
    update_tx: broadcast::Sender<Arc<ResourceUpdate>>,
    resource_caches: RwLock<HashMap<String, HashMap<String, CachedResource>>>,
}

impl Default for XdsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl XdsCache {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            version: AtomicU64::new(0),
            type_versions: RwLock::new(HashMap::new()),
            update_tx,
            resource_caches: RwLock::new(HashMap::new()),
        }
    }

    /// Applies a fresh resource set for `type_url`, diffing against the
    /// current cache. Returns `None` (and never bumps the version or
    /// broadcasts) when the incoming set is byte-identical to what is
    /// already cached.
    pub fn apply(&self, type_url: &str, built_resources: Vec<BuiltResource>) -> Option<Arc<ResourceUpdate>> {
        let mut caches = self.resource_caches.write().expect("resource cache lock poisoned");
        let cache = caches.entry(type_url.to_string()).or_default();

        let incoming_names: HashSet<&str> =
            built_resources.iter().map(|resource| resource.name.as_str()).collect();

        let removed: Vec<String> = cache
            .keys()
            .filter(|existing| !incoming_names.contains(existing.as_str()))
            .cloned()
            .collect();

        let mut pending: Vec<BuiltResource> = Vec::new();
        for built in built_resources {
            match cache.get(&built.name) {
                Some(existing) if existing.body == built.resource => {}
                _ => pending.push(built),
            }
        }

        if pending.is_empty() && removed.is_empty() {
            return None;
        }

        let new_version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        self.type_versions
            .write()
            .expect("type version lock poisoned")
            .insert(type_url.to_string(), new_version);

        for name in &removed {
            cache.remove(name);
        }

        let mut delta = ResourceDelta { type_url: type_url.to_string(), ..Default::default() };
        for built in pending {
            let cached = CachedResource { name: built.name.clone(), version: new_version, body: built.resource };
            cache.insert(built.name, cached.clone());
            delta.added_or_updated.push(cached);
        }
        delta.removed = removed;

        let update = Arc::new(ResourceUpdate { version: new_version, deltas: vec![delta] });
        let _ = self.update_tx.send(update.clone());
        Some(update)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ResourceUpdate>> {
        self.update_tx.subscribe()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// The version last stamped on `type_url`'s resource set, or `0` if
    /// nothing has ever been applied for it.
    pub fn type_version(&self, type_url: &str) -> u64 {
        self.type_versions.read().expect("type version lock poisoned").get(type_url).copied().unwrap_or(0)
    }

    /// All cached resources for `type_url`, or every resource when
    /// `names` is empty (the xDS wildcard subscription, spec §4.4).
    pub fn resources_for(&self, type_url: &str, names: &[String]) -> Vec<CachedResource> {
        let caches = self.resource_caches.read().expect("resource cache lock poisoned");
        let Some(cache) = caches.get(type_url) else { return Vec::new() };

        if names.is_empty() {
            cache.values().cloned().collect()
        } else {
            names.iter().filter_map(|name| cache.get(name).cloned()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(name: &str, payload: &[u8]) -> BuiltResource {
        BuiltResource {
            name: name.to_string(),
            resource: Any { type_url: "type.googleapis.com/test".to_string(), value: payload.to_vec() },
        }
    }

    #[test]
    fn identical_reapply_does_not_bump_version_or_broadcast() {
        let cache = XdsCache::new();
        let mut rx = cache.subscribe();

        assert!(cache.apply("t", vec![built("a", b"1")]).is_some());
        assert!(rx.try_recv().is_ok());
        assert_eq!(cache.version(), 1);

        assert!(cache.apply("t", vec![built("a", b"1")]).is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(cache.version(), 1);
    }

    #[test]
    fn changed_resource_bumps_version_and_tracks_removed() {
        let cache = XdsCache::new();
        cache.apply("t", vec![built("a", b"1"), built("b", b"1")]);

        let update = cache.apply("t", vec![built("a", b"2")]).expect("change expected");
        assert_eq!(update.version, 2);
        assert_eq!(update.deltas[0].added_or_updated.len(), 1);
        assert_eq!(update.deltas[0].removed, vec!["b".to_string()]);
    }

    #[test]
    fn wildcard_subscription_returns_all_resources() {
        let cache = XdsCache::new();
        cache.apply("t", vec![built("a", b"1"), built("b", b"1")]);
        assert_eq!(cache.resources_for("t", &[]).len(), 2);
        assert_eq!(cache.resources_for("t", &["a".to_string()]).len(), 1);
    }

    #[test]
    fn type_version_is_isolated_per_type_url() {
        let cache = XdsCache::new();
        cache.apply("cds", vec![built("c1", b"1")]);
        let sds_version = cache.apply("sds", vec![built("s1", b"1")]).expect("change expected").version;
        assert_eq!(cache.type_version("sds"), sds_version);

        cache.apply("cds", vec![built("c1", b"2")]);
        assert_eq!(cache.type_version("sds"), sds_version, "unrelated CDS rebuild must not bump SDS's version");
        assert!(cache.type_version("cds") > sds_version);
    }

    #[test]
    fn type_version_defaults_to_zero_for_unknown_type_url() {
        let cache = XdsCache::new();
        assert_eq!(cache.type_version("unknown"), 0);
    }
}
