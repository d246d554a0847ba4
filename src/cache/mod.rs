//! # ObjectCache
//!
//! Thread-safe typed store of the last observed version of every watched
//! object (spec §4.1). Mutated only by the event-ingest task (the informer
//! adapter); readers take an immutable [`Snapshot`] that outlives any
//! number of concurrent DAG builder runs.
//!
//! Grounded on the teacher's single-writer/many-readers style
//! (`xds::state::XdsState`'s `RwLock<HashMap<...>>` + notification
//! channel), generalized here to a `DashMap` keyed by object identity with
//! a capacity-1 "rebuild requested" channel standing in for the teacher's
//! `broadcast` publish.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::k8s::types::{ObjectKey, ObjectKind, NsName, WatchedObject};

/// An immutable view of the cache at one point in time, handed to exactly
/// one DAG builder run. Iteration is over a `BTreeMap`, so every consumer
/// of a `Snapshot` automatically gets sorted-key-order iteration as
/// required by spec §9 ("Determinism").
#[derive(Debug, Clone)]
pub struct Snapshot {
    objects: Arc<BTreeMap<ObjectKey, WatchedObject>>,
}

impl Snapshot {
    pub fn get(&self, key: &ObjectKey) -> Option<&WatchedObject> {
        self.objects.get(key)
    }

    pub fn of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = (&ObjectKey, &WatchedObject)> {
        self.objects.iter().filter(move |(k, _)| k.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

pub struct ObjectCache {
    objects: DashMap<ObjectKey, WatchedObject>,
    rebuild_tx: mpsc::Sender<()>,
}

impl ObjectCache {
    /// Creates a cache and its paired "rebuild requested" receiver. The
    /// channel has capacity 1: a rebuild request already pending coalesces
    /// with a new one rather than queuing (spec §4.2 "multiple queued
    /// rebuild requests collapse into one").
    pub fn new() -> (Arc<Self>, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Arc::new(Self { objects: DashMap::new(), rebuild_tx: tx }), rx)
    }

    fn request_rebuild(&self) {
        // `try_send` on a full channel means a rebuild is already queued;
        // that pending request already covers this change.
        let _ = self.rebuild_tx.try_send(());
    }

    /// Upserts an object. No-ops (and never triggers a rebuild) if the new
    /// payload is equal to the previous one: `WatchedObject`'s `PartialEq`
    /// only ever compares the fields modeled in [`crate::k8s::types`],
    /// which deliberately excludes resourceVersion/managedFields/status, so
    /// deep-content equality here is structural, not a manual denylist.
    pub fn upsert(&self, object: WatchedObject) -> bool {
        let key = object.key();
        let changed = match self.objects.get(&key) {
            Some(existing) => *existing != object,
            None => true,
        };
        if changed {
            self.objects.insert(key, object);
            self.request_rebuild();
        }
        changed
    }

    pub fn delete(&self, kind: ObjectKind, nsname: NsName) -> bool {
        let key = ObjectKey::new(kind, nsname);
        let removed = self.objects.remove(&key).is_some();
        if removed {
            self.request_rebuild();
        }
        removed
    }

    pub fn snapshot(&self) -> Snapshot {
        let objects = self.objects.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
        Snapshot { objects: Arc::new(objects) }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::types::{ObjectMeta, ServiceObject, ServicePort};
    use chrono::Utc;

    fn service(name: &str, port: u16) -> WatchedObject {
        WatchedObject::Service(ServiceObject {
            meta: ObjectMeta {
                namespace: "default".into(),
                name: name.into(),
                creation_timestamp: Utc::now(),
                generation: 1,
                annotations: Default::default(),
            },
            ports: vec![ServicePort { name: None, port, target_port: None, app_protocol: None }],
            external_name: None,
        })
    }

    #[test]
    fn upsert_of_identical_content_is_a_noop() {
        let (cache, mut rx) = ObjectCache::new();
        assert!(cache.upsert(service("svc1", 80)));
        assert!(rx.try_recv().is_ok());

        assert!(!cache.upsert(service("svc1", 80)));
        assert!(rx.try_recv().is_err(), "identical upsert must not request a rebuild");
    }

    #[test]
    fn upsert_of_changed_content_requests_rebuild() {
        let (cache, mut rx) = ObjectCache::new();
        cache.upsert(service("svc1", 80));
        rx.try_recv().unwrap();

        assert!(cache.upsert(service("svc1", 81)));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn delete_of_missing_object_is_a_noop() {
        let (cache, mut rx) = ObjectCache::new();
        assert!(!cache.delete(ObjectKind::Service, NsName::new("default", "missing")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn snapshot_reflects_committed_state() {
        let (cache, _rx) = ObjectCache::new();
        cache.upsert(service("svc1", 80));
        cache.upsert(service("svc2", 81));

        let snap = cache.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.of_kind(ObjectKind::Service).count(), 2);

        cache.delete(ObjectKind::Service, NsName::new("default", "svc1"));
        // the already-taken snapshot is unaffected by the later mutation.
        assert_eq!(snap.len(), 2);
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[test]
    fn rebuild_requests_coalesce_to_capacity_one() {
        let (cache, mut rx) = ObjectCache::new();
        cache.upsert(service("svc1", 80));
        cache.upsert(service("svc2", 80));
        cache.upsert(service("svc3", 80));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "only one coalesced rebuild notification should be pending");
    }
}
