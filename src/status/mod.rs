//! # Status Reporter
//!
//! Conflates the DAG builder's per-run `Vec<ObjectStatus>` (spec §4.2 pass 9)
//! against the last-published condition set per object and forwards only
//! the objects whose status actually changed — the same value-equality
//! gate the xDS resource cache uses for its own push-on-change semantics,
//! grounded on the teacher's `xds::state::XdsState::apply_built_resources`.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::ObjectStatus;
use crate::k8s::types::ObjectKey;

/// Destination for object status updates. A real Kubernetes status-
/// subresource writer is the production collaborator this abstracts over;
/// that writer is out of scope here (no CRD status client surface is
/// implemented), so [`LoggingStatusSink`] is the only production
/// implementation. [`ChannelStatusSink`] exists so tests can assert on
/// exactly what was published.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, statuses: &[ObjectStatus]);
}

/// Logs every published status at `info` level.
#[derive(Debug, Default)]
pub struct LoggingStatusSink;

#[async_trait]
impl StatusSink for LoggingStatusSink {
    async fn publish(&self, statuses: &[ObjectStatus]) {
        for status in statuses {
            info!(
                object = %status.object,
                observed_generation = status.observed_generation,
                valid = status.is_valid(),
                "object status published"
            );
        }
    }
}

/// Forwards every published batch on an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelStatusSink {
    tx: mpsc::UnboundedSender<Vec<ObjectStatus>>,
}

impl ChannelStatusSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<ObjectStatus>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl StatusSink for ChannelStatusSink {
    async fn publish(&self, statuses: &[ObjectStatus]) {
        let _ = self.tx.send(statuses.to_vec());
    }
}

/// Diffs each builder run's statuses against the last-published set per
/// object and forwards only the objects whose condition set changed.
pub struct StatusReporter<S: StatusSink> {
    sink: S,
    last_published: Mutex<HashMap<ObjectKey, ObjectStatus>>,
}

impl<S: StatusSink> StatusReporter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, last_published: Mutex::new(HashMap::new()) }
    }

    /// Publishes the subset of `statuses` that differ from what was last
    /// published for that object. Objects absent from `statuses` (deleted,
    /// or no longer a root object) stop being tracked so a later
    /// reappearance is treated as a fresh status rather than a no-op.
    pub async fn report(&self, statuses: Vec<ObjectStatus>) {
        let changed: Vec<ObjectStatus> = {
            let mut last = self.last_published.lock().expect("status lock poisoned");
            let mut changed = Vec::new();
            let mut seen: HashSet<ObjectKey> = HashSet::new();

            for status in &statuses {
                seen.insert(status.object.clone());
                let is_changed = match last.get(&status.object) {
                    Some(previous) => previous != status,
                    None => true,
                };
                if is_changed {
                    changed.push(status.clone());
                }
            }

            last.retain(|key, _| seen.contains(key));
            for status in &statuses {
                last.insert(status.object.clone(), status.clone());
            }

            changed
        };

        if changed.is_empty() {
            debug!("status reporter: no object status changes to publish");
            return;
        }

        self.sink.publish(&changed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{StatusReason, Validity};
    use crate::k8s::types::{NsName, ObjectKind};

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new(ObjectKind::HttpProxy, NsName::new("default", name))
    }

    #[tokio::test]
    async fn identical_status_is_not_republished() {
        let (sink, mut rx) = ChannelStatusSink::new();
        let reporter = StatusReporter::new(sink);

        let status = ObjectStatus::valid(key("proxy-a"), 1);
        reporter.report(vec![status.clone()]).await;
        assert_eq!(rx.recv().await.unwrap().len(), 1);

        reporter.report(vec![status]).await;
        assert!(rx.try_recv().is_err(), "unchanged status must not republish");
    }

    #[tokio::test]
    async fn changed_condition_republishes() {
        let (sink, mut rx) = ChannelStatusSink::new();
        let reporter = StatusReporter::new(sink);

        reporter.report(vec![ObjectStatus::valid(key("proxy-a"), 1)]).await;
        rx.recv().await.unwrap();

        reporter
            .report(vec![ObjectStatus::invalid(
                key("proxy-a"),
                2,
                StatusReason::OrphanedRoute,
                "route references unknown service",
            )])
            .await;
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].validity, Validity::Invalid);
    }

    #[tokio::test]
    async fn object_missing_from_a_later_run_stops_being_tracked() {
        let (sink, mut rx) = ChannelStatusSink::new();
        let reporter = StatusReporter::new(sink);

        reporter.report(vec![ObjectStatus::valid(key("proxy-a"), 1)]).await;
        rx.recv().await.unwrap();

        reporter.report(vec![]).await;
        assert!(rx.try_recv().is_err());

        reporter.report(vec![ObjectStatus::valid(key("proxy-a"), 1)]).await;
        assert_eq!(rx.recv().await.unwrap().len(), 1, "re-appearing object republishes");
    }
}
