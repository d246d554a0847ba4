//! # Kubernetes Object Model
//!
//! Everything the control plane knows about the objects it watches:
//! internal representations ([`types`]) the DAG builder consumes, the
//! Contour-style CRD wire shapes ([`crds`]), the subset of the Gateway API
//! this control plane understands ([`gateway_api`]), and the informer
//! adapter ([`informer`]) that turns `kube::runtime::watcher` events into
//! [`crate::cache::ObjectCache`] mutations.

pub mod convert;
pub mod crds;
pub mod gateway_api;
pub mod informer;
pub mod types;

pub use types::{ObjectKey, ObjectKind, ObjectMeta, WatchedObject};
