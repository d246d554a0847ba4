//! # Per-Object Status
//!
//! Every root object produces exactly one [`ObjectStatus`] per builder run
//! (spec §4.2 pass 9, "Status emission"). The [`crate::status`] module
//! conflates these against the last-published set and forwards only the
//! objects whose condition set actually changed.

use crate::k8s::types::ObjectKey;
use serde::{Deserialize, Serialize};

/// The closed reason enum named in spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusReason {
    Valid,
    OrphanedRoute,
    InvalidTls,
    DelegationDenied,
    FqdnConflict,
    IncludeLoop,
    InvalidPolicy,
    MissingService,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub reason: StatusReason,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatus {
    pub object: ObjectKey,
    pub observed_generation: i64,
    pub validity: Validity,
    pub conditions: Vec<Condition>,
}

impl ObjectStatus {
    pub fn valid(object: ObjectKey, observed_generation: i64) -> Self {
        Self {
            object,
            observed_generation,
            validity: Validity::Valid,
            conditions: vec![Condition { reason: StatusReason::Valid, message: "valid HTTPProxy".to_string() }],
        }
    }

    pub fn invalid(
        object: ObjectKey,
        observed_generation: i64,
        reason: StatusReason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            object,
            observed_generation,
            validity: Validity::Invalid,
            conditions: vec![Condition { reason, message: message.into() }],
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.validity, Validity::Valid)
    }
}
