//! # Reconcile Errors
//!
//! Failures returned to the dispatcher by a reconcile invocation.

use super::record::StoreError;
use crate::crd::ValidationError;
use crate::provider::RemoteError;
use std::time::Duration;
use thiserror::Error;

/// Step of the state machine a remote failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Observe,
    Apply,
    Remove,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Create => "create",
            Step::Observe => "observe",
            Step::Apply => "apply",
            Step::Remove => "remove",
        }
    }

    /// Inverse of [`Step::as_str`]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "create" => Some(Step::Create),
            "observe" => Some(Step::Observe),
            "apply" => Some(Step::Apply),
            "remove" => Some(Step::Remove),
            _ => None,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconcile failure, the dispatcher owns backoff and retry
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{step} failed: {source}")]
    Remote {
        step: Step,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("failed to update resource record: {0}")]
    Store(#[from] StoreError),

    #[error("reconcile did not finish within {0:?}")]
    Timeout(Duration),
}

impl ReconcileError {
    /// Label used for the requeue metric
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::Remote { .. } => "remote-error",
            ReconcileError::Invalid(_) => "invalid-spec",
            ReconcileError::Store(_) => "store-error",
            ReconcileError::Timeout(_) => "timeout",
        }
    }
}
