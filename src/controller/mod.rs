//! # Controller
//!
//! The reconciliation core and the plumbing around it.
//!
//! - `engine`: the generic state machine and the [`ManagedKind`] capability trait
//! - `bucket`, `policy`, `user`: the per-kind capabilities
//! - `drift`: pure desired-versus-observed comparisons
//! - `record`: status, finalizer and spec writes with conflict retry
//! - `events`: Kubernetes events
//! - `backoff`: per-resource Fibonacci backoff for failed reconciles
//! - `server`: metrics and probe endpoints

pub mod backoff;
pub mod bucket;
pub mod drift;
pub mod engine;
pub mod error;
pub mod events;
pub mod policy;
pub mod record;
pub mod server;
pub mod user;

pub use engine::{
    reconcile_step, EngineContext, EngineSettings, ManagedKind, Observation, Outcome,
    SpecUpdate, SpecWriteBack,
};
pub use error::{ReconcileError, Step};
pub use record::{KubeRecordStore, PatchTarget, RecordStore, RecordWriter, StoreError};
