//! # Reconciliation Engine
//!
//! One state machine shared by the Bucket, Policy and User reconcilers.
//!
//! ```text
//! Unset -> Creating -> Ready <-> Updating
//!             any remote failure -> Error
//!             deletion requested -> Degraded (finalizer released)
//! ```
//!
//! Each invocation runs exactly one step and reports whether the dispatcher
//! should requeue immediately ([`Outcome::Requeue`]) or wait for the periodic
//! resync ([`Outcome::Done`]). Failures are written to `status` and returned
//! as [`ReconcileError`]; the engine itself never sleeps or retries remote calls.
//!
//! Remote mutations always happen before the status write that claims them,
//! so a crash in between leaves the record one step behind and the next
//! invocation repeats an idempotent call.

use super::error::{ReconcileError, Step};
use super::events::{deletion_note, reasons, EventPublisher};
use super::record::{RecordStore, RecordWriter};
use crate::crd::{ManagedResource, ResourceState};
use crate::observability::metrics;
use crate::provider::{RemoteClients, RemoteError};
use async_trait::async_trait;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Signal returned to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to do until the next resync or record change
    Done,
    /// Run the next step right away
    Requeue,
}

/// Result of a read-only drift check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    InSync,
    Drifted(String),
}

/// Spec fields to overwrite after a successful remote write
#[derive(Debug, Clone, PartialEq)]
pub struct SpecUpdate {
    /// The `spec` fields as they were sent to the server
    pub submitted: Value,
    /// Their replacement
    pub fields: Value,
}

/// Optional write-back returned by create and apply
pub type SpecWriteBack = Option<SpecUpdate>;

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Bound on purge rounds of the bucket drain
    pub max_drain_rounds: u32,
    /// Re-read-and-retry attempts on record write conflicts
    pub conflict_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_drain_rounds: crate::constants::DEFAULT_MAX_DRAIN_ROUNDS,
            conflict_retries: crate::constants::DEFAULT_STATUS_CONFLICT_RETRIES,
        }
    }
}

/// Collaborators of one kind's reconciler
pub struct EngineContext<K: ManagedResource> {
    pub store: Arc<dyn RecordStore<K>>,
    pub remotes: Arc<dyn RemoteClients>,
    pub events: Arc<dyn EventPublisher>,
    pub settings: EngineSettings,
}

impl<K: ManagedResource> std::fmt::Debug for EngineContext<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<K: ManagedResource> EngineContext<K> {
    pub fn new(
        store: Arc<dyn RecordStore<K>>,
        remotes: Arc<dyn RemoteClients>,
        events: Arc<dyn EventPublisher>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            remotes,
            events,
            settings,
        }
    }

    fn writer(&self) -> RecordWriter<'_, K> {
        RecordWriter::new(self.store.as_ref(), self.settings.conflict_retries)
    }
}

/// Remote capabilities of a managed kind
///
/// All operations must be idempotent: the engine repeats them after crashes
/// and failed status writes.
#[async_trait]
pub trait ManagedKind: ManagedResource {
    /// Kind label for logs and metrics
    const KIND: &'static str;

    /// Create the remote object if absent and bring it to the desired state
    async fn create(&self, ctx: &EngineContext<Self>) -> Result<SpecWriteBack, RemoteError>;

    /// Work that needs the finalizer in place, run right after registering it
    async fn finish_create(&self, _ctx: &EngineContext<Self>) -> Result<(), RemoteError> {
        Ok(())
    }

    /// Compare the remote object with `spec`
    async fn observe(&self, ctx: &EngineContext<Self>) -> Result<Observation, RemoteError>;

    /// Push the desired state to the remote object
    async fn apply(&self, ctx: &EngineContext<Self>) -> Result<SpecWriteBack, RemoteError>;

    /// Delete the remote object; a missing object counts as success
    async fn remove(&self, ctx: &EngineContext<Self>) -> Result<(), RemoteError>;
}

/// Run one step of the state machine for `obj`
pub async fn reconcile_step<K: ManagedKind>(
    obj: &K,
    ctx: &EngineContext<K>,
) -> Result<Outcome, ReconcileError> {
    if obj.deletion_requested() {
        return finalize(obj, ctx).await;
    }

    match obj.state() {
        ResourceState::Unset => {
            transition(obj, ctx, ResourceState::Creating).await?;
            Ok(Outcome::Requeue)
        }
        ResourceState::Creating => create(obj, ctx).await,
        ResourceState::Ready => observe(obj, ctx).await,
        ResourceState::Updating => apply(obj, ctx).await,
        ResourceState::Error if obj.has_finalizer() => {
            let retry = obj.failed_step().and_then(Step::from_name);
            info!(
                resource.kind = K::KIND,
                resource.name = %obj.name_any(),
                failed_step = ?retry,
                "Retrying after previous failure"
            );
            match retry {
                // Read-only, nothing to push until drift is seen
                Some(Step::Observe) => observe(obj, ctx).await,
                _ => apply(obj, ctx).await,
            }
        }
        ResourceState::Error => {
            info!(
                resource.kind = K::KIND,
                resource.name = %obj.name_any(),
                "Retrying create after previous failure"
            );
            create(obj, ctx).await
        }
        ResourceState::Degraded => {
            debug!(
                resource.kind = K::KIND,
                resource.name = %obj.name_any(),
                "Degraded resource without deletion request, nothing to do"
            );
            Ok(Outcome::Done)
        }
    }
}

async fn create<K: ManagedKind>(obj: &K, ctx: &EngineContext<K>) -> Result<Outcome, ReconcileError> {
    validate(obj, ctx).await?;

    let write_back = match obj.create(ctx).await {
        Ok(write_back) => write_back,
        Err(e) => return Err(fail(obj, ctx, Step::Create, e).await),
    };
    let Some(obj) = write_spec(obj, ctx, write_back).await? else {
        return Ok(Outcome::Requeue);
    };
    let obj = ctx.writer().add_finalizer(&obj).await?;

    if let Err(e) = obj.finish_create(ctx).await {
        return Err(fail(&obj, ctx, Step::Create, e).await);
    }

    transition(&obj, ctx, ResourceState::Ready).await?;
    info!(
        resource.kind = K::KIND,
        resource.name = %obj.name_any(),
        resource.namespace = obj.namespace().as_deref().unwrap_or_default(),
        "✅ Created remote {}",
        K::KIND
    );
    Ok(Outcome::Requeue)
}

async fn observe<K: ManagedKind>(obj: &K, ctx: &EngineContext<K>) -> Result<Outcome, ReconcileError> {
    match obj.observe(ctx).await {
        Ok(Observation::InSync) => {
            debug!(resource.kind = K::KIND, resource.name = %obj.name_any(), "In sync");
            // No write unless recovering from a failed observe
            transition(obj, ctx, ResourceState::Ready).await?;
            Ok(Outcome::Done)
        }
        Ok(Observation::Drifted(reason)) => {
            info!(
                resource.kind = K::KIND,
                resource.name = %obj.name_any(),
                drift = %reason,
                "🔄 Drift detected, updating"
            );
            transition(obj, ctx, ResourceState::Updating).await?;
            Ok(Outcome::Requeue)
        }
        Err(e) => Err(fail(obj, ctx, Step::Observe, e).await),
    }
}

async fn apply<K: ManagedKind>(obj: &K, ctx: &EngineContext<K>) -> Result<Outcome, ReconcileError> {
    validate(obj, ctx).await?;

    let write_back = match obj.apply(ctx).await {
        Ok(write_back) => write_back,
        Err(e) => return Err(fail(obj, ctx, Step::Apply, e).await),
    };
    let Some(obj) = write_spec(obj, ctx, write_back).await? else {
        return Ok(Outcome::Requeue);
    };
    transition(&obj, ctx, ResourceState::Ready).await?;
    Ok(Outcome::Requeue)
}

/// Cleanup gated by the finalizer
async fn finalize<K: ManagedKind>(obj: &K, ctx: &EngineContext<K>) -> Result<Outcome, ReconcileError> {
    if !obj.has_finalizer() {
        debug!(
            resource.kind = K::KIND,
            resource.name = %obj.name_any(),
            "Deletion requested without our finalizer, nothing to clean up"
        );
        return Ok(Outcome::Done);
    }

    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    info!(
        resource.kind = K::KIND,
        resource.name = %name,
        resource.namespace = %namespace,
        "🗑️ Removing remote {}",
        K::KIND
    );

    match obj.remove(ctx).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            debug!(resource.name = %name, "Remote {} already absent", K::KIND);
        }
        Err(e) => return Err(fail(obj, ctx, Step::Remove, e).await),
    }

    let updated = ctx
        .writer()
        .write_status(obj, ResourceState::Degraded, None)
        .await?;
    metrics::increment_state_transitions(K::KIND, ResourceState::Degraded.as_str());
    ctx.writer().remove_finalizer(&updated).await?;

    ctx.events
        .publish(
            &obj.object_ref(&()),
            EventType::Warning,
            reasons::DELETING,
            reasons::DELETING,
            Some(deletion_note(&name, &namespace)),
        )
        .await;
    Ok(Outcome::Done)
}

async fn validate<K: ManagedKind>(obj: &K, ctx: &EngineContext<K>) -> Result<(), ReconcileError> {
    if let Err(e) = obj.validate() {
        warn!(resource.kind = K::KIND, resource.name = %obj.name_any(), error = %e, "Invalid spec");
        ctx.writer()
            .write_status(obj, ResourceState::Error, Some(e.to_string()))
            .await?;
        metrics::increment_state_transitions(K::KIND, ResourceState::Error.as_str());
        return Err(e.into());
    }
    Ok(())
}

/// Apply the write-back; `None` when `spec` was edited after submission
///
/// A superseded write-back leaves the state untouched, so the requeued step
/// submits the newer spec.
async fn write_spec<K: ManagedKind>(
    obj: &K,
    ctx: &EngineContext<K>,
    write_back: SpecWriteBack,
) -> Result<Option<K>, ReconcileError> {
    let Some(update) = write_back else {
        return Ok(Some(obj.clone()));
    };
    info!(resource.kind = K::KIND, resource.name = %obj.name_any(), "Writing canonical spec back");
    let written = ctx
        .writer()
        .write_spec(obj, update.submitted, update.fields)
        .await?;
    if written.is_none() {
        info!(
            resource.kind = K::KIND,
            resource.name = %obj.name_any(),
            "Spec edited during submission, requeueing with the new spec"
        );
    }
    Ok(written)
}

async fn transition<K: ManagedKind>(
    obj: &K,
    ctx: &EngineContext<K>,
    state: ResourceState,
) -> Result<K, ReconcileError> {
    let updated = ctx.writer().write_status(obj, state, None).await?;
    if obj.state() != state {
        debug!(
            resource.kind = K::KIND,
            resource.name = %obj.name_any(),
            from = %obj.state(),
            to = %state,
            "State transition"
        );
        metrics::increment_state_transitions(K::KIND, state.as_str());
    }
    Ok(updated)
}

/// Record a remote failure in `status` and build the error for the dispatcher
async fn fail<K: ManagedKind>(
    obj: &K,
    ctx: &EngineContext<K>,
    step: Step,
    err: RemoteError,
) -> ReconcileError {
    error!(
        resource.kind = K::KIND,
        resource.name = %obj.name_any(),
        resource.namespace = obj.namespace().as_deref().unwrap_or_default(),
        step = %step,
        error = %err,
        "❌ Remote call failed"
    );
    if let Err(store_err) = ctx
        .writer()
        .write_failure(obj, step, err.to_string())
        .await
    {
        error!(resource.name = %obj.name_any(), error = %store_err, "Failed to record error status");
        return ReconcileError::Store(store_err);
    }
    metrics::increment_state_transitions(K::KIND, ResourceState::Error.as_str());
    ReconcileError::Remote { step, source: err }
}
