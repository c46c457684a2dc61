//! # Record Store
//!
//! Reads and writes of the resource records the reconcilers own parts of:
//! `status`, `metadata.finalizers` and, for policies, `spec.content`.
//!
//! Every write is a JSON merge patch carrying the `metadata.resourceVersion`
//! it was computed from, so a concurrent edit of the same record makes the API
//! server reject it with `409 Conflict`. The writer helpers then re-read the
//! record, recompute the patch and try again, up to a bounded number of
//! attempts. A write whose result is already present is skipped.
//!
//! Spec write-backs are derived from the spec they replace. When a re-read
//! shows that spec was edited in the meantime, the write-back is dropped
//! instead of clobbering the newer edit.

use super::error::Step;
use crate::constants::CONTROLLER_NAME;
use crate::crd::{ManagedResource, ResourceState};
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde_json::{json, Value};
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Record store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} was modified concurrently")]
    Conflict(String),

    #[error("record {0} no longer exists")]
    NotFound(String),

    #[error("spec of record {0} changed before the write-back landed")]
    Superseded(String),

    #[error("gave up writing {name} after {attempts} conflicting attempts")]
    RetriesExhausted { name: String, attempts: u32 },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Other(String),
}

/// Which part of the record a patch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget {
    /// The `status` subresource
    Status,
    /// The main resource (metadata and spec)
    Object,
}

/// Access to resource records of one kind
#[async_trait]
pub trait RecordStore<K: ManagedResource>: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    /// Apply a JSON merge patch and return the updated record
    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        target: PatchTarget,
        patch: &Value,
    ) -> Result<K, StoreError>;
}

/// [`RecordStore`] backed by the Kubernetes API
pub struct KubeRecordStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> std::fmt::Debug for KubeRecordStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeRecordStore").finish_non_exhaustive()
    }
}

impl<K> KubeRecordStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

fn map_kube_error(err: kube::Error, namespace: &str, name: &str) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(format!("{namespace}/{name}")),
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(format!("{namespace}/{name}")),
        other => StoreError::Kube(other),
    }
}

#[async_trait]
impl<K: ManagedResource> RecordStore<K> for KubeRecordStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| map_kube_error(e, namespace, name))
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        target: PatchTarget,
        patch: &Value,
    ) -> Result<K, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PatchParams::apply(CONTROLLER_NAME);
        let result = match target {
            PatchTarget::Status => api.patch_status(name, &params, &Patch::Merge(patch)).await,
            PatchTarget::Object => api.patch(name, &params, &Patch::Merge(patch)).await,
        };
        result.map_err(|e| map_kube_error(e, namespace, name))
    }
}

/// A change to a record, recomputed against every fresh read
#[derive(Debug, Clone, PartialEq)]
enum Mutation {
    Status {
        state: ResourceState,
        message: Option<String>,
        failed_step: Option<Step>,
    },
    AddFinalizer,
    RemoveFinalizer,
    /// Merge patch of `spec` fields, valid only while `spec` still holds `submitted`
    Spec { submitted: Value, fields: Value },
}

impl Mutation {
    /// Patch turning `obj` into the desired record, `None` when already applied
    fn patch_for<K: ManagedResource>(&self, obj: &K) -> Option<(PatchTarget, Value)> {
        let resource_version = obj.resource_version();
        match self {
            Mutation::Status {
                state,
                message,
                failed_step,
            } => {
                let failed_step = failed_step.map(Step::as_str);
                if obj.state() == *state
                    && obj.message() == message.as_deref()
                    && obj.failed_step() == failed_step
                {
                    return None;
                }
                // Explicit nulls remove a previous message and step
                Some((
                    PatchTarget::Status,
                    json!({
                        "metadata": { "resourceVersion": resource_version },
                        "status": {
                            "state": state,
                            "message": message,
                            "failedStep": failed_step,
                        },
                    }),
                ))
            }
            Mutation::AddFinalizer => {
                if obj.has_finalizer() {
                    return None;
                }
                let mut finalizers = obj.finalizers().to_vec();
                finalizers.push(K::FINALIZER.to_string());
                Some((PatchTarget::Object, finalizer_patch(resource_version, finalizers)))
            }
            Mutation::RemoveFinalizer => {
                if !obj.has_finalizer() {
                    return None;
                }
                let finalizers: Vec<String> = obj
                    .finalizers()
                    .iter()
                    .filter(|f| f.as_str() != K::FINALIZER)
                    .cloned()
                    .collect();
                Some((PatchTarget::Object, finalizer_patch(resource_version, finalizers)))
            }
            Mutation::Spec { fields, .. } => {
                if spec_holds(obj, fields) {
                    return None;
                }
                Some((
                    PatchTarget::Object,
                    json!({
                        "metadata": { "resourceVersion": resource_version },
                        "spec": fields,
                    }),
                ))
            }
        }
    }

    /// Whether the record no longer holds the spec this mutation was derived from
    fn superseded<K: ManagedResource>(&self, obj: &K) -> bool {
        match self {
            Mutation::Spec { submitted, .. } => !spec_holds(obj, submitted),
            _ => false,
        }
    }
}

/// Whether every field in `fields` has the same value under the record's `spec`
fn spec_holds<K: ManagedResource>(obj: &K, fields: &Value) -> bool {
    let Ok(current) = serde_json::to_value(obj) else {
        return false;
    };
    fields.as_object().is_some_and(|fields| {
        fields
            .iter()
            .all(|(key, value)| current.pointer(&format!("/spec/{key}")) == Some(value))
    })
}

fn finalizer_patch(resource_version: Option<String>, finalizers: Vec<String>) -> Value {
    json!({
        "metadata": {
            "resourceVersion": resource_version,
            "finalizers": finalizers,
        }
    })
}

/// Writes record mutations with re-read-and-retry on conflict
pub struct RecordWriter<'a, K: ManagedResource> {
    store: &'a dyn RecordStore<K>,
    retries: u32,
}

impl<K: ManagedResource> std::fmt::Debug for RecordWriter<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl<'a, K: ManagedResource> RecordWriter<'a, K> {
    pub fn new(store: &'a dyn RecordStore<K>, retries: u32) -> Self {
        Self { store, retries }
    }

    /// Set `status.state` and `status.message`
    pub async fn write_status(
        &self,
        obj: &K,
        state: ResourceState,
        message: Option<String>,
    ) -> Result<K, StoreError> {
        self.commit(
            obj,
            Mutation::Status {
                state,
                message,
                failed_step: None,
            },
        )
        .await
    }

    /// Set `Error` with `message`, remembering which step to retry
    pub async fn write_failure(
        &self,
        obj: &K,
        step: Step,
        message: String,
    ) -> Result<K, StoreError> {
        self.commit(
            obj,
            Mutation::Status {
                state: ResourceState::Error,
                message: Some(message),
                failed_step: Some(step),
            },
        )
        .await
    }

    pub async fn add_finalizer(&self, obj: &K) -> Result<K, StoreError> {
        self.commit(obj, Mutation::AddFinalizer).await
    }

    pub async fn remove_finalizer(&self, obj: &K) -> Result<K, StoreError> {
        self.commit(obj, Mutation::RemoveFinalizer).await
    }

    /// Replace the `spec` fields in `submitted` with `fields`
    ///
    /// Returns `None` without writing when the record's `spec` no longer
    /// holds `submitted`.
    pub async fn write_spec(
        &self,
        obj: &K,
        submitted: Value,
        fields: Value,
    ) -> Result<Option<K>, StoreError> {
        match self.commit(obj, Mutation::Spec { submitted, fields }).await {
            Ok(updated) => Ok(Some(updated)),
            Err(StoreError::Superseded(name)) => {
                debug!(resource.name = %name, "Dropping spec write-back, spec was edited");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn commit(&self, obj: &K, mutation: Mutation) -> Result<K, StoreError> {
        let name = obj.name_any();
        let namespace = obj.namespace().unwrap_or_default();
        let attempts = self.retries + 1;
        let mut current = obj.clone();

        for attempt in 1..=attempts {
            let Some((target, patch)) = mutation.patch_for(&current) else {
                debug!(resource.name = %name, ?mutation, "Skipping record write - already applied");
                return Ok(current);
            };
            if mutation.superseded(&current) {
                return Err(StoreError::Superseded(name));
            }
            match self.store.patch(&namespace, &name, target, &patch).await {
                Ok(updated) => return Ok(updated),
                Err(StoreError::Conflict(_)) if attempt < attempts => {
                    warn!(
                        resource.name = %name,
                        resource.namespace = %namespace,
                        attempt,
                        "Record changed concurrently, re-reading before retry"
                    );
                    current = self.store.get(&namespace, &name).await?;
                }
                Err(StoreError::Conflict(_)) => break,
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::RetriesExhausted { name, attempts })
    }
}
