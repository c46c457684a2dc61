//! Policy state machine

use super::common::*;
use async_trait::async_trait;
use minio_operator::controller::events::{EventPublisher, RecordingEventPublisher};
use minio_operator::controller::{
    reconcile_step, EngineContext, EngineSettings, Outcome, PatchTarget, ReconcileError,
    RecordStore, StoreError, Step,
};
use minio_operator::crd::{ManagedResource, Policy, ResourceState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const READONLY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["s3:GetObject"],"Resource":["arn:aws:s3:::data/*"]}]}"#;

#[tokio::test]
async fn test_create_writes_canonical_content_back() {
    let h = Harness::<Policy>::new();
    h.store
        .insert(policy("readonly", "readonly", "{ \"b\":2 ,\n \"a\":1 }"));

    assert_eq!(h.settle("readonly").await.unwrap(), Outcome::Done);

    let record = h.store.record("readonly");
    assert_eq!(record.state(), ResourceState::Ready);
    assert!(record.has_finalizer());
    assert_eq!(record.spec.content, r#"{"a":1,"b":2}"#);
    assert_eq!(h.minio.policy("readonly"), Some(json!({"a": 1, "b": 2})));
}

#[tokio::test]
async fn test_canonical_content_is_not_rewritten() {
    let h = Harness::<Policy>::new();
    h.store.insert(policy("readonly", "readonly", r#"{"a":1}"#));

    h.settle("readonly").await.unwrap();
    h.store.set_status("readonly", ResourceState::Updating, None);
    let patches = h.store.patch_count();

    h.step("readonly").await.unwrap();
    // Only the status write, `spec.content` already matches
    assert_eq!(h.store.patch_count(), patches + 1);
}

/// Store where the owner edits `spec.content` just before the first spec write lands
struct EditedDuringWriteBack {
    inner: Arc<MemoryStore<Policy>>,
    edit: Mutex<Option<String>>,
}

#[async_trait]
impl RecordStore<Policy> for EditedDuringWriteBack {
    async fn get(&self, namespace: &str, name: &str) -> Result<Policy, StoreError> {
        self.inner.get(namespace, name).await
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        target: PatchTarget,
        patch: &Value,
    ) -> Result<Policy, StoreError> {
        if patch.get("spec").is_some() {
            if let Some(content) = self.edit.lock().unwrap().take() {
                self.inner.edit_spec(name, json!({ "content": content }));
                return Err(StoreError::Conflict(format!("{namespace}/{name}")));
            }
        }
        self.inner.patch(namespace, name, target, patch).await
    }
}

#[tokio::test]
async fn test_write_back_does_not_overwrite_concurrent_edit() {
    let inner = Arc::new(MemoryStore::<Policy>::new());
    let minio = FakeMinio::new();
    let store = Arc::new(EditedDuringWriteBack {
        inner: Arc::clone(&inner),
        edit: Mutex::new(Some(r#"{"c":3}"#.to_string())),
    });
    let ctx = EngineContext::new(
        store as Arc<dyn RecordStore<Policy>>,
        Arc::new(FakeRemotes::new(Arc::clone(&minio))),
        Arc::new(RecordingEventPublisher::default()) as Arc<dyn EventPublisher>,
        EngineSettings::default(),
    );
    inner.insert(policy("readonly", "readonly", "{ \"a\":1 }"));
    inner.set_status("readonly", ResourceState::Creating, None);

    let outcome = reconcile_step(&inner.record("readonly"), &ctx).await.unwrap();
    assert_eq!(outcome, Outcome::Requeue);
    let record = inner.record("readonly");
    assert_eq!(record.spec.content, r#"{"c":3}"#);
    assert_eq!(record.state(), ResourceState::Creating);
    assert!(!record.has_finalizer());

    // The requeued step submits the edited document
    reconcile_step(&inner.record("readonly"), &ctx).await.unwrap();
    let record = inner.record("readonly");
    assert_eq!(record.spec.content, r#"{"c":3}"#);
    assert_eq!(record.state(), ResourceState::Ready);
    assert_eq!(minio.policy("readonly"), Some(json!({"c": 3})));
}

#[tokio::test]
async fn test_formatting_differences_are_not_drift() {
    let h = Harness::<Policy>::new();
    h.minio.store_policy("readonly", json!({"b": 2, "a": 1}));
    h.store
        .insert(ready(policy("readonly", "readonly", "{ \"a\":1 , \"b\":2 }")));

    assert_eq!(h.step("readonly").await.unwrap(), Outcome::Done);
    assert_eq!(h.store.record("readonly").state(), ResourceState::Ready);
    assert!(!h.minio.called("add_canned_policy"));
}

#[tokio::test]
async fn test_changed_document_is_drift_and_resubmitted() {
    let h = Harness::<Policy>::new();
    h.minio.store_policy("readonly", json!({"a": 1}));
    h.store
        .insert(ready(policy("readonly", "readonly", "{ \"a\":1 , \"b\":2 }")));

    assert_eq!(h.step("readonly").await.unwrap(), Outcome::Requeue);
    assert_eq!(h.store.record("readonly").state(), ResourceState::Updating);

    assert_eq!(h.settle("readonly").await.unwrap(), Outcome::Done);
    let record = h.store.record("readonly");
    assert_eq!(record.state(), ResourceState::Ready);
    assert_eq!(record.spec.content, r#"{"a":1,"b":2}"#);
    assert_eq!(h.minio.policy("readonly"), Some(json!({"a": 1, "b": 2})));
}

#[tokio::test]
async fn test_missing_policy_is_recreated() {
    let h = Harness::<Policy>::new();
    h.store.insert(ready(policy("readonly", "readonly", READONLY)));

    h.settle("readonly").await.unwrap();
    assert!(h.minio.policy("readonly").is_some());
    assert_eq!(
        h.store.history("readonly"),
        vec![ResourceState::Updating, ResourceState::Ready]
    );
}

#[tokio::test]
async fn test_invalid_json_is_rejected_locally() {
    let h = Harness::<Policy>::new();
    h.store.insert(policy("broken", "broken", "{ not json"));

    let err = h.settle("broken").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Invalid(_)));
    let record = h.store.record("broken");
    assert_eq!(record.state(), ResourceState::Error);
    assert!(record.message().unwrap().contains("not valid JSON"));
    assert!(h.minio.calls().is_empty());
}

#[tokio::test]
async fn test_observe_failure_is_retried_as_observe() {
    let h = Harness::<Policy>::new();
    h.minio.store_policy("readonly", json!({"a": 1}));
    h.store.insert(ready(policy("readonly", "readonly", r#"{"a":1}"#)));
    h.minio
        .fail("info_canned_policy", api_error("server is initializing"));

    let err = h.step("readonly").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Remote { step: Step::Observe, .. }));
    let record = h.store.record("readonly");
    assert_eq!(record.state(), ResourceState::Error);
    assert_eq!(record.failed_step(), Some("observe"));

    h.minio.clear_failure("info_canned_policy");
    assert_eq!(h.step("readonly").await.unwrap(), Outcome::Done);
    let record = h.store.record("readonly");
    assert_eq!(record.state(), ResourceState::Ready);
    assert!(record.message().is_none());
    assert!(record.failed_step().is_none());
    assert!(!h.minio.called("add_canned_policy"));
}

#[tokio::test]
async fn test_deletion_removes_policy_and_records_event() {
    let h = Harness::<Policy>::new();
    h.minio.store_policy("readonly", json!({"a": 1}));
    h.store.insert(ready(policy("readonly", "readonly", r#"{"a":1}"#)));
    h.store.request_deletion("readonly");

    assert_eq!(h.step("readonly").await.unwrap(), Outcome::Done);
    assert!(h.minio.policy("readonly").is_none());
    assert!(h.store.get_record("readonly").is_none());
    assert_eq!(
        h.store.history("readonly").last(),
        Some(&ResourceState::Degraded)
    );

    let events = h.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name.as_deref(), Some("readonly"));
    assert_eq!(events[0].namespace.as_deref(), Some(NAMESPACE));
}

#[tokio::test]
async fn test_deleting_absent_policy_succeeds() {
    let h = Harness::<Policy>::new();
    h.store.insert(ready(policy("readonly", "readonly", r#"{"a":1}"#)));
    h.store.request_deletion("readonly");

    assert_eq!(h.step("readonly").await.unwrap(), Outcome::Done);
    assert!(h.store.get_record("readonly").is_none());
}
