//! Behaviour shared by every kind: record write conflicts, configuration
//! failures, the Degraded state and the controller wrappers around a step

use super::common::*;
use kube::runtime::controller::Action;
use minio_operator::config::{ConfigError, ControllerConfig};
use minio_operator::controller::{reconcile_step, Outcome, ReconcileError, StoreError};
use minio_operator::crd::{AccountStatus, Bucket, ManagedResource, Policy, ResourceState, User};
use minio_operator::runtime::{error_policy, reconcile, ControllerContext};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_conflicting_status_write_is_retried() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 0));
    h.store.inject_conflicts(2);

    assert_eq!(h.step("data").await.unwrap(), Outcome::Requeue);
    assert_eq!(h.store.record("data").state(), ResourceState::Creating);
}

#[tokio::test]
async fn test_conflict_retries_are_bounded() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 0));
    h.store.inject_conflicts(100);

    let err = h.step("data").await.unwrap_err();
    match err {
        ReconcileError::Store(StoreError::RetriesExhausted { name, attempts }) => {
            assert_eq!(name, "data");
            assert_eq!(attempts, 6);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_stale_copy_rereads_instead_of_overwriting() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 0));
    let stale = h.store.record("data");
    h.store.set_status("data", ResourceState::Creating, None);
    let patches = h.store.patch_count();

    assert_eq!(
        reconcile_step(&stale, &h.ctx).await.unwrap(),
        Outcome::Requeue
    );
    // The fresh record already carries the write
    assert_eq!(h.store.patch_count(), patches);
    assert_eq!(h.store.record("data").state(), ResourceState::Creating);
}

#[tokio::test]
async fn test_finalizers_of_other_controllers_are_kept() {
    let h = Harness::<Policy>::new();
    let mut record = policy("readonly", "readonly", r#"{"a":1}"#);
    record.metadata.finalizers = Some(vec!["example.com/backup".to_string()]);
    h.store.insert(record);

    h.settle("readonly").await.unwrap();
    assert_eq!(
        h.store.record("readonly").metadata.finalizers,
        Some(vec![
            "example.com/backup".to_string(),
            <Policy as ManagedResource>::FINALIZER.to_string(),
        ])
    );

    h.store.request_deletion("readonly");
    h.step("readonly").await.unwrap();
    assert_eq!(
        h.store.record("readonly").metadata.finalizers,
        Some(vec!["example.com/backup".to_string()])
    );
}

#[tokio::test]
async fn test_missing_configuration_fails_every_kind() {
    let missing = || {
        |mut remotes: FakeRemotes| {
            remotes.config_error = Some(ConfigError::Missing("MINIO_ENDPOINT".to_string()));
            remotes
        }
    };

    let buckets = Harness::<Bucket>::with_remotes(missing());
    buckets.store.insert(bucket("data", "data-bucket", 0));
    buckets.settle("data").await.unwrap_err();
    assert!(buckets
        .store
        .record("data")
        .message()
        .unwrap()
        .contains("MINIO_ENDPOINT"));

    let policies = Harness::<Policy>::with_remotes(missing());
    policies
        .store
        .insert(policy("readonly", "readonly", r#"{"a":1}"#));
    policies.settle("readonly").await.unwrap_err();
    assert_eq!(
        policies.store.record("readonly").state(),
        ResourceState::Error
    );

    let users = Harness::<User>::with_remotes(missing());
    users
        .store
        .insert(user("analyst", "analyst", &[], AccountStatus::Enabled));
    users.settle("analyst").await.unwrap_err();
    assert_eq!(users.store.record("analyst").state(), ResourceState::Error);

    assert!(buckets.minio.calls().is_empty());
}

#[tokio::test]
async fn test_degraded_without_deletion_is_left_alone() {
    let h = Harness::<Bucket>::new();
    h.store.insert(ready(bucket("data", "data-bucket", 0)));
    h.store.set_status("data", ResourceState::Degraded, None);

    assert_eq!(h.step("data").await.unwrap(), Outcome::Done);
    assert!(h.minio.calls().is_empty());
    assert_eq!(h.store.record("data").state(), ResourceState::Degraded);
}

#[tokio::test]
async fn test_controller_actions_follow_outcome() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 0));
    let store = Arc::clone(&h.store);
    let ctx = Arc::new(ControllerContext::new(h.ctx, ControllerConfig::default()));

    let action = reconcile(Arc::new(store.record("data")), Arc::clone(&ctx))
        .await
        .unwrap();
    assert_eq!(action, Action::requeue(Duration::ZERO));

    // Creating, then the first drift check
    reconcile(Arc::new(store.record("data")), Arc::clone(&ctx))
        .await
        .unwrap();
    let action = reconcile(Arc::new(store.record("data")), ctx).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(300)));
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_deadline_leaves_record_untouched() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 0));
    h.store.set_status("data", ResourceState::Creating, None);
    h.minio.stall("bucket_exists");
    let store = Arc::clone(&h.store);
    let minio = Arc::clone(&h.minio);
    let patches = store.patch_count();
    let config = ControllerConfig {
        reconcile_timeout_secs: 5,
        ..ControllerConfig::default()
    };
    let ctx = Arc::new(ControllerContext::new(h.ctx, config));

    let err = reconcile(Arc::new(store.record("data")), ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Timeout(d) if d == Duration::from_secs(5)));

    let record = store.record("data");
    assert_eq!(record.state(), ResourceState::Creating);
    assert!(record.message().is_none());
    assert_eq!(store.patch_count(), patches);
    assert!(store.history("data").is_empty());
    assert_eq!(minio.calls(), vec!["bucket_exists".to_string()]);
    assert!(minio.bucket("data-bucket").is_none());
}

#[tokio::test]
async fn test_error_policy_backs_off_per_resource_and_resets() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 0));
    h.store.insert(bucket("logs", "logs-bucket", 0));
    let store = Arc::clone(&h.store);
    let ctx = Arc::new(ControllerContext::new(h.ctx, ControllerConfig::default()));
    let err = ReconcileError::Timeout(Duration::from_secs(60));

    let data = Arc::new(store.record("data"));
    let delays: Vec<Action> = (0..3)
        .map(|_| error_policy(Arc::clone(&data), &err, Arc::clone(&ctx)))
        .collect();
    assert_eq!(
        delays,
        vec![
            Action::requeue(Duration::from_secs(5)),
            Action::requeue(Duration::from_secs(5)),
            Action::requeue(Duration::from_secs(10)),
        ]
    );

    // Another record starts from the minimum
    let logs = Arc::new(store.record("logs"));
    assert_eq!(
        error_policy(logs, &err, Arc::clone(&ctx)),
        Action::requeue(Duration::from_secs(5))
    );

    // Success clears the state
    reconcile(Arc::new(store.record("data")), Arc::clone(&ctx))
        .await
        .unwrap();
    assert_eq!(
        error_policy(data, &err, ctx),
        Action::requeue(Duration::from_secs(5))
    );
}
