//! Bucket state machine

use super::common::*;
use minio_operator::controller::{Outcome, ReconcileError, Step};
use minio_operator::crd::{Bucket, ManagedResource, ResourceState};
use minio_operator::provider::RemoteError;

#[tokio::test]
async fn test_create_reaches_ready_with_finalizer_and_quota() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 10_000_000));

    assert_eq!(h.settle("data").await.unwrap(), Outcome::Done);

    let record = h.store.record("data");
    assert_eq!(record.state(), ResourceState::Ready);
    assert!(record.message().is_none());
    assert!(record.has_finalizer());
    assert_eq!(h.minio.bucket("data-bucket").unwrap().quota, 10_000_000);
    assert_eq!(
        h.store.history("data"),
        vec![ResourceState::Creating, ResourceState::Ready]
    );
}

#[tokio::test]
async fn test_first_step_only_claims_creating() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 0));

    assert_eq!(h.step("data").await.unwrap(), Outcome::Requeue);
    assert_eq!(h.store.record("data").state(), ResourceState::Creating);
    assert!(h.minio.calls().is_empty());
}

#[tokio::test]
async fn test_creation_is_idempotent_for_existing_bucket() {
    let h = Harness::<Bucket>::new();
    h.minio.add_bucket("data-bucket", 0, 0);
    h.store.insert(bucket("data", "data-bucket", 0));

    h.settle("data").await.unwrap();
    assert_eq!(h.store.record("data").state(), ResourceState::Ready);
    assert!(!h.minio.called("make_bucket"));

    // A second Creating pass over the existing bucket goes straight to Ready
    h.store.set_status("data", ResourceState::Creating, None);
    assert_eq!(h.step("data").await.unwrap(), Outcome::Requeue);
    assert_eq!(h.store.record("data").state(), ResourceState::Ready);
    assert!(!h.store.history("data").contains(&ResourceState::Error));
}

#[tokio::test]
async fn test_quota_converges_through_updating() {
    let h = Harness::<Bucket>::new();
    h.minio.add_bucket("data-bucket", 0, 0);
    h.store.insert(ready(bucket("data", "data-bucket", 10_000_000)));

    assert_eq!(h.step("data").await.unwrap(), Outcome::Requeue);
    assert_eq!(h.store.record("data").state(), ResourceState::Updating);
    // Drift detection is read-only
    assert_eq!(h.minio.bucket("data-bucket").unwrap().quota, 0);

    assert_eq!(h.step("data").await.unwrap(), Outcome::Requeue);
    assert_eq!(h.store.record("data").state(), ResourceState::Ready);
    assert_eq!(h.minio.bucket("data-bucket").unwrap().quota, 10_000_000);

    assert_eq!(h.step("data").await.unwrap(), Outcome::Done);
}

#[tokio::test]
async fn test_quota_removed_remotely_is_restored() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("data", "data-bucket", 2048));
    h.settle("data").await.unwrap();

    h.minio.set_quota("data-bucket", 0);
    assert_eq!(h.settle("data").await.unwrap(), Outcome::Done);
    assert_eq!(h.minio.bucket("data-bucket").unwrap().quota, 2048);
    assert_eq!(h.store.record("data").state(), ResourceState::Ready);
}

#[tokio::test]
async fn test_failed_create_is_retried_including_quota() {
    let h = Harness::<Bucket>::new();
    h.minio
        .fail("set_bucket_quota", api_error("quota backend unavailable"));
    h.store.insert(bucket("data", "data-bucket", 5_000_000));

    let err = h.settle("data").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Remote { step: Step::Create, .. }));
    let record = h.store.record("data");
    assert_eq!(record.state(), ResourceState::Error);
    assert!(record.message().unwrap().contains("quota backend unavailable"));
    assert!(!record.has_finalizer());

    h.minio.clear_failure("set_bucket_quota");
    assert_eq!(h.settle("data").await.unwrap(), Outcome::Done);
    let record = h.store.record("data");
    assert_eq!(record.state(), ResourceState::Ready);
    assert!(record.message().is_none());
    assert!(record.has_finalizer());
    assert_eq!(h.minio.bucket("data-bucket").unwrap().quota, 5_000_000);
}

#[tokio::test]
async fn test_error_message_reflects_latest_attempt() {
    let h = Harness::<Bucket>::new();
    h.minio.add_bucket("data-bucket", 0, 0);
    h.store.insert(ready(bucket("data", "data-bucket", 1_000_000)));
    h.minio.fail("set_bucket_quota", api_error("first failure"));

    h.step("data").await.unwrap();
    let err = h.step("data").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Remote { step: Step::Apply, .. }));
    assert!(h
        .store
        .record("data")
        .message()
        .unwrap()
        .contains("first failure"));

    assert_eq!(h.store.record("data").failed_step(), Some("apply"));

    h.minio.fail("set_bucket_quota", api_error("second failure"));
    h.step("data").await.unwrap_err();
    let record = h.store.record("data");
    assert_eq!(record.state(), ResourceState::Error);
    let message = record.message().unwrap();
    assert!(message.contains("second failure"));
    assert!(!message.contains("first failure"));
}

#[tokio::test]
async fn test_failed_drift_check_is_retried_without_writes() {
    let h = Harness::<Bucket>::new();
    h.minio.add_bucket("data-bucket", 1_000_000, 0);
    h.store.insert(ready(bucket("data", "data-bucket", 1_000_000)));
    h.minio.fail("get_bucket_quota", api_error("admin API unavailable"));

    let err = h.step("data").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Remote { step: Step::Observe, .. }));
    assert_eq!(h.store.record("data").failed_step(), Some("observe"));

    h.minio.clear_failure("get_bucket_quota");
    assert_eq!(h.step("data").await.unwrap(), Outcome::Done);
    let record = h.store.record("data");
    assert_eq!(record.state(), ResourceState::Ready);
    assert!(record.message().is_none());
    assert!(record.failed_step().is_none());
    assert!(!h.minio.called("bucket_exists"));
    assert!(!h.minio.called("set_bucket_quota"));
}

#[tokio::test]
async fn test_drift_found_by_retried_check_is_applied() {
    let h = Harness::<Bucket>::new();
    h.minio.add_bucket("data-bucket", 0, 0);
    h.store.insert(ready(bucket("data", "data-bucket", 1_000_000)));
    h.minio.fail("get_bucket_quota", api_error("admin API unavailable"));
    h.step("data").await.unwrap_err();

    h.minio.clear_failure("get_bucket_quota");
    assert_eq!(h.settle("data").await.unwrap(), Outcome::Done);
    assert_eq!(h.minio.bucket("data-bucket").unwrap().quota, 1_000_000);
    assert_eq!(h.store.record("data").state(), ResourceState::Ready);
}

#[tokio::test]
async fn test_missing_bucket_is_drift_and_recreated() {
    let h = Harness::<Bucket>::new();
    h.store.insert(ready(bucket("data", "data-bucket", 0)));

    h.step("data").await.unwrap();
    assert_eq!(h.store.record("data").state(), ResourceState::Updating);

    h.step("data").await.unwrap();
    assert_eq!(h.store.record("data").state(), ResourceState::Ready);
    assert!(h.minio.bucket("data-bucket").is_some());
}

#[tokio::test]
async fn test_invalid_name_fails_before_remote_calls() {
    let h = Harness::<Bucket>::new();
    h.store.insert(bucket("bad", "Bad_Name", 0));

    let err = h.settle("bad").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Invalid(_)));
    let record = h.store.record("bad");
    assert_eq!(record.state(), ResourceState::Error);
    assert!(record.message().unwrap().contains("does not match"));
    assert!(h.minio.calls().is_empty());
}

#[tokio::test]
async fn test_non_empty_bucket_blocks_deletion_without_drain() {
    let h = Harness::<Bucket>::new();
    h.minio.add_bucket("data-bucket", 0, 3);
    h.store.insert(ready(bucket("data", "data-bucket", 0)));
    h.store.request_deletion("data");

    for _ in 0..3 {
        let err = h.step("data").await.unwrap_err();
        match err {
            ReconcileError::Remote { step, source } => {
                assert_eq!(step, Step::Remove);
                assert!(source.is_bucket_not_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    let record = h.store.record("data");
    assert!(record.has_finalizer());
    assert_eq!(record.state(), ResourceState::Error);
    assert_eq!(h.minio.bucket("data-bucket").unwrap().objects.len(), 3);
    assert!(!h.minio.called("remove_objects"));
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn test_drain_purges_and_releases_finalizer() {
    let h = Harness::<Bucket>::with_remotes(|mut remotes| {
        remotes.drain_on_delete = true;
        remotes
    });
    h.minio.add_bucket("data-bucket", 0, 3);
    h.store.insert(ready(bucket("data", "data-bucket", 0)));
    h.store.request_deletion("data");

    assert_eq!(h.step("data").await.unwrap(), Outcome::Done);

    assert!(h.store.get_record("data").is_none());
    assert!(h.minio.bucket("data-bucket").is_none());
    assert_eq!(h.store.history("data").last(), Some(&ResourceState::Degraded));

    let events = h.events.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].warning);
    assert_eq!(events[0].reason, "Deleting");
    assert_eq!(
        events[0].note.as_deref(),
        Some("Custom Resource data is being deleted from the namespace default")
    );
}

#[tokio::test]
async fn test_drain_gives_up_after_bounded_rounds() {
    let h = Harness::<Bucket>::with_remotes(|mut remotes| {
        remotes.drain_on_delete = true;
        remotes
    });
    h.minio.add_bucket("data-bucket", 0, 3);
    h.minio.refill_after_purge(2);
    h.store.insert(ready(bucket("data", "data-bucket", 0)));
    h.store.request_deletion("data");

    let err = h.step("data").await.unwrap_err();
    match err {
        ReconcileError::Remote {
            step: Step::Remove,
            source: RemoteError::DrainExceeded { bucket, rounds },
        } => {
            assert_eq!(bucket, "data-bucket");
            assert_eq!(rounds, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.store.record("data").has_finalizer());
}

#[tokio::test]
async fn test_already_absent_bucket_counts_as_removed() {
    let h = Harness::<Bucket>::new();
    h.store.insert(ready(bucket("data", "data-bucket", 0)));
    h.store.request_deletion("data");

    assert_eq!(h.step("data").await.unwrap(), Outcome::Done);
    assert!(h.store.get_record("data").is_none());
    assert_eq!(h.events.events().len(), 1);
}

#[tokio::test]
async fn test_deletion_without_finalizer_touches_nothing() {
    let h = Harness::<Bucket>::new();
    h.minio.add_bucket("data-bucket", 0, 0);
    let mut record = ready(bucket("data", "data-bucket", 0));
    record.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
    h.store.insert(record);
    h.store.request_deletion("data");

    assert_eq!(h.step("data").await.unwrap(), Outcome::Done);
    assert!(h.minio.bucket("data-bucket").is_some());
    assert!(h.minio.calls().is_empty());
    assert!(h.events.events().is_empty());
}
