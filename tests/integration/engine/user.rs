//! User state machine

use super::common::*;
use minio_operator::controller::{Outcome, ReconcileError, Step};
use minio_operator::crd::{AccountStatus, ManagedResource, ResourceState, User};
use std::collections::BTreeSet;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_create_upserts_and_attaches_policies() {
    let h = Harness::<User>::new();
    h.store.insert(user(
        "analyst",
        "analyst",
        &["readonly", "diagnostics"],
        AccountStatus::Enabled,
    ));

    assert_eq!(h.settle("analyst").await.unwrap(), Outcome::Done);

    let record = h.store.record("analyst");
    assert_eq!(record.state(), ResourceState::Ready);
    assert!(record.has_finalizer());
    let remote = h.minio.user("analyst").unwrap();
    assert_eq!(remote.secret_key, "analyst-secret");
    assert_eq!(remote.status, AccountStatus::Enabled);
    assert_eq!(remote.policies, set(&["diagnostics", "readonly"]));
}

#[tokio::test]
async fn test_policy_diff_converges_attached_set() {
    let h = Harness::<User>::new();
    h.minio.add_user("analyst", &["diagnostics", "writeonly"]);
    h.store.insert(ready(user(
        "analyst",
        "analyst",
        &["readonly", "diagnostics"],
        AccountStatus::Enabled,
    )));

    assert_eq!(h.step("analyst").await.unwrap(), Outcome::Done);

    assert_eq!(
        h.minio.user("analyst").unwrap().policies,
        set(&["diagnostics", "readonly"])
    );
    let calls = h.minio.calls();
    let detach = calls.iter().position(|c| c == "detach_policy").unwrap();
    let attach = calls.iter().position(|c| c == "attach_policy").unwrap();
    assert!(detach < attach);
    // Convergence happens in place, without an Updating round trip
    assert_eq!(h.store.record("analyst").state(), ResourceState::Ready);
    assert!(h.store.history("analyst").is_empty());
}

#[tokio::test]
async fn test_credentials_are_resubmitted_every_pass() {
    let h = Harness::<User>::new();
    h.minio.add_user("analyst", &[]);
    h.store
        .insert(ready(user("analyst", "analyst", &[], AccountStatus::Enabled)));

    h.step("analyst").await.unwrap();
    h.step("analyst").await.unwrap();

    assert_eq!(h.minio.user("analyst").unwrap().secret_key, "analyst-secret");
    let upserts = h.minio.calls().iter().filter(|c| *c == "set_user").count();
    assert_eq!(upserts, 2);
}

#[tokio::test]
async fn test_disabled_account_leaves_policies_alone() {
    let h = Harness::<User>::new();
    h.minio.add_user("analyst", &["writeonly"]);
    h.store.insert(ready(user(
        "analyst",
        "analyst",
        &["readonly"],
        AccountStatus::Disabled,
    )));

    assert_eq!(h.step("analyst").await.unwrap(), Outcome::Done);

    let remote = h.minio.user("analyst").unwrap();
    assert_eq!(remote.status, AccountStatus::Disabled);
    assert_eq!(remote.policies, set(&["writeonly"]));
    assert!(!h.minio.called("attach_policy"));
    assert!(!h.minio.called("detach_policy"));
}

#[tokio::test]
async fn test_disabled_account_created_without_policies() {
    let h = Harness::<User>::new();
    h.store.insert(user(
        "analyst",
        "analyst",
        &["readonly"],
        AccountStatus::Disabled,
    ));

    h.settle("analyst").await.unwrap();
    assert_eq!(h.store.record("analyst").state(), ResourceState::Ready);
    assert!(h.minio.user("analyst").unwrap().policies.is_empty());
    assert!(!h.minio.called("attach_policy"));
}

#[tokio::test]
async fn test_attach_without_net_effect_is_success() {
    let h = Harness::<User>::new();
    h.minio.add_user("analyst", &["readonly"]);
    h.store
        .insert(user("analyst", "analyst", &["readonly"], AccountStatus::Enabled));

    assert_eq!(h.settle("analyst").await.unwrap(), Outcome::Done);
    assert!(h.minio.called("attach_policy"));
    assert_eq!(h.store.record("analyst").state(), ResourceState::Ready);
    assert!(!h.store.history("analyst").contains(&ResourceState::Error));
}

#[tokio::test]
async fn test_empty_policy_entries_are_ignored() {
    let h = Harness::<User>::new();
    h.store.insert(user(
        "analyst",
        "analyst",
        &["", "readonly", ""],
        AccountStatus::Enabled,
    ));

    h.settle("analyst").await.unwrap();
    assert_eq!(h.minio.user("analyst").unwrap().policies, set(&["readonly"]));
}

#[tokio::test]
async fn test_user_info_failure_sets_error() {
    let h = Harness::<User>::new();
    h.minio.add_user("analyst", &[]);
    h.store
        .insert(ready(user("analyst", "analyst", &[], AccountStatus::Enabled)));
    h.minio.fail("get_user_info", api_error("admin API unavailable"));

    let err = h.step("analyst").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Remote { step: Step::Observe, .. }));
    let record = h.store.record("analyst");
    assert_eq!(record.state(), ResourceState::Error);
    assert!(record.message().unwrap().contains("admin API unavailable"));
}

#[tokio::test]
async fn test_deletion_removes_user() {
    let h = Harness::<User>::new();
    h.minio.add_user("analyst", &["readonly"]);
    h.store
        .insert(ready(user("analyst", "analyst", &["readonly"], AccountStatus::Enabled)));
    h.store.request_deletion("analyst");

    assert_eq!(h.step("analyst").await.unwrap(), Outcome::Done);
    assert!(h.minio.user("analyst").is_none());
    assert!(h.store.get_record("analyst").is_none());
    assert_eq!(h.events.events()[0].reason, "Deleting");
}
