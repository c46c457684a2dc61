//! # Drift Detection
//!
//! Pure comparisons between a desired spec and an observed remote snapshot.

use crate::provider::BucketQuota;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// True when the remote quota limit differs from the desired one
pub fn quota_drifted(desired: u64, observed: &BucketQuota) -> bool {
    observed.limit() != desired
}

/// Parse a JSON document and re-serialize it compactly with sorted keys
pub fn canonical_json(document: &str) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::from_str(document)?;
    Ok(canonical_value(&value))
}

/// Compact serialization of `value` with object keys sorted at every level
pub fn canonical_value(value: &Value) -> String {
    sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Semantic equality of a desired policy document and the stored one
///
/// Whitespace and key order never count as drift.
pub fn policies_equivalent(desired: &str, observed: &Value) -> Result<bool, serde_json::Error> {
    Ok(canonical_json(desired)? == canonical_value(observed))
}

/// Policy changes needed to bring a user's attachments to the desired set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDiff {
    pub to_detach: Vec<String>,
    pub to_attach: Vec<String>,
}

impl PolicyDiff {
    pub fn is_empty(&self) -> bool {
        self.to_detach.is_empty() && self.to_attach.is_empty()
    }
}

/// Symmetric difference of desired and attached policies, sorted, blanks ignored
pub fn policy_diff<D, A>(desired: &[D], actual: &[A]) -> PolicyDiff
where
    D: AsRef<str>,
    A: AsRef<str>,
{
    let desired: BTreeSet<&str> = desired
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect();
    let actual: BTreeSet<&str> = actual
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect();

    PolicyDiff {
        to_detach: actual.difference(&desired).map(|p| (*p).to_string()).collect(),
        to_attach: desired.difference(&actual).map(|p| (*p).to_string()).collect(),
    }
}

/// Split the comma separated policy list reported by `user-info`
pub fn parse_policy_list(policy_name: &str) -> Vec<String> {
    policy_name
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
