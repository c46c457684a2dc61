//! MinIO Operator Library
//!
//! Reconciles MinIO buckets, canned policies and users declared as Kubernetes
//! custom resources. The binaries in `src/main.rs` and `src/controller/crdgen.rs`
//! are thin wrappers over this library.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod provider;
pub mod runtime;

// Re-export CRD types for convenience
pub use crd::*;
