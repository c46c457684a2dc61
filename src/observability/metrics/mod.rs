//! # Metrics Module
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text exposition
//! - `controller_metrics` - Reconciliations, state transitions, requeues and bucket drains

pub mod controller_metrics;
pub mod registry;

pub use controller_metrics::*;
pub use registry::*;
