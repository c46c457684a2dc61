//! # Runtime Module
//!
//! Runtime components of the MinIO operator: initialization, the watch loop
//! that drives one controller per kind, and the error policy.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use error_policy::*;
pub use initialization::*;
pub use watch_loop::*;
