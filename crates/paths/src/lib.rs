//! Shared MinIO admin API path definitions
//!
//! This crate centralizes the admin REST routes the operator calls so the
//! client and any test doubles agree on the exact paths, methods and query
//! parameters.
//!
//! ## PathBuilder
//!
//! The `PathBuilder` provides a builder-pattern API for turning an
//! [`AdminOperation`] plus its parameters into a request path and sorted
//! query parameters.

pub mod admin;
pub mod builder;

pub use admin::{AdminOperation, HttpMethod, ADMIN_API_PREFIX};
pub use builder::{AdminRequestPath, PathBuilder, PathBuilderError};
