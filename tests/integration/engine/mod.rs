//! Engine integration tests, organized by resource kind


mod bucket;
mod lifecycle;
mod policy;
mod user;
