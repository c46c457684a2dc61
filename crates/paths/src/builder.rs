//! # Path Builder
//!
//! Builds admin request paths with validated query parameters, sorted by key
//! so the same call always produces the same request target.

use crate::admin::{AdminOperation, HttpMethod};

/// Errors raised while building a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathBuilderError {
    /// A parameter the operation requires was not supplied
    MissingParam {
        operation: AdminOperation,
        param: &'static str,
    },
    /// A required parameter was supplied with an empty value
    EmptyParam(String),
}

impl std::fmt::Display for PathBuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathBuilderError::MissingParam { operation, param } => {
                write!(f, "missing query parameter '{param}' for {operation:?}")
            }
            PathBuilderError::EmptyParam(param) => {
                write!(f, "query parameter '{param}' must not be empty")
            }
        }
    }
}

impl std::error::Error for PathBuilderError {}

/// A fully built admin request target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRequestPath {
    pub method: HttpMethod,
    pub path: String,
    /// Query parameters sorted by key, then value
    pub query: Vec<(String, String)>,
}

/// Builder for [`AdminRequestPath`]
#[derive(Debug, Clone)]
pub struct PathBuilder {
    operation: AdminOperation,
    params: Vec<(String, String)>,
}

impl PathBuilder {
    pub fn new(operation: AdminOperation) -> Self {
        Self {
            operation,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> Result<AdminRequestPath, PathBuilderError> {
        for required in self.operation.required_params() {
            match self.params.iter().find(|(k, _)| k == required) {
                None => {
                    return Err(PathBuilderError::MissingParam {
                        operation: self.operation,
                        param: required,
                    })
                }
                Some((k, v)) if v.is_empty() => {
                    return Err(PathBuilderError::EmptyParam(k.clone()));
                }
                Some(_) => {}
            }
        }

        let mut query = self.params;
        query.sort();

        Ok(AdminRequestPath {
            method: self.operation.method(),
            path: self.operation.full_path(),
            query,
        })
    }
}
