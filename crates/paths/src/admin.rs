//! # MinIO Admin Operations
//!
//! Route, method and required query parameters for each admin call.

/// Prefix shared by every admin route (admin API version 3)
pub const ADMIN_API_PREFIX: &str = "/minio/admin/v3";

/// HTTP method used by an admin operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Admin API operations used by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminOperation {
    GetBucketQuota,
    SetBucketQuota,
    AddCannedPolicy,
    InfoCannedPolicy,
    RemoveCannedPolicy,
    AddUser,
    UserInfo,
    RemoveUser,
    AttachPolicy,
    DetachPolicy,
}

impl AdminOperation {
    /// Route relative to [`ADMIN_API_PREFIX`]
    pub fn route(self) -> &'static str {
        match self {
            AdminOperation::GetBucketQuota => "/get-bucket-quota",
            AdminOperation::SetBucketQuota => "/set-bucket-quota",
            AdminOperation::AddCannedPolicy => "/add-canned-policy",
            AdminOperation::InfoCannedPolicy => "/info-canned-policy",
            AdminOperation::RemoveCannedPolicy => "/remove-canned-policy",
            AdminOperation::AddUser => "/add-user",
            AdminOperation::UserInfo => "/user-info",
            AdminOperation::RemoveUser => "/remove-user",
            AdminOperation::AttachPolicy => "/idp/builtin/policy/attach",
            AdminOperation::DetachPolicy => "/idp/builtin/policy/detach",
        }
    }

    pub fn method(self) -> HttpMethod {
        match self {
            AdminOperation::GetBucketQuota
            | AdminOperation::InfoCannedPolicy
            | AdminOperation::UserInfo => HttpMethod::Get,
            AdminOperation::SetBucketQuota
            | AdminOperation::AddCannedPolicy
            | AdminOperation::AddUser => HttpMethod::Put,
            AdminOperation::AttachPolicy | AdminOperation::DetachPolicy => HttpMethod::Post,
            AdminOperation::RemoveCannedPolicy | AdminOperation::RemoveUser => HttpMethod::Delete,
        }
    }

    /// Query parameters that must be supplied for the call to be valid
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            AdminOperation::GetBucketQuota | AdminOperation::SetBucketQuota => &["bucket"],
            AdminOperation::AddCannedPolicy
            | AdminOperation::InfoCannedPolicy
            | AdminOperation::RemoveCannedPolicy => &["name"],
            AdminOperation::AddUser | AdminOperation::UserInfo | AdminOperation::RemoveUser => {
                &["accessKey"]
            }
            AdminOperation::AttachPolicy | AdminOperation::DetachPolicy => &[],
        }
    }

    /// Full path including the admin prefix
    pub fn full_path(self) -> String {
        format!("{ADMIN_API_PREFIX}{}", self.route())
    }
}
