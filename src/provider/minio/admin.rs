//! # MinIO Admin Client
//!
//! Signed REST client for the MinIO admin API (`/minio/admin/v3`).
//!
//! Routes come from the `paths` crate. Every request is signed with SigV4;
//! the `add-user` and policy attach/detach bodies are additionally encrypted
//! with the caller's secret key (see [`super::crypto`]).

use super::crypto::encrypt_data;
use super::signing::RequestSigner;
use crate::config::MinioConfig;
use crate::crd::AccountStatus;
use crate::provider::{AdminApi, BucketQuota, PolicyAssociation, PolicyInfo, RemoteError, UserInfo};
use async_trait::async_trait;
use paths::{AdminOperation, AdminRequestPath, HttpMethod, PathBuilder};
use serde::Deserialize;
use tracing::debug;
use std::time::SystemTime;
use url::Url;
use zeroize::Zeroizing;

const CODE_NO_SUCH_USER: &str = "XMinioAdminNoSuchUser";
const CODE_NO_SUCH_POLICY: &str = "XMinioAdminNoSuchPolicy";
const CODE_NO_SUCH_BUCKET: &str = "NoSuchBucket";
const CODE_NO_SUCH_QUOTA: [&str; 2] = [
    "XMinioAdminNoSuchQuotaConfiguration",
    "XMinioAdminBucketQuotaConfigNotFound",
];
const CODE_POLICY_ALREADY_APPLIED: &str = "XMinioAdminPolicyChangeAlreadyApplied";

/// Error body returned by the admin API
#[derive(Debug, Default, Deserialize)]
struct AdminErrorBody {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// A failed admin call before it is classified for a specific operation
#[derive(Debug)]
struct AdminFailure {
    status: u16,
    code: String,
    message: String,
}

impl AdminFailure {
    fn parse(status: u16, body: &[u8]) -> Self {
        let parsed: AdminErrorBody = serde_json::from_slice(body).unwrap_or_default();
        let message = if parsed.message.is_empty() {
            String::from_utf8_lossy(body).trim().to_string()
        } else {
            parsed.message
        };
        Self {
            status,
            code: parsed.code,
            message,
        }
    }

    fn is_no_net_effect(&self) -> bool {
        let message = self.message.to_ascii_lowercase();
        self.code == CODE_POLICY_ALREADY_APPLIED
            || message.contains("no net effect")
            || message.contains("already in effect")
    }

    /// Classify for an operation on `kind` named `name`
    fn into_remote(self, kind: &'static str, name: &str) -> RemoteError {
        let not_found = match kind {
            "user" => self.code == CODE_NO_SUCH_USER,
            "policy" => self.code == CODE_NO_SUCH_POLICY,
            "bucket" => self.code == CODE_NO_SUCH_BUCKET,
            _ => false,
        };
        if not_found {
            RemoteError::not_found(kind, name)
        } else if self.is_no_net_effect() {
            RemoteError::NoNetEffect(self.message)
        } else {
            RemoteError::Api {
                status: self.status,
                code: self.code,
                message: self.message,
            }
        }
    }
}

/// Admin API client
pub struct MinioAdminClient {
    http: reqwest::Client,
    base_url: Url,
    signer: RequestSigner,
    /// Also the key of encrypted request bodies
    secret_key: Zeroizing<String>,
}

impl std::fmt::Debug for MinioAdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinioAdminClient")
            .field("base_url", &self.base_url.as_str())
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl MinioAdminClient {
    pub fn new(config: &MinioConfig) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to build HTTP client: {e}")))?;
        Self::with_http_client(
            &config.endpoint_url(),
            &config.access_key_id,
            &config.secret_access_key,
            &config.region,
            http,
        )
    }

    pub fn with_http_client(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        http: reqwest::Client,
    ) -> Result<Self, RemoteError> {
        let base_url = Url::parse(endpoint).map_err(|e| {
            RemoteError::Transport(format!("invalid MinIO endpoint '{endpoint}': {e}"))
        })?;
        if base_url.host_str().is_none() {
            return Err(RemoteError::Transport(format!(
                "MinIO endpoint '{endpoint}' has no host"
            )));
        }
        Ok(Self {
            http,
            base_url,
            signer: RequestSigner::new(access_key, secret_key, region),
            secret_key: Zeroizing::new(secret_key.to_string()),
        })
    }

    fn path(
        operation: AdminOperation,
        params: &[(&str, &str)],
    ) -> Result<AdminRequestPath, RemoteError> {
        params
            .iter()
            .fold(PathBuilder::new(operation), |b, (k, v)| b.param(k, v))
            .build()
            .map_err(|e| RemoteError::InvalidResponse(format!("cannot build request: {e}")))
    }

    /// Endpoint URL for `target`, query parameters form-encoded
    fn request_url(&self, target: &AdminRequestPath) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&target.path);
        url.set_query(None);
        if !target.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&target.query);
        }
        url
    }

    /// Sign and send a request, returning the body of a 2xx response
    async fn execute(
        &self,
        target: AdminRequestPath,
        body: Vec<u8>,
    ) -> Result<Result<Vec<u8>, AdminFailure>, RemoteError> {
        let url = self.request_url(&target);
        let method = match target.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let headers = self
            .signer
            .sign(method.as_str(), url.as_str(), &body, SystemTime::now())?;
        debug!(method = %method, path = %target.path, "minio.admin.request");

        let mut request = self.http.request(method, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if status.is_success() {
            Ok(Ok(bytes.to_vec()))
        } else {
            Ok(Err(AdminFailure::parse(status.as_u16(), &bytes)))
        }
    }

    async fn call(
        &self,
        target: AdminRequestPath,
        body: Vec<u8>,
        kind: &'static str,
        name: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        self.execute(target, body)
            .await?
            .map_err(|failure| failure.into_remote(kind, name))
    }

    fn encrypt(&self, body: &impl serde::Serialize) -> Result<Vec<u8>, RemoteError> {
        let plain = Zeroizing::new(
            serde_json::to_vec(body).map_err(|e| RemoteError::Crypto(e.to_string()))?,
        );
        encrypt_data(&self.secret_key, &plain)
    }

    fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, RemoteError> {
        serde_json::from_slice(body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn change_policies(
        &self,
        operation: AdminOperation,
        req: &PolicyAssociation,
    ) -> Result<(), RemoteError> {
        let target = Self::path(operation, &[])?;
        let body = self.encrypt(req)?;
        self.call(target, body, "user", &req.user).await.map(|_| ())
    }
}

#[async_trait]
impl AdminApi for MinioAdminClient {
    async fn get_bucket_quota(&self, bucket: &str) -> Result<BucketQuota, RemoteError> {
        let target = Self::path(AdminOperation::GetBucketQuota, &[("bucket", bucket)])?;
        match self.execute(target, Vec::new()).await? {
            Ok(body) if body.iter().all(u8::is_ascii_whitespace) => Ok(BucketQuota::default()),
            Ok(body) => Self::decode(&body),
            Err(failure) if CODE_NO_SUCH_QUOTA.contains(&failure.code.as_str()) => {
                Ok(BucketQuota::default())
            }
            Err(failure) => Err(failure.into_remote("bucket", bucket)),
        }
    }

    async fn set_bucket_quota(&self, bucket: &str, quota: &BucketQuota) -> Result<(), RemoteError> {
        let target = Self::path(AdminOperation::SetBucketQuota, &[("bucket", bucket)])?;
        let body = serde_json::to_vec(quota).map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;
        self.call(target, body, "bucket", bucket).await.map(|_| ())
    }

    async fn add_canned_policy(&self, name: &str, policy: &[u8]) -> Result<(), RemoteError> {
        let target = Self::path(AdminOperation::AddCannedPolicy, &[("name", name)])?;
        self.call(target, policy.to_vec(), "policy", name)
            .await
            .map(|_| ())
    }

    async fn info_canned_policy(&self, name: &str) -> Result<PolicyInfo, RemoteError> {
        let target = Self::path(AdminOperation::InfoCannedPolicy, &[("name", name), ("v", "2")])?;
        let body = self.call(target, Vec::new(), "policy", name).await?;
        Self::decode(&body)
    }

    async fn remove_canned_policy(&self, name: &str) -> Result<(), RemoteError> {
        let target = Self::path(AdminOperation::RemoveCannedPolicy, &[("name", name)])?;
        self.call(target, Vec::new(), "policy", name)
            .await
            .map(|_| ())
    }

    async fn set_user(
        &self,
        access_key: &str,
        secret_key: &str,
        status: AccountStatus,
    ) -> Result<(), RemoteError> {
        let target = Self::path(AdminOperation::AddUser, &[("accessKey", access_key)])?;
        let body = self.encrypt(&serde_json::json!({
            "secretKey": secret_key,
            "status": status.as_str(),
        }))?;
        self.call(target, body, "user", access_key).await.map(|_| ())
    }

    async fn get_user_info(&self, access_key: &str) -> Result<UserInfo, RemoteError> {
        let target = Self::path(AdminOperation::UserInfo, &[("accessKey", access_key)])?;
        let body = self.call(target, Vec::new(), "user", access_key).await?;
        Self::decode(&body)
    }

    async fn remove_user(&self, access_key: &str) -> Result<(), RemoteError> {
        let target = Self::path(AdminOperation::RemoveUser, &[("accessKey", access_key)])?;
        self.call(target, Vec::new(), "user", access_key)
            .await
            .map(|_| ())
    }

    async fn attach_policy(&self, req: &PolicyAssociation) -> Result<(), RemoteError> {
        self.change_policies(AdminOperation::AttachPolicy, req).await
    }

    async fn detach_policy(&self, req: &PolicyAssociation) -> Result<(), RemoteError> {
        self.change_policies(AdminOperation::DetachPolicy, req).await
    }
}
