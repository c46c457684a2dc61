//! # Request Signing
//!
//! AWS Signature Version 4 for MinIO admin API requests, using the signer the
//! AWS SDK itself uses.
//!
//! MinIO authenticates admin calls exactly like S3 calls: service `s3`, the
//! configured region, and the payload hash sent in `x-amz-content-sha256`.

use crate::constants::CONTROLLER_NAME;
use crate::provider::RemoteError;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest,
    SigningParams, SigningSettings, UriPathNormalizationMode,
};
use aws_sigv4::sign::v4;
use std::time::SystemTime;

const SERVICE: &str = "s3";

/// SigV4 signer bound to one set of credentials
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
}

impl RequestSigner {
    pub fn new(access_key: &str, secret_key: &str, region: &str) -> Self {
        Self {
            credentials: Credentials::new(access_key, secret_key, None, None, CONTROLLER_NAME),
            region: region.to_string(),
        }
    }

    /// Headers to add to the request, `authorization` included
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        body: &[u8],
        time: SystemTime,
    ) -> Result<Vec<(String, String)>, RemoteError> {
        let identity = self.credentials.clone().into();

        // S3 rules: single encoding, no path normalization
        let mut settings = SigningSettings::default();
        settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
        settings.percent_encoding_mode = PercentEncodingMode::Single;
        settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;

        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SERVICE)
            .time(time)
            .settings(settings)
            .build()
            .map_err(|e| RemoteError::Crypto(format!("invalid signing parameters: {e}")))?
            .into();

        let request = SignableRequest::new(
            method,
            url,
            std::iter::empty(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| RemoteError::Crypto(format!("cannot sign {method} {url}: {e}")))?;

        let (instructions, _signature) = sign(request, &params)
            .map_err(|e| RemoteError::Crypto(format!("cannot sign {method} {url}: {e}")))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}
