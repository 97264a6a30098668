//! Archive credential retrieval
//!
//! The archive bucket is cross-account; its S3 credentials live in the
//! SSM parameter store as encrypted parameters. Lookup failure is fatal
//! to the invocation.

use aws_sdk_ssm::Client as SsmClient;
use sos_common::{Result, SosError};
use tracing::info;

/// Access key pair for the archive bucket
#[derive(Debug, Clone)]
pub struct ArchiveCredentials {
    pub access_key: String,
    pub secret_key: String,
}

/// Fetch the archive S3 credentials from the parameter store
pub async fn fetch_archive_credentials(
    ssm: &SsmClient,
    key_parameter: &str,
    secret_parameter: &str,
) -> Result<ArchiveCredentials> {
    let access_key = fetch_parameter(ssm, key_parameter).await?;
    let secret_key = fetch_parameter(ssm, secret_parameter).await?;

    info!("Retrieved archive S3 credentials");

    Ok(ArchiveCredentials {
        access_key,
        secret_key,
    })
}

/// Fetch one decrypted parameter value
pub async fn fetch_parameter(ssm: &SsmClient, name: &str) -> Result<String> {
    let response = ssm
        .get_parameter()
        .name(name)
        .with_decryption(true)
        .send()
        .await
        .map_err(|e| SosError::credential(format!("get_parameter '{name}' failed: {e}")))?;

    response
        .parameter()
        .and_then(|p| p.value())
        .map(|v| v.to_string())
        .ok_or_else(|| SosError::credential(format!("parameter '{name}' has no value")))
}
