//! Pipeline configuration
//!
//! One immutable struct handed to the orchestrator at construction,
//! replacing scattered constants. Values match the PO.DAAC SoS discharge
//! collection; environment variables override individual fields.

use sos_common::Result;
use std::path::PathBuf;

/// CNM message schema version
pub const DEFAULT_MESSAGE_VERSION: &str = "1.4";

/// Data provider identifier carried in every CNM message
pub const DEFAULT_PROVIDER: &str = "NASA/JPL/PO.DAAC";

/// Archive collection the granules belong to
pub const DEFAULT_COLLECTION: &str = "SWOT_L4_DAWG_SOS_DISCHARGE";

/// AWS region hosting the SSM parameters and SNS topic
pub const DEFAULT_REGION: &str = "us-west-2";

/// Whole-invocation deadline in seconds
pub const DEFAULT_DEADLINE_SECS: u64 = 900;

/// Immutable configuration for one pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// CNM `version` field
    pub message_version: String,

    /// CNM `provider` field
    pub provider: String,

    /// Archive collection id; also the archive-bucket key prefix
    pub collection: String,

    /// Local scratch directory for staged copies
    pub scratch_dir: PathBuf,

    /// AWS region for SSM and SNS clients
    pub region: String,

    /// SSM parameter holding the archive S3 access key
    pub archive_key_parameter: String,

    /// SSM parameter holding the archive S3 secret key
    pub archive_secret_parameter: String,

    /// SSM parameter holding the CNM topic ARN
    pub topic_parameter: String,

    /// Deadline for the whole invocation; expiry is fatal
    pub deadline_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            message_version: DEFAULT_MESSAGE_VERSION.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            scratch_dir: std::env::temp_dir().join("sos-upload"),
            region: DEFAULT_REGION.to_string(),
            archive_key_parameter: "podaac_key".to_string(),
            archive_secret_parameter: "podaac_secret".to_string(),
            topic_parameter: "podaac_cnm_topic_arn".to_string(),
            deadline_secs: DEFAULT_DEADLINE_SECS,
        }
    }
}

impl PipelineConfig {
    /// Load defaults with environment overrides
    ///
    /// - `SOS_SCRATCH_DIR`: scratch directory for staged copies
    /// - `SOS_REGION`: AWS region
    /// - `SOS_COLLECTION`: archive collection id
    /// - `SOS_TOPIC_PARAMETER`: SSM parameter for the CNM topic ARN
    /// - `SOS_DEADLINE_SECS`: invocation deadline
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("SOS_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }

        if let Ok(region) = std::env::var("SOS_REGION") {
            config.region = region;
        }

        if let Ok(collection) = std::env::var("SOS_COLLECTION") {
            config.collection = collection;
        }

        if let Ok(parameter) = std::env::var("SOS_TOPIC_PARAMETER") {
            config.topic_parameter = parameter;
        }

        if let Ok(deadline) = std::env::var("SOS_DEADLINE_SECS") {
            config.deadline_secs = deadline.parse().map_err(|_| {
                sos_common::SosError::config(format!(
                    "SOS_DEADLINE_SECS must be an integer, got '{deadline}'"
                ))
            })?;
        }

        Ok(config)
    }

    /// Key of a file under the archive collection prefix
    pub fn archive_key(&self, file_name: &str) -> String {
        format!("{}/{}", self.collection, file_name)
    }
}
