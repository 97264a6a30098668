//! CNM notification message construction
//!
//! One message is built per complete granule and handed to the publisher.
//! Construction is deterministic: the same granule, version, and clock
//! value serialize to identical bytes.

use crate::config::PipelineConfig;
use crate::granule::{CompleteGranule, EnrichedFile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checksum type literal expected by the downstream ingestion system
const CHECKSUM_TYPE: &str = "md5";

/// File type literal for granule data files
const FILE_TYPE: &str = "data";

/// CNM message describing one staged granule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnmMessage {
    pub version: String,
    pub provider: String,
    pub collection: String,
    #[serde(rename = "submissionTime")]
    pub submission_time: String,
    pub identifier: String,
    pub product: CnmProduct,
}

/// Product block: the granule's files and data version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnmProduct {
    pub name: String,
    pub files: Vec<CnmFile>,
    #[serde(rename = "dataVersion")]
    pub data_version: String,
}

/// Descriptor for one transferred file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnmFile {
    pub uri: String,
    pub checksum: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: String,
    pub name: String,
    #[serde(rename = "checksumType")]
    pub checksum_type: String,
}

impl CnmFile {
    fn from_enriched(config: &PipelineConfig, bucket: &str, file: &EnrichedFile) -> Self {
        Self {
            uri: format!("s3://{}/{}/{}", bucket, config.collection, file.file_name),
            checksum: file.checksum.clone(),
            size: file.size_bytes,
            file_type: FILE_TYPE.to_string(),
            name: file.file_name.clone(),
            checksum_type: CHECKSUM_TYPE.to_string(),
        }
    }
}

/// Build the CNM message for one complete granule
///
/// `data_version` is the integer-valued product version from the
/// invocation event. `submitted_at` is injected so construction stays
/// deterministic under test.
pub fn build_message(
    config: &PipelineConfig,
    bucket: &str,
    data_version: i64,
    granule: &CompleteGranule,
    submitted_at: DateTime<Utc>,
) -> CnmMessage {
    let identifier = granule.identifier().to_string();

    CnmMessage {
        version: config.message_version.clone(),
        provider: config.provider.clone(),
        collection: config.collection.clone(),
        submission_time: submitted_at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        identifier: identifier.clone(),
        product: CnmProduct {
            name: identifier,
            // Results descriptor leads, priors follows
            files: vec![
                CnmFile::from_enriched(config, bucket, &granule.results),
                CnmFile::from_enriched(config, bucket, &granule.priors),
            ],
            data_version: data_version.to_string(),
        },
    }
}
