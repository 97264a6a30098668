//! Invocation event contract
//!
//! The pipeline is triggered with a JSON event. Boolean flags arrive as
//! either JSON booleans or the strings `"true"`/`"false"`, matching what
//! upstream schedulers emit.

use serde::{Deserialize, Deserializer};
use sos_common::{Result, SosError};

/// Sentinel used in source-object keys when no run type was supplied
pub const RUN_TYPE_SENTINEL: &str = "None";

/// Parsed invocation event
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadEvent {
    /// Source bucket holding the SoS files; required unless publish-only
    #[serde(default, alias = "sos_bucket")]
    pub source_bucket: Option<String>,

    /// Archive bucket the granules land in
    #[serde(alias = "podaac_bucket")]
    pub destination_bucket: String,

    /// Run type segment of the source key and destination name
    #[serde(default)]
    pub run_type: Option<String>,

    /// Integer-valued product version
    pub version: String,

    /// Flat list of SoS file names
    pub file_list: Vec<String>,

    /// Re-derive checksums for already-uploaded files and publish
    #[serde(default, deserialize_with = "flexible_bool")]
    pub publish_only: bool,

    /// Publish notifications after the upload step
    #[serde(default, deserialize_with = "flexible_bool")]
    pub publish: bool,
}

impl UploadEvent {
    /// Parse an event from its JSON encoding
    pub fn from_json(data: &str) -> Result<Self> {
        let event: Self = serde_json::from_str(data)?;
        event.validate()?;
        Ok(event)
    }

    /// Check cross-field requirements the schema cannot express
    pub fn validate(&self) -> Result<()> {
        if self.file_list.is_empty() {
            return Err(SosError::config("file_list must not be empty"));
        }

        self.data_version()?;

        if !self.publish_only && self.source_bucket.is_none() {
            return Err(SosError::config(
                "source_bucket is required unless publish_only is set",
            ));
        }

        Ok(())
    }

    /// The product version as an integer
    pub fn data_version(&self) -> Result<i64> {
        self.version.trim().parse().map_err(|_| {
            SosError::config(format!(
                "version must be integer-valued, got '{}'",
                self.version
            ))
        })
    }

    /// Run type, or the sentinel when absent
    pub fn run_type_or_sentinel(&self) -> &str {
        self.run_type.as_deref().unwrap_or(RUN_TYPE_SENTINEL)
    }
}

/// Accept `true`/`false` as JSON booleans or strings
fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(value) => Ok(value),
        BoolOrString::String(value) => match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected \"true\" or \"false\", got \"{other}\""
            ))),
        },
    }
}
