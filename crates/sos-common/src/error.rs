//! Error types for the SoS upload pipeline
//!
//! Every failure is unrecoverable at its point of origin: components
//! propagate immediately and the orchestrator releases staged files before
//! surfacing the error to the invocation boundary.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, SosError>;

/// Error taxonomy for the upload pipeline
#[derive(Error, Debug)]
pub enum SosError {
    /// Local read or checksum computation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Message or event (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object download or upload failed
    #[error("Transfer failed for s3://{bucket}/{key}: {message}")]
    Transfer {
        bucket: String,
        key: String,
        message: String,
    },

    /// Secret-store credential lookup failed
    #[error("Credential error: {0}")]
    Credential(String),

    /// Pub/sub transport reported a failure
    #[error("Publish error: {0}")]
    Publish(String),

    /// Runtime timestamp attribute was missing or malformed
    #[error("Attribute parse error for '{file}': {message}")]
    AttributeParse { file: String, message: String },

    /// Whole-invocation deadline expired
    #[error("Pipeline deadline of {0}s expired")]
    Timeout(u64),

    /// Invocation input or configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Two input files claimed the same granule role
    #[error("Duplicate {role} file for granule '{key}': '{first}' and '{second}'")]
    DuplicateRole {
        key: String,
        role: String,
        first: String,
        second: String,
    },
}

impl SosError {
    /// Create a transfer error
    pub fn transfer(
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transfer {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a credential error
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create a publish error
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Create an attribute parse error
    pub fn attribute_parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AttributeParse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
