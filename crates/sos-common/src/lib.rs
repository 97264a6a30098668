//! SoS Upload Common Library
//!
//! Shared error handling, checksum utilities, and logging setup for the
//! SoS upload workspace.
//!
//! # Example
//!
//! ```no_run
//! use sos_common::{checksum, Result};
//!
//! async fn digest(path: &std::path::Path) -> Result<String> {
//!     checksum::compute_file_md5(path).await
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SosError};
