//! MD5 checksum utilities
//!
//! The downstream ingestion system verifies granules against the `md5`
//! checksum type, so digests are always computed over the exact staged
//! bytes that were (or will be) transferred.

use crate::error::Result;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Compute the MD5 digest of a byte slice as a lowercase hex string
pub fn compute_md5(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Compute the MD5 digest of a file by streaming its contents
pub async fn compute_file_md5(path: impl AsRef<Path>) -> Result<String> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Byte length of a file
pub async fn file_size(path: impl AsRef<Path>) -> Result<u64> {
    let metadata = tokio::fs::metadata(path.as_ref()).await?;
    Ok(metadata.len())
}
