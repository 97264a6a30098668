//! Runtime attribute reading
//!
//! Renamed destination files carry a runtime token taken from the SoS
//! file's global attributes: `date_modified` for priors, `date_created`
//! for results. The value is an ISO `YYYY-MM-DDThh:mm:ss` timestamp,
//! reformatted to the compact `YYYYMMDDThhmmss` form.

use crate::granule::FileRole;
use chrono::NaiveDateTime;
use sos_common::{Result, SosError};
use std::path::Path;

/// Attribute value format inside the SoS file
const ATTR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Compact token format used in destination file names
const TOKEN_FORMAT: &str = "%Y%m%dT%H%M%S";

/// How far past the attribute name to look for its value
const VALUE_WINDOW: usize = 512;

/// Scientific-file attribute boundary used by the orchestrator
pub trait RuntimeAttributeReader: Send + Sync {
    /// Read the runtime timestamp for `role` and return the compact token
    fn runtime_token(&self, path: &Path, role: FileRole) -> Result<String>;
}

/// Global attribute holding the runtime timestamp for a role
pub fn attribute_name(role: FileRole) -> &'static str {
    match role {
        FileRole::Priors => "date_modified",
        FileRole::Results => "date_created",
    }
}

/// Reader that scans the raw file bytes for the named attribute
///
/// Avoids a native netCDF dependency: the attribute value is stored as a
/// plain ASCII string adjacent to its name in the file header, so locating
/// the name and extracting the first well-formed timestamp after it yields
/// the same value the netCDF API would.
#[derive(Debug, Default, Clone)]
pub struct HeaderScanReader;

impl RuntimeAttributeReader for HeaderScanReader {
    fn runtime_token(&self, path: &Path, role: FileRole) -> Result<String> {
        let data = std::fs::read(path)?;
        let attr = attribute_name(role);

        let start = find_subsequence(&data, attr.as_bytes()).ok_or_else(|| {
            SosError::attribute_parse(
                path.display().to_string(),
                format!("attribute '{attr}' not found"),
            )
        })?;

        let window_start = start + attr.len();
        let window_end = (window_start + VALUE_WINDOW).min(data.len());
        let raw = scan_timestamp(&data[window_start..window_end]).ok_or_else(|| {
            SosError::attribute_parse(
                path.display().to_string(),
                format!("no timestamp value after attribute '{attr}'"),
            )
        })?;

        parse_runtime(&raw, path)
    }
}

/// Reformat an ISO runtime timestamp into the compact token
fn parse_runtime(raw: &str, path: &Path) -> Result<String> {
    let parsed = NaiveDateTime::parse_from_str(raw, ATTR_FORMAT).map_err(|e| {
        SosError::attribute_parse(
            path.display().to_string(),
            format!("malformed runtime '{raw}': {e}"),
        )
    })?;
    Ok(parsed.format(TOKEN_FORMAT).to_string())
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Find the first `YYYY-MM-DDThh:mm:ss`-shaped run of bytes
fn scan_timestamp(window: &[u8]) -> Option<String> {
    const LEN: usize = 19;

    for candidate in window.windows(LEN) {
        let shape_ok = candidate.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            10 => *b == b'T',
            13 | 16 => *b == b':',
            _ => b.is_ascii_digit(),
        });
        if shape_ok {
            // All bytes are ASCII by the shape check
            return String::from_utf8(candidate.to_vec()).ok();
        }
    }

    None
}
