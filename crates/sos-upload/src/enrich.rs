//! Integrity enrichment of grouped granules
//!
//! Computes MD5 checksum and byte size from the staged local copies and
//! writes them onto the matching granule entries. The staged copy is the
//! exact byte stream that was (or will be) transferred; metadata is never
//! recomputed from a different copy.

use crate::granule::{parse_name, Granule};
use sos_common::{checksum, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Attach checksum and size to every granule entry with a staged copy
///
/// `staged` maps the staged file's original name to its local path. Staged
/// names are matched to granule entries by `(key, role)`, so entries whose
/// destination name differs from the staged name (renamed uploads) still
/// receive metadata computed from the transferred bytes.
///
/// Fails with an IO error if any staged copy is missing or unreadable;
/// enrichment is all-or-nothing for an invocation.
pub async fn enrich_granules(
    granules: &mut BTreeMap<String, Granule>,
    staged: &HashMap<String, PathBuf>,
) -> Result<()> {
    for (name, path) in staged {
        let (key, role) = parse_name(name);
        let Some(role) = role else {
            continue;
        };

        let Some(entry) = granules.get_mut(key).and_then(|g| g.entry_mut(role)) else {
            warn!(file = %name, key, "Staged file has no matching granule entry");
            continue;
        };

        let digest = checksum::compute_file_md5(path).await?;
        let size = checksum::file_size(path).await?;

        debug!(file = %name, checksum = %digest, size, "Enriched granule entry");

        entry.checksum = Some(digest);
        entry.size_bytes = Some(size);
    }

    Ok(())
}
