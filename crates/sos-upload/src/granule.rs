//! Granule assembly from flat file-name lists
//!
//! A granule is the minimal unit of notification: a paired set of priors
//! and results files for one continent/run. File names carry everything
//! needed to assemble them: the continent key is the segment before the
//! first `_`, and the role is a substring match on `priors`/`results`.

use serde::{Deserialize, Serialize};
use sos_common::{Result, SosError};
use std::collections::BTreeMap;
use tracing::warn;

/// Role a file plays within a granule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Priors,
    Results,
}

impl FileRole {
    pub fn as_str(&self) -> &str {
        match self {
            FileRole::Priors => "priors",
            FileRole::Results => "results",
        }
    }
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the granule key and role for a file name
///
/// The key is the substring before the first `_` (the whole name when no
/// delimiter is present). The role is `None` for names matching neither
/// `priors` nor `results`; such files never join a granule.
pub fn parse_name(file_name: &str) -> (&str, Option<FileRole>) {
    let key = file_name.split('_').next().unwrap_or(file_name);

    let role = if file_name.contains("priors") {
        Some(FileRole::Priors)
    } else if file_name.contains("results") {
        Some(FileRole::Results)
    } else {
        None
    };

    (key, role)
}

/// One file of a granule, enriched with integrity metadata after staging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranuleEntry {
    /// Logical file name at the destination
    pub file_name: String,
    /// MD5 of the exact transferred bytes, set by enrichment
    pub checksum: Option<String>,
    /// Byte length of the same content, set by enrichment
    pub size_bytes: Option<u64>,
}

impl GranuleEntry {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            checksum: None,
            size_bytes: None,
        }
    }
}

/// A continent-keyed pair of priors and results files
///
/// Either role may be absent; an incomplete granule is never published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Granule {
    pub key: String,
    pub priors: Option<GranuleEntry>,
    pub results: Option<GranuleEntry>,
}

impl Granule {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            priors: None,
            results: None,
        }
    }

    /// Assign a file to a role, rejecting a second file for the same role
    pub fn assign(&mut self, role: FileRole, file_name: &str) -> Result<()> {
        let slot = match role {
            FileRole::Priors => &mut self.priors,
            FileRole::Results => &mut self.results,
        };

        if let Some(existing) = slot {
            return Err(SosError::DuplicateRole {
                key: self.key.clone(),
                role: role.to_string(),
                first: existing.file_name.clone(),
                second: file_name.to_string(),
            });
        }

        *slot = Some(GranuleEntry::new(file_name));
        Ok(())
    }

    pub fn entry_mut(&mut self, role: FileRole) -> Option<&mut GranuleEntry> {
        match role {
            FileRole::Priors => self.priors.as_mut(),
            FileRole::Results => self.results.as_mut(),
        }
    }

    /// Both roles are present (enriched or not)
    pub fn has_both_roles(&self) -> bool {
        self.priors.is_some() && self.results.is_some()
    }

    /// Gate for notification: both roles present with checksum and size set
    ///
    /// Returns `None` for anything less, so a partial granule cannot reach
    /// the message builder by construction.
    pub fn complete(&self) -> Option<CompleteGranule> {
        let priors = EnrichedFile::from_entry(self.priors.as_ref()?)?;
        let results = EnrichedFile::from_entry(self.results.as_ref()?)?;
        Some(CompleteGranule {
            key: self.key.clone(),
            priors,
            results,
        })
    }
}

/// A granule entry whose integrity metadata is guaranteed present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedFile {
    pub file_name: String,
    pub checksum: String,
    pub size_bytes: u64,
}

impl EnrichedFile {
    fn from_entry(entry: &GranuleEntry) -> Option<Self> {
        Some(Self {
            file_name: entry.file_name.clone(),
            checksum: entry.checksum.clone()?,
            size_bytes: entry.size_bytes?,
        })
    }
}

/// A publishable granule: both roles present and enriched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteGranule {
    pub key: String,
    pub priors: EnrichedFile,
    pub results: EnrichedFile,
}

impl CompleteGranule {
    /// Downstream identifier: the priors file name with its `_priors`
    /// suffix (and anything after it) stripped
    pub fn identifier(&self) -> &str {
        self.priors
            .file_name
            .split("_priors")
            .next()
            .unwrap_or(&self.priors.file_name)
    }
}

/// Partition an unordered file list into granules keyed by continent
///
/// Files with an unrecognized role are dropped from grouping and logged.
/// A second file for an already-filled `(key, role)` pair is an error.
pub fn group_files(file_names: &[String]) -> Result<BTreeMap<String, Granule>> {
    let mut granules: BTreeMap<String, Granule> = BTreeMap::new();

    for name in file_names {
        let (key, role) = parse_name(name);
        let Some(role) = role else {
            warn!(file = %name, "File matches neither priors nor results, dropping from grouping");
            continue;
        };

        granules
            .entry(key.to_string())
            .or_insert_with(|| Granule::new(key))
            .assign(role, name)?;
    }

    Ok(granules)
}
