//! Local staging area lifecycle
//!
//! Every staged copy is registered here and released exactly once when the
//! invocation ends, whether it succeeded or failed. Components other than
//! the orchestrator only ever receive resolved paths; they never write to
//! the staging area themselves.

use sos_common::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Scratch directory owning the staged copies of one invocation
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    staged: BTreeSet<PathBuf>,
}

impl StagingArea {
    /// Open (creating if needed) the scratch directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            staged: BTreeSet::new(),
        })
    }

    /// Local path a file of this name stages to
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Record a path as staged so `release_all` covers it
    pub fn register(&mut self, path: impl AsRef<Path>) {
        self.staged.insert(path.as_ref().to_path_buf());
    }

    /// Number of currently registered copies
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Remove one staged copy
    pub fn release(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if self.staged.remove(path) {
            remove_staged(path);
        }
    }

    /// Remove every staged copy recorded during this invocation
    ///
    /// Runs on every exit path. Removal failures are logged, not
    /// propagated: cleanup must not mask the original pipeline error.
    pub fn release_all(&mut self) {
        for path in std::mem::take(&mut self.staged) {
            remove_staged(&path);
        }
    }
}

fn remove_staged(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Released staged file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
        Err(err) => warn!(path = %path.display(), error = %err, "Failed to release staged file"),
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        self.release_all();
    }
}
