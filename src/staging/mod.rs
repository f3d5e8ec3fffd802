//! Staging area: isolates in-progress downloads from the library.
//!
//! Every fetch writes into a hidden, uniquely named directory created inside
//! the library root, so promotion is a same-filesystem rename. The directory is
//! removed when the [`StagingDir`] is dropped, whatever the outcome.

mod error;
pub mod naming;

pub use error::StagingError;

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::fetch::FetchOutput;

/// Prefix of staging directories inside the library.
pub const STAGING_PREFIX: &str = ".pinfetch-staging-";

/// Factory for per-item staging directories under one library root.
#[derive(Debug, Clone)]
pub struct StagingArea {
    library: PathBuf,
}

/// A live staging directory; removed on drop.
#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
}

impl StagingArea {
    /// Creates a staging area for `library`.
    #[must_use]
    pub fn new(library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
        }
    }

    /// Library root.
    #[must_use]
    pub fn library(&self) -> &Path {
        &self.library
    }

    /// Creates a fresh staging directory inside the library.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Io`] if the library or the directory cannot be created.
    pub fn begin(&self) -> Result<StagingDir, StagingError> {
        std::fs::create_dir_all(&self.library).map_err(|e| StagingError::io(&self.library, e))?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.library)
            .map_err(|e| StagingError::io(&self.library, e))?;
        debug!(path = %dir.path().display(), "staging directory created");
        Ok(StagingDir { dir })
    }
}

impl StagingDir {
    /// Directory the fetcher writes into.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Finds the media artifact produced by a fetch.
    ///
    /// Probes `<stem><container>` for each preferred container, where the stem
    /// comes from the first finished transfer. Falls back to the fetcher's
    /// reported path when it is a completed file inside this directory.
    #[must_use]
    pub fn locate_artifact(&self, output: &FetchOutput) -> Option<PathBuf> {
        let root = self.path();

        if let Some(first) = output.statuses.first() {
            let file_name = first
                .filename
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = naming::artifact_stem(&file_name);
            if !stem.is_empty() {
                for container in naming::CONTAINER_PREFERENCE {
                    let candidate = root.join(format!("{stem}{container}"));
                    debug!(candidate = %candidate.display(), "probing for artifact");
                    if candidate.is_file() {
                        return Some(candidate);
                    }
                }
            }
        }

        let reported = &output.file_path;
        let transient = reported
            .file_name()
            .is_some_and(|n| naming::is_transient(&n.to_string_lossy()));
        (reported.starts_with(root) && reported.is_file() && !transient).then(|| reported.clone())
    }

    /// Completed files currently in the directory, sorted by name.
    ///
    /// In-progress transfer leftovers are excluded.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Io`] if the directory cannot be listed.
    pub fn staged_files(&self) -> Result<Vec<PathBuf>, StagingError> {
        let root = self.path();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(root).map_err(|e| StagingError::io(root, e))? {
            let entry = entry.map_err(|e| StagingError::io(root, e))?;
            let path = entry.path();
            let transient = naming::is_transient(&entry.file_name().to_string_lossy());
            if path.is_file() && !transient {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Moves every staged file into `destination_dir` and removes the staging directory.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError`] if listing or moving fails.
    pub fn promote_all(self, destination_dir: &Path) -> Result<Vec<PathBuf>, StagingError> {
        let files = self.staged_files()?;
        let promoted = promote(&files, destination_dir)?;
        let staging_path = self.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %staging_path.display(), error = %e, "failed to remove staging directory");
        }
        Ok(promoted)
    }
}

/// Moves `staged` files into `destination_dir`, creating it if absent.
///
/// Existing destination files are overwritten. A source that is already gone
/// while its destination exists counts as promoted, so repeating a promotion
/// leaves the same final file set.
///
/// # Errors
///
/// Returns [`StagingError`] if the directory cannot be created or a move fails.
#[instrument(skip_all, fields(dest = %destination_dir.display(), count = staged.len()))]
pub fn promote(staged: &[PathBuf], destination_dir: &Path) -> Result<Vec<PathBuf>, StagingError> {
    std::fs::create_dir_all(destination_dir).map_err(|e| StagingError::io(destination_dir, e))?;

    let mut promoted = Vec::with_capacity(staged.len());
    for source in staged {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = destination_dir.join(name);
        if !source.exists() && target.is_file() {
            debug!(path = %target.display(), "already promoted");
            promoted.push(target);
            continue;
        }
        move_file(source, &target)?;
        debug!(from = %source.display(), to = %target.display(), "promoted");
        promoted.push(target);
    }

    info!(count = promoted.len(), "promoted staged files");
    Ok(promoted)
}

fn move_file(from: &Path, to: &Path) -> Result<(), StagingError> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), "rename crosses devices, copying");
            std::fs::copy(from, to).map_err(|e| StagingError::promote(from, to, e))?;
            std::fs::remove_file(from).map_err(|e| StagingError::io(from, e))
        }
        Err(e) => Err(StagingError::promote(from, to, e)),
    }
}
