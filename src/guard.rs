//! Overwrite guard: moves an existing artifact (and its sidecars) aside before a
//! forced re-download, then discards or restores it based on the outcome.
//!
//! A backup is the original entry renamed with a reserved suffix appended.
//! Backups live only for the duration of one item; [`OverwriteGuard::recover_orphans`]
//! handles the ones a crash left behind.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::staging::STAGING_PREFIX;

/// Default suffix appended to backed-up entries.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".pinfetch-bak";

/// Errors raised while backing up, committing or restoring.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Listing a directory or deleting a backup failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Renaming an entry to or from its backup name failed.
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        /// Source name.
        from: PathBuf,
        /// Target name.
        to: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl GuardError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}

/// One renamed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Name the entry had before the backup.
    pub original: PathBuf,
    /// Current, suffix-tagged name.
    pub backup: PathBuf,
}

/// Result of the startup sweep for orphaned backups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReport {
    /// Backups renamed back to their original name.
    pub restored: Vec<PathBuf>,
    /// Backups left in place because the original name is taken.
    pub unresolved: Vec<PathBuf>,
}

/// Backs up, commits and restores artifacts within one library.
#[derive(Debug, Clone)]
pub struct OverwriteGuard {
    library: PathBuf,
    suffix: String,
}

impl OverwriteGuard {
    /// Creates a guard for `library` using `suffix` to tag backups.
    #[must_use]
    pub fn new(library: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            suffix: suffix.into(),
        }
    }

    /// Renames every entry next to `artifact` whose name starts with the
    /// artifact's stem.
    ///
    /// Entries already carrying the suffix are left alone. Returns an empty list
    /// when the artifact's directory does not exist or nothing matches. If a
    /// rename fails midway, the entries already renamed are restored before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError`] if the directory cannot be listed or a rename fails.
    pub fn backup(&self, artifact: &Path) -> Result<Vec<Backup>, GuardError> {
        let Some(dir) = artifact.parent().filter(|d| d.is_dir()) else {
            return Ok(Vec::new());
        };
        let Some(stem) = artifact.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| GuardError::io(dir, e))? {
            let entry = entry.map_err(|e| GuardError::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&stem) && !name.ends_with(&self.suffix) {
                matches.push(entry.path());
            }
        }
        matches.sort();

        let mut backups = Vec::with_capacity(matches.len());
        for original in matches {
            let backup = self.backup_path(&original);
            if let Err(e) = std::fs::rename(&original, &backup) {
                let error = GuardError::rename(&original, &backup, e);
                if let Err(undo) = self.rollback(backups) {
                    warn!(error = %undo, "failed to undo partial backup");
                }
                return Err(error);
            }
            debug!(from = %original.display(), to = %backup.display(), "backed up");
            backups.push(Backup { original, backup });
        }

        if !backups.is_empty() {
            info!(count = backups.len(), artifact = %artifact.display(), "backed up existing files");
        }
        Ok(backups)
    }

    /// Deletes every backup (files and directories).
    ///
    /// All backups are attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Io`] if a backup cannot be removed.
    pub fn commit(&self, backups: Vec<Backup>) -> Result<(), GuardError> {
        let mut first_error = None;
        for Backup { backup, .. } in backups {
            let removed = if backup.is_dir() {
                std::fs::remove_dir_all(&backup)
            } else {
                std::fs::remove_file(&backup)
            };
            match removed {
                Ok(()) => debug!(path = %backup.display(), "deleted backup"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %backup.display(), error = %e, "failed to delete backup");
                    first_error.get_or_insert(GuardError::io(&backup, e));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Renames every backup back to its original name.
    ///
    /// All backups are attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Rename`] if a backup cannot be restored.
    pub fn rollback(&self, backups: Vec<Backup>) -> Result<(), GuardError> {
        let mut first_error = None;
        for Backup { original, backup } in backups {
            match std::fs::rename(&backup, &original) {
                Ok(()) => debug!(path = %original.display(), "restored backup"),
                Err(e) => {
                    warn!(path = %backup.display(), error = %e, "failed to restore backup");
                    first_error.get_or_insert(GuardError::rename(&backup, &original, e));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Restores suffix-tagged entries left behind by an interrupted run.
    ///
    /// Scans the library root and each of its subdirectories (staging
    /// directories excluded). An orphan is restored only when its original name
    /// is free; otherwise it is reported as unresolved.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Io`] if the library cannot be listed. A missing
    /// library is not an error.
    pub fn recover_orphans(&self) -> Result<OrphanReport, GuardError> {
        let mut report = OrphanReport::default();
        if !self.library.is_dir() {
            return Ok(report);
        }

        let mut dirs = vec![self.library.clone()];
        for entry in std::fs::read_dir(&self.library).map_err(|e| GuardError::io(&self.library, e))? {
            let entry = entry.map_err(|e| GuardError::io(&self.library, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() && !name.starts_with(STAGING_PREFIX) && !name.ends_with(&self.suffix) {
                dirs.push(entry.path());
            }
        }

        for dir in dirs {
            self.recover_in(&dir, &mut report)?;
        }

        if !report.restored.is_empty() {
            info!(count = report.restored.len(), "restored orphaned backups");
        }
        for path in &report.unresolved {
            warn!(path = %path.display(), "orphaned backup left in place, original name is taken");
        }
        Ok(report)
    }

    fn recover_in(&self, dir: &Path, report: &mut OrphanReport) -> Result<(), GuardError> {
        let mut orphans = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| GuardError::io(dir, e))? {
            let entry = entry.map_err(|e| GuardError::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.len() > self.suffix.len() && name.ends_with(&self.suffix) {
                orphans.push(entry.path());
            }
        }
        orphans.sort();

        for backup in orphans {
            let Some(original) = self.original_path(&backup) else {
                continue;
            };
            if original.exists() {
                report.unresolved.push(backup);
                continue;
            }
            std::fs::rename(&backup, &original)
                .map_err(|e| GuardError::rename(&backup, &original, e))?;
            debug!(path = %original.display(), "restored orphaned backup");
            report.restored.push(original);
        }
        Ok(())
    }

    fn backup_path(&self, original: &Path) -> PathBuf {
        let mut name = original.as_os_str().to_os_string();
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    fn original_path(&self, backup: &Path) -> Option<PathBuf> {
        let name = backup.file_name()?.to_string_lossy().into_owned();
        let original = name.strip_suffix(&self.suffix)?;
        Some(backup.with_file_name(original))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (TempDir, OverwriteGuard, PathBuf) {
        let lib = TempDir::new().unwrap();
        let dir = lib.path().join("Talk");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("Talk.mp4"), b"video").unwrap();
        std::fs::write(dir.join("Talk.jpg"), b"thumb").unwrap();
        std::fs::write(dir.join("Other.txt"), b"keep").unwrap();
        let guard = OverwriteGuard::new(lib.path(), DEFAULT_BACKUP_SUFFIX);
        (lib, guard, dir)
    }

    #[test]
    fn test_backup_renames_stem_matches_only() {
        let (_lib, guard, dir) = setup();
        let backups = guard.backup(&dir.join("Talk.mp4")).unwrap();

        assert_eq!(backups.len(), 2);
        assert!(dir.join("Talk.mp4.pinfetch-bak").is_file());
        assert!(dir.join("Talk.jpg.pinfetch-bak").is_file());
        assert!(!dir.join("Talk.mp4").exists());
        assert!(dir.join("Other.txt").is_file());
    }

    #[test]
    fn test_backup_then_rollback_restores_everything() {
        let (_lib, guard, dir) = setup();
        let backups = guard.backup(&dir.join("Talk.mp4")).unwrap();
        guard.rollback(backups).unwrap();

        assert_eq!(std::fs::read(dir.join("Talk.mp4")).unwrap(), b"video");
        assert_eq!(std::fs::read(dir.join("Talk.jpg")).unwrap(), b"thumb");
        assert!(!dir.join("Talk.mp4.pinfetch-bak").exists());
    }

    #[test]
    fn test_backup_then_commit_removes_originals() {
        let (_lib, guard, dir) = setup();
        std::fs::create_dir(dir.join("Talk.extras")).unwrap();
        std::fs::write(dir.join("Talk.extras/a.srt"), b"s").unwrap();

        let backups = guard.backup(&dir.join("Talk.mp4")).unwrap();
        assert_eq!(backups.len(), 3);
        guard.commit(backups).unwrap();

        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["Other.txt"]);
    }

    #[test]
    fn test_backup_ignores_existing_backups_and_missing_dirs() {
        let (lib, guard, dir) = setup();
        std::fs::write(dir.join("Talk.old.pinfetch-bak"), b"x").unwrap();
        let backups = guard.backup(&dir.join("Talk.mp4")).unwrap();
        assert!(backups.iter().all(|b| b.original != dir.join("Talk.old.pinfetch-bak")));

        let none = guard.backup(&lib.path().join("Nope/Nope.mp4")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_recover_orphans_restores_free_names_and_reports_taken() {
        let (lib, guard, dir) = setup();
        let backups = guard.backup(&dir.join("Talk.mp4")).unwrap();
        assert_eq!(backups.len(), 2);
        std::fs::write(dir.join("Talk.jpg"), b"new thumb").unwrap();
        std::fs::write(lib.path().join("Top.mkv.pinfetch-bak"), b"t").unwrap();

        let report = guard.recover_orphans().unwrap();

        assert!(report.restored.contains(&dir.join("Talk.mp4")));
        assert!(report.restored.contains(&lib.path().join("Top.mkv")));
        assert_eq!(report.unresolved, vec![dir.join("Talk.jpg.pinfetch-bak")]);
        assert_eq!(std::fs::read(dir.join("Talk.jpg")).unwrap(), b"new thumb");
    }

    #[test]
    fn test_recover_orphans_missing_library_is_empty() {
        let lib = TempDir::new().unwrap();
        let guard = OverwriteGuard::new(lib.path().join("absent"), DEFAULT_BACKUP_SUFFIX);
        assert_eq!(guard.recover_orphans().unwrap(), OrphanReport::default());
    }
}
