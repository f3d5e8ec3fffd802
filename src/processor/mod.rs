//! Item processor: drives one item through fetch, staging, promotion and
//! history recording.
//!
//! # Protocol
//!
//! 1. An item already in the history is skipped unless `force` is set.
//! 2. With `force`, the recorded artifact and its sidecars are backed up.
//! 3. The fetcher writes into a fresh staging directory.
//! 4. The artifact is located and its library path resolved
//!    (`<library>/<stem>/<file>`).
//! 5. If that path already exists, a stub event is recorded and nothing is
//!    promoted. Otherwise the staged files are promoted and a success event is
//!    recorded.
//! 6. The bookmark source is told to update the bookmark; backups are deleted.
//!
//! Any failure records a failed event and restores the backups.

mod error;

pub use error::IngestError;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::fetch::{Fetcher, TransferStats};
use crate::guard::{Backup, OverwriteGuard};
use crate::item::Item;
use crate::ledger::Ledger;
use crate::source::BookmarkSource;
use crate::staging::{StagingArea, naming};

/// Result of processing one item.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Already in the history and `force` is off.
    Skipped,
    /// Fetched and promoted to `path`.
    Succeeded {
        /// Final artifact path.
        path: PathBuf,
    },
    /// The artifact was already on disk without a history entry; a stub was recorded.
    Orphaned {
        /// Existing artifact path.
        path: PathBuf,
    },
    /// The attempt failed and was recorded as such.
    Failed {
        /// What went wrong.
        error: IngestError,
    },
}

impl ItemOutcome {
    /// True for outcomes that leave the artifact in the library.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Orphaned { .. })
    }
}

enum Attempt {
    Promoted { path: PathBuf, stats: TransferStats },
    AlreadyOnDisk { path: PathBuf },
}

/// Runs the per-item ingestion protocol.
pub struct ItemProcessor {
    ledger: Ledger,
    staging: StagingArea,
    guard: OverwriteGuard,
    fetcher: Arc<dyn Fetcher>,
    source: Option<Arc<dyn BookmarkSource>>,
    force: bool,
}

impl ItemProcessor {
    /// Creates a processor without a bookmark source and with `force` off.
    #[must_use]
    pub fn new(
        ledger: Ledger,
        staging: StagingArea,
        guard: OverwriteGuard,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            ledger,
            staging,
            guard,
            fetcher,
            source: None,
            force: false,
        }
    }

    /// Notifies `source` after each stored item.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn BookmarkSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Re-fetches items that are already in the history.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Processes one item. Never fails; errors are reported in the outcome.
    #[instrument(skip(self, item), fields(url = %item.url))]
    pub async fn process(&self, item: &Item) -> ItemOutcome {
        info!(description = %item.description, "processing item");

        let existing = match self.ledger.get_event(&item.url) {
            Ok(existing) => existing,
            Err(e) => {
                error!(error = %e, "cannot read history");
                return ItemOutcome::Failed { error: e.into() };
            }
        };

        let backups = match existing {
            Some(_) if !self.force => {
                info!("already in history, skipping");
                return ItemOutcome::Skipped;
            }
            Some(event) => match event.artifact() {
                Some(artifact) => match self.guard.backup(artifact) {
                    Ok(backups) => backups,
                    Err(e) => return self.fail(item, e.into(), Vec::new()),
                },
                None => Vec::new(),
            },
            None => Vec::new(),
        };

        match self.attempt(item).await {
            Ok(Attempt::Promoted { path, stats }) => {
                if let Err(e) = self.ledger.record_success(item, &path, stats) {
                    error!(
                        error = %e,
                        backups = backups.len(),
                        "video stored but history not updated, leaving backups in place"
                    );
                    return ItemOutcome::Failed { error: e.into() };
                }
                info!(path = %path.display(), size_bytes = stats.size_bytes, "download complete");
                self.notify_source(item).await;
                if let Err(e) = self.guard.commit(backups) {
                    warn!(error = %e, "failed to delete backups");
                }
                ItemOutcome::Succeeded { path }
            }
            Ok(Attempt::AlreadyOnDisk { path }) => {
                warn!(
                    path = %path.display(),
                    "video is on disk but not in the history, adding a stub"
                );
                if let Err(e) = self.ledger.record_orphaned(item, &path) {
                    self.restore(backups);
                    return ItemOutcome::Failed { error: e.into() };
                }
                self.notify_source(item).await;
                self.restore(backups);
                ItemOutcome::Orphaned { path }
            }
            Err(e) => self.fail(item, e, backups),
        }
    }

    async fn attempt(&self, item: &Item) -> Result<Attempt, IngestError> {
        let staging = self.staging.begin()?;
        let output = self.fetcher.fetch(&item.url, staging.path()).await?;
        debug!(
            fetcher = self.fetcher.name(),
            reported = %output.file_path.display(),
            transfers = output.statuses.len(),
            "fetch finished"
        );

        let artifact = staging
            .locate_artifact(&output)
            .ok_or_else(|| IngestError::could_not_locate(&item.url))?;
        let file_name = artifact
            .file_name()
            .ok_or_else(|| IngestError::could_not_locate(&item.url))?;
        let destination_dir = self
            .staging
            .library()
            .join(naming::destination_dir_name(&artifact));
        let final_path = destination_dir.join(file_name);

        if final_path.exists() {
            return Ok(Attempt::AlreadyOnDisk { path: final_path });
        }

        let stats = TransferStats::from_statuses(&output.statuses);
        staging.promote_all(&destination_dir)?;
        Ok(Attempt::Promoted {
            path: final_path,
            stats,
        })
    }

    fn fail(&self, item: &Item, error: IngestError, backups: Vec<Backup>) -> ItemOutcome {
        error!(error = %error, "download failed");
        if let Err(e) = self.ledger.record_failure(item, &error.to_string()) {
            error!(error = %e, "failed to record failure in history");
        }
        self.restore(backups);
        ItemOutcome::Failed { error }
    }

    fn restore(&self, backups: Vec<Backup>) {
        if backups.is_empty() {
            return;
        }
        if let Err(e) = self.guard.rollback(backups) {
            error!(error = %e, "failed to restore backups");
        }
    }

    async fn notify_source(&self, item: &Item) {
        let Some(source) = &self.source else {
            return;
        };
        if let Err(e) = source.mutate_or_delete_tag(item).await {
            warn!(error = %e, "failed to update bookmark");
        }
    }
}
