//! Shared construction of the ingestion pipeline for `watch` and `run-once`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use pinfetch_core::{
    Clock, Fetcher, HttpFetcher, ItemProcessor, Ledger, OverwriteGuard, StagingArea, YtDlpFetcher,
};

use crate::config::{FetcherKind, Settings};

pub(crate) fn open_ledger(settings: &Settings, clock: Arc<dyn Clock>) -> Result<Ledger> {
    Ledger::open(&settings.history_file, clock).with_context(|| {
        format!(
            "Failed to open history file '{}'",
            settings.history_file.display()
        )
    })
}

fn build_fetcher(settings: &Settings) -> Result<Arc<dyn Fetcher>> {
    Ok(match settings.fetcher {
        FetcherKind::YtDlp => Arc::new(YtDlpFetcher::new(
            &settings.ytdlp_path,
            settings.ytdlp_format.as_str(),
        )),
        FetcherKind::Http => {
            Arc::new(HttpFetcher::new().context("Failed to build HTTP client for downloads")?)
        }
    })
}

/// Builds a processor over `library`, restoring leftover backups first when enabled.
pub(crate) fn build_processor(
    settings: &Settings,
    library: &Path,
    force: bool,
    clock: Arc<dyn Clock>,
) -> Result<ItemProcessor> {
    let ledger = open_ledger(settings, clock)?;
    let guard = OverwriteGuard::new(library, settings.backup_suffix.as_str());

    if settings.recover_orphaned_backups {
        let report = guard
            .recover_orphans()
            .context("Failed to recover backups left by an interrupted run")?;
        debug!(
            restored = report.restored.len(),
            unresolved = report.unresolved.len(),
            "orphaned backup sweep finished"
        );
    }

    let fetcher = build_fetcher(settings)?;
    info!(
        library = %library.display(),
        history = %ledger.path().display(),
        fetcher = fetcher.name(),
        force,
        "pipeline ready"
    );

    Ok(ItemProcessor::new(ledger, StagingArea::new(library), guard, fetcher).with_force(force))
}
