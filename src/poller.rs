//! The long-running poll loop.
//!
//! Each cycle asks the bookmark source whether anything changed since the last
//! successful check, and if so processes every tagged item (newest discovery
//! last, so items are handled in reverse of the order the source lists them).
//! The wait between cycles ends early when shutdown is signalled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::clock::Clock;
use crate::processor::{ItemOutcome, ItemProcessor};
use crate::source::{BookmarkSource, SourceError};

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(600);

/// Counts for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// The source reported no change; nothing was fetched.
    pub unchanged: bool,
    /// Items returned by the source.
    pub discovered: usize,
    /// Items fetched and stored (including on-disk stubs).
    pub succeeded: usize,
    /// Items already in the history.
    pub skipped: usize,
    /// Items whose attempt failed.
    pub failed: usize,
    /// Shutdown was observed before every item was processed.
    pub interrupted: bool,
}

/// Sender half used to stop a running [`Poller`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Creates a handle and the receiver to pass to [`Poller::run`].
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Requests shutdown. Idempotent.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Triggers shutdown on the first Ctrl-C.
    pub fn install_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl-C, stopping after the current item");
                handle.trigger();
            }
        });
    }
}

/// Drives [`ItemProcessor`] over the source's tagged items on an interval.
pub struct Poller {
    source: Arc<dyn BookmarkSource>,
    processor: ItemProcessor,
    tag: String,
    interval: Duration,
    clock: Arc<dyn Clock>,
    last_checked: Option<DateTime<Utc>>,
}

impl Poller {
    /// Creates a poller that has never checked the source.
    #[must_use]
    pub fn new(
        source: Arc<dyn BookmarkSource>,
        processor: ItemProcessor,
        tag: impl Into<String>,
        interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            processor,
            tag: tag.into(),
            interval,
            clock,
            last_checked: None,
        }
    }

    /// Time of the last successful item fetch.
    #[must_use]
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.last_checked
    }

    /// Runs one cycle.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the source cannot be queried; the check
    /// time is not recorded in that case.
    #[instrument(skip_all, fields(tag = %self.tag))]
    pub async fn poll_once(&mut self, shutdown: &watch::Receiver<bool>) -> Result<CycleReport, SourceError> {
        let mut report = CycleReport::default();

        let updated = self.source.last_updated().await?;
        if let Some(last) = self.last_checked {
            if updated <= last {
                debug!(%updated, %last, "no bookmark changes since last check");
                report.unchanged = true;
                return Ok(report);
            }
        }

        let items = self.source.items(&self.tag).await?;
        self.last_checked = Some(self.clock.now());
        report.discovered = items.len();
        info!(count = items.len(), "found tagged bookmarks");
        for item in &items {
            debug!(url = %item.url, description = %item.description, "queued");
        }

        for item in items.iter().rev() {
            if *shutdown.borrow() {
                info!("shutdown requested, leaving remaining items for the next run");
                report.interrupted = true;
                break;
            }
            match self.processor.process(item).await {
                ItemOutcome::Skipped => report.skipped += 1,
                ItemOutcome::Failed { .. } => report.failed += 1,
                ItemOutcome::Succeeded { .. } | ItemOutcome::Orphaned { .. } => {
                    report.succeeded += 1;
                }
            }
        }

        Ok(report)
    }

    /// Polls until `shutdown` becomes true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), tag = %self.tag, "watching for bookmarks");
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once(&shutdown).await {
                Ok(report) if report.unchanged => {}
                Ok(report) => info!(
                    succeeded = report.succeeded,
                    skipped = report.skipped,
                    failed = report.failed,
                    "poll cycle finished"
                ),
                Err(e) => error!(error = %e, "bookmark source unavailable, skipping this cycle"),
            }

            if *shutdown.borrow() {
                break;
            }

            let next = self.clock.now()
                + chrono::Duration::from_std(self.interval).unwrap_or(chrono::Duration::zero());
            info!(next_check = %next.format("%Y-%m-%d %H:%M:%S UTC"), "sleeping");

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("stopped watching");
    }
}
