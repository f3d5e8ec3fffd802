//! History ledger: the durable, keyed record of ingestion outcomes.
//!
//! The ledger is a pretty-printed JSON array on disk, rewritten in full on
//! every mutation. It holds at most one [`HistoryEvent`] per URL; adding an
//! event for a known URL replaces the old one and moves it to the end.
//!
//! Reads never fail on content: a missing, empty or unparseable file reads as
//! an empty ledger (the corruption is logged).

mod error;
mod event;
mod report;

pub use error::LedgerError;
pub use event::{HistoryEvent, ORPHANED_ARTIFACT_NOTE};
pub use report::{format_bytes, render_human, render_json};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::fetch::TransferStats;
use crate::item::Item;

/// File-backed store of [`HistoryEvent`]s keyed by URL.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

/// Counts and recent entries for the `status` view.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    /// Number of events.
    pub total: usize,
    /// Events with `downloadCompleted == true`.
    pub completed: usize,
    /// Events with `downloadCompleted == false`.
    pub failed: usize,
    /// Most recent events, newest first.
    pub recent: Vec<HistoryEvent>,
}

impl Ledger {
    /// Opens the ledger at `path`, creating its parent directory if needed.
    ///
    /// The file itself is created lazily on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::io(parent, e))?;
        }
        Ok(Self { path, clock })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every event in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] for filesystem failures other than a missing file.
    pub fn get(&self) -> Result<Vec<HistoryEvent>, LedgerError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LedgerError::io(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<HistoryEvent>>(&raw) {
            Ok(events) => Ok(events),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "history file is unreadable, treating it as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Looks up the event for `url`.
    ///
    /// # Errors
    ///
    /// Propagates [`get`](Self::get) errors.
    pub fn get_event(&self, url: &str) -> Result<Option<HistoryEvent>, LedgerError> {
        Ok(self.get()?.into_iter().find(|event| event.url == url))
    }

    /// Replaces any event with the same URL and appends `event`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or persisted.
    pub fn add(&self, event: HistoryEvent) -> Result<(), LedgerError> {
        debug!(url = %event.url, completed = event.download_completed, "adding history event");
        let mut events = self.get()?;
        events.retain(|existing| existing.url != event.url);
        events.push(event);
        self.persist(&events)
    }

    /// Removes the event for `url`, or every event when `remove_all` is set.
    ///
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or persisted.
    pub fn remove(&self, url: &str, remove_all: bool) -> Result<bool, LedgerError> {
        let mut events = self.get()?;
        let before = events.len();
        if remove_all {
            events.clear();
        } else {
            events.retain(|existing| existing.url != url);
        }
        let removed = events.len() < before;
        if removed {
            self.persist(&events)?;
            if remove_all {
                info!(count = before, "cleared history");
            } else {
                info!(url = %url, "removed from history");
            }
        }
        Ok(removed)
    }

    /// Renders the ledger as JSON or as the human report.
    ///
    /// # Errors
    ///
    /// Propagates [`get`](Self::get) errors.
    pub fn render(&self, human: bool, failed_only: bool) -> Result<String, LedgerError> {
        let mut events = self.get()?;
        if failed_only {
            events.retain(|event| !event.download_completed);
        }
        Ok(if human {
            render_human(&events)
        } else {
            render_json(&events)
        })
    }

    /// Summarizes the ledger, keeping the `recent` newest events.
    ///
    /// # Errors
    ///
    /// Propagates [`get`](Self::get) errors.
    pub fn summary(&self, recent: usize) -> Result<LedgerSummary, LedgerError> {
        let events = self.get()?;
        let completed = events.iter().filter(|e| e.download_completed).count();
        Ok(LedgerSummary {
            total: events.len(),
            completed,
            failed: events.len() - completed,
            recent: events.iter().rev().take(recent).cloned().collect(),
        })
    }

    /// Records a completed download stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn record_success(
        &self,
        item: &Item,
        video_file: &Path,
        stats: TransferStats,
    ) -> Result<HistoryEvent, LedgerError> {
        let event = HistoryEvent::success(item, video_file, stats, self.clock.now());
        self.add(event.clone())?;
        Ok(event)
    }

    /// Records a failed attempt stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn record_failure(&self, item: &Item, error: &str) -> Result<HistoryEvent, LedgerError> {
        let event = HistoryEvent::failure(item, error, self.clock.now());
        self.add(event.clone())?;
        Ok(event)
    }

    /// Records a stub for an artifact found on disk without a history entry.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn record_orphaned(&self, item: &Item, video_file: &Path) -> Result<HistoryEvent, LedgerError> {
        let event = HistoryEvent::orphaned(item, video_file, self.clock.now());
        self.add(event.clone())?;
        Ok(event)
    }

    /// Writes to a sibling temp file and renames it over the ledger.
    fn persist(&self, events: &[HistoryEvent]) -> Result<(), LedgerError> {
        let encoded =
            serde_json::to_vec_pretty(events).map_err(|e| LedgerError::encode(&self.path, e))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".history")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| LedgerError::io(dir, e))?;
        let written = tmp
            .write_all(&encoded)
            .and_then(|()| tmp.write_all(b"\n"))
            .and_then(|()| tmp.as_file().sync_all());
        if let Err(e) = written {
            return Err(LedgerError::io(tmp.path(), e));
        }
        tmp.persist(&self.path)
            .map_err(|e| LedgerError::io(&self.path, e.error))?;
        Ok(())
    }
}
