//! pinfetch core library
//!
//! Watches a bookmark feed for items tagged for download, fetches each one
//! exactly once into a media library, and keeps a durable history of every
//! attempt.
//!
//! # Architecture
//!
//! The library is organized into the following modules, leaf-first:
//! - [`ledger`] - History of ingestion outcomes, keyed by URL
//! - [`staging`] - Per-item temporary directories and promotion into the library
//! - [`guard`] - Backups of prior artifacts around a forced re-fetch
//! - [`fetch`] - The [`Fetcher`] boundary plus yt-dlp and direct HTTP fetchers
//! - [`source`] - The [`BookmarkSource`] boundary and the Pinboard client
//! - [`processor`] - One item end to end
//! - [`poller`] - The long-running watch loop

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod fetch;
pub mod guard;
pub mod item;
pub mod ledger;
pub mod poller;
pub mod processor;
pub mod source;
pub mod staging;

mod user_agent;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use fetch::{
    DEFAULT_YTDLP_FORMAT, FetchError, FetchErrorKind, FetchOutput, Fetcher, HttpFetcher,
    TransferStats, TransferStatus, YtDlpFetcher,
};
pub use guard::{Backup, DEFAULT_BACKUP_SUFFIX, GuardError, OrphanReport, OverwriteGuard};
pub use item::{BookmarkMeta, Item, RUN_ONCE_DESCRIPTION};
pub use ledger::{HistoryEvent, Ledger, LedgerError, LedgerSummary};
pub use poller::{CycleReport, DEFAULT_POLL_INTERVAL, Poller, ShutdownHandle};
pub use processor::{IngestError, ItemOutcome, ItemProcessor};
pub use source::{
    BookmarkSource, DEFAULT_API_ENDPOINT, DEFAULT_MAX_ATTEMPTS, DEFAULT_SOURCE_TAG,
    PinboardClient, RetryPolicy, SourceError, TagAction, TagPolicy,
};
pub use staging::{StagingArea, StagingDir, StagingError};
