//! Error type for one item's ingestion.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::guard::GuardError;
use crate::ledger::LedgerError;
use crate::staging::StagingError;

/// Why an item did not end up in the library.
///
/// None of these escape [`ItemProcessor::process`](super::ItemProcessor::process);
/// they are recorded and reported through the item outcome.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The fetcher failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetch succeeded but no media file could be found in staging.
    #[error("could not locate the downloaded video for {url}")]
    CouldNotLocateArtifact {
        /// Item URL.
        url: String,
    },

    /// Creating or promoting staging content failed.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// Reading or writing the history failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Backing up the previous artifact failed.
    #[error(transparent)]
    Guard(#[from] GuardError),
}

impl IngestError {
    /// Creates an artifact-location error.
    pub fn could_not_locate(url: impl Into<String>) -> Self {
        Self::CouldNotLocateArtifact { url: url.into() }
    }
}
