//! Media fetchers: the boundary between the pipeline and whatever actually
//! pulls bytes off the network.
//!
//! # Architecture
//!
//! - [`Fetcher`] - Async trait the item processor drives
//! - [`FetchOutput`] - Final file path plus per-transfer statistics
//! - [`YtDlpFetcher`] - Drives an external `yt-dlp` executable
//! - [`HttpFetcher`] - Streams a direct media URL with `reqwest`
//!
//! A fetcher writes into the directory it is given (a staging directory) and
//! never touches the library directly.

mod error;
mod filename;
mod http;
mod ytdlp;

pub use error::{FetchError, FetchErrorKind};
pub use filename::sanitize_filename;
pub use http::HttpFetcher;
pub use ytdlp::{DEFAULT_YTDLP_FORMAT, YtDlpFetcher};

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

/// Retrieves the media behind a URL into a local directory.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetches `url` into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] classified as unsupported, network or extraction.
    async fn fetch(&self, url: &str, output_dir: &Path) -> Result<FetchOutput, FetchError>;
}

/// Result contract of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutput {
    /// Path the engine reports as its final output.
    pub file_path: PathBuf,
    /// One entry per finished transfer (video and audio streams may be separate).
    pub statuses: Vec<TransferStatus>,
}

/// A single finished transfer reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferStatus {
    /// File written by this transfer, possibly with an engine-specific suffix.
    pub filename: PathBuf,
    /// Bytes received.
    pub downloaded_bytes: u64,
    /// Wall time spent on the transfer.
    pub elapsed: Duration,
}

/// Aggregate transfer statistics recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransferStats {
    /// Total bytes across all transfers.
    pub size_bytes: u64,
    /// Total seconds across all transfers.
    pub elapsed_seconds: f64,
}

impl TransferStats {
    /// Creates statistics from raw totals.
    #[must_use]
    pub fn new(size_bytes: u64, elapsed_seconds: f64) -> Self {
        Self {
            size_bytes,
            elapsed_seconds,
        }
    }

    /// Sums every transfer status.
    #[must_use]
    pub fn from_statuses(statuses: &[TransferStatus]) -> Self {
        statuses.iter().fold(Self::default(), |acc, status| Self {
            size_bytes: acc.size_bytes.saturating_add(status.downloaded_bytes),
            elapsed_seconds: acc.elapsed_seconds + status.elapsed.as_secs_f64(),
        })
    }

    /// Average rate in bytes per second; zero when either total is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rate_bytes_per_sec(&self) -> f64 {
        if self.size_bytes == 0 || self.elapsed_seconds <= 0.0 {
            return 0.0;
        }
        self.size_bytes as f64 / self.elapsed_seconds
    }
}
