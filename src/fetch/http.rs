//! Fetcher for direct media URLs.
//!
//! Streams the response body into the output directory. Pages that answer with
//! HTML are rejected as unsupported; extracting media from a page is the job
//! of [`YtDlpFetcher`](super::YtDlpFetcher).

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::filename::{
    extension_from_content_type, filename_from_url, is_html_content_type,
    parse_content_disposition, sanitize_filename,
};
use super::{FetchError, FetchOutput, Fetcher, TransferStatus};
use crate::user_agent;

/// Default HTTP connect timeout.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout (large media files).
pub const READ_TIMEOUT_SECS: u64 = 1800;

/// Streams a media URL straight to disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit timeout values in seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, output_dir), fields(url = %url))]
    async fn fetch(&self, url: &str, output_dir: &Path) -> Result<FetchOutput, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::unsupported(url, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::unsupported(
                url,
                format!("scheme '{}' is not supported", parsed.scheme()),
            ));
        }

        let started = Instant::now();
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::network(url, "request timed out")
            } else {
                FetchError::network(url, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::network(url, format!("HTTP {}", status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if content_type.as_deref().is_some_and(is_html_content_type) {
            return Err(FetchError::unsupported(
                url,
                "response is a web page, not a media file",
            ));
        }

        let filename = extract_filename(&response, &parsed, content_type.as_deref());
        let file_path = output_dir.join(&filename);
        debug!(path = %file_path.display(), "resolved output path");

        let mut file = File::create(&file_path)
            .await
            .map_err(|e| FetchError::extraction(url, format!("{}: {e}", file_path.display())))?;

        let stream_result = stream_to_file(&mut file, response, url, &file_path).await;
        if stream_result.is_err() {
            debug!(path = %file_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        let bytes_written = stream_result?;
        let elapsed = started.elapsed();

        info!(path = %file_path.display(), bytes = bytes_written, "transfer complete");

        Ok(FetchOutput {
            file_path: file_path.clone(),
            statuses: vec![TransferStatus {
                filename: file_path,
                downloaded_bytes: bytes_written,
                elapsed,
            }],
        })
    }
}

async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::network(url, e.to_string()))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::extraction(url, format!("{}: {e}", file_path.display())))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::extraction(url, format!("{}: {e}", file_path.display())))?;

    Ok(bytes_written)
}

/// Content-Disposition, then URL path, then a generic name with a guessed extension.
fn extract_filename(response: &reqwest::Response, url: &Url, content_type: Option<&str>) -> String {
    if let Some(name) = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|cd| cd.to_str().ok())
        .and_then(parse_content_disposition)
    {
        return sanitize_filename(&name);
    }

    let extension = content_type.map_or(".bin", extension_from_content_type);
    match filename_from_url(url) {
        Some(name) if PathBuf::from(&name).extension().is_some() => name,
        Some(name) => format!("{name}{extension}"),
        None => format!("download{extension}"),
    }
}
