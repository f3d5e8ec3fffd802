//! The persisted history record.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::fetch::TransferStats;
use crate::item::Item;

/// Error text recorded with the stub event written when an artifact already
/// exists on disk but the ledger has no record of it.
pub const ORPHANED_ARTIFACT_NOTE: &str = "Video file was found on disk but not in the history.";

/// Terminal outcome of the most recent ingestion attempt for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// Item URL; the ledger key.
    pub url: String,
    /// When the attempt completed.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date_time: DateTime<Utc>,
    /// Final artifact path; empty on failure.
    #[serde(default)]
    pub video_file: PathBuf,
    /// Item description at the time of the attempt.
    #[serde(default)]
    pub description: String,
    /// True when the artifact is in the library.
    pub download_completed: bool,
    /// Failure text; empty on success.
    #[serde(default)]
    pub error: String,
    /// Total bytes transferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Total transfer time in seconds.
    #[serde(
        default,
        alias = "elapsedFloat",
        skip_serializing_if = "Option::is_none"
    )]
    pub elapsed_seconds: Option<f64>,
    /// Derived average rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_bytes_per_sec: Option<f64>,
}

impl HistoryEvent {
    /// Event for an artifact that was fetched and promoted.
    #[must_use]
    pub fn success(item: &Item, video_file: &Path, stats: TransferStats, at: DateTime<Utc>) -> Self {
        Self {
            url: item.url.clone(),
            date_time: at,
            video_file: video_file.to_path_buf(),
            description: item.description.clone(),
            download_completed: true,
            error: String::new(),
            size_bytes: Some(stats.size_bytes),
            elapsed_seconds: Some(stats.elapsed_seconds),
            rate_bytes_per_sec: Some(stats.rate_bytes_per_sec()),
        }
    }

    /// Event for a failed attempt.
    #[must_use]
    pub fn failure(item: &Item, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            url: item.url.clone(),
            date_time: at,
            video_file: PathBuf::new(),
            description: item.description.clone(),
            download_completed: false,
            error: error.into(),
            size_bytes: None,
            elapsed_seconds: None,
            rate_bytes_per_sec: None,
        }
    }

    /// Completed event pointing at an artifact that was already on disk.
    #[must_use]
    pub fn orphaned(item: &Item, video_file: &Path, at: DateTime<Utc>) -> Self {
        Self {
            url: item.url.clone(),
            date_time: at,
            video_file: video_file.to_path_buf(),
            description: item.description.clone(),
            download_completed: true,
            error: ORPHANED_ARTIFACT_NOTE.to_string(),
            size_bytes: None,
            elapsed_seconds: None,
            rate_bytes_per_sec: None,
        }
    }

    /// Recorded artifact path, if any.
    #[must_use]
    pub fn artifact(&self) -> Option<&Path> {
        (!self.video_file.as_os_str().is_empty()).then_some(self.video_file.as_path())
    }

    /// Transfer statistics, when both totals were recorded.
    #[must_use]
    pub fn stats(&self) -> Option<TransferStats> {
        Some(TransferStats::new(self.size_bytes?, self.elapsed_seconds?))
    }
}

/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form
/// found in older history files (read as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_success_event_carries_stats_and_rate() {
        let item = Item::synthetic("https://example.com/v/1");
        let event = HistoryEvent::success(
            &item,
            Path::new("/lib/Talk/Talk.mp4"),
            TransferStats::new(1000, 2.0),
            at(),
        );
        assert!(event.download_completed);
        assert!(event.error.is_empty());
        assert_eq!(event.rate_bytes_per_sec, Some(500.0));
        assert_eq!(event.artifact(), Some(Path::new("/lib/Talk/Talk.mp4")));
    }

    #[test]
    fn test_failure_event_has_no_artifact() {
        let item = Item::synthetic("https://example.com/v/1");
        let event = HistoryEvent::failure(&item, "boom", at());
        assert!(!event.download_completed);
        assert_eq!(event.artifact(), None);
        assert_eq!(event.stats(), None);
    }

    #[test]
    fn test_serializes_camel_case_and_skips_missing_stats() {
        let item = Item::synthetic("https://example.com/v/1");
        let json = serde_json::to_value(HistoryEvent::failure(&item, "boom", at())).unwrap();
        assert_eq!(json["downloadCompleted"], false);
        assert_eq!(json["videoFile"], "");
        assert_eq!(json["dateTime"], "2024-05-01T12:00:00Z");
        assert!(json.get("sizeBytes").is_none());
    }

    #[test]
    fn test_reads_legacy_record_with_naive_timestamp_and_extra_fields() {
        let raw = r#"{
            "dateTime": "2021-03-04 05:06:07.891011",
            "videoFile": "/videos/Talk/Talk.mkv",
            "url": "https://example.com/v/2",
            "description": "Talk",
            "downloadCompleted": true,
            "error": "",
            "elapsedFloat": 4.0,
            "sizeBytes": 2048,
            "sizeStr": "2.00KiB",
            "rateStr": "512.00B/sec"
        }"#;
        let event: HistoryEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.date_time.to_rfc3339(), "2021-03-04T05:06:07.891011+00:00");
        assert_eq!(event.stats(), Some(TransferStats::new(2048, 4.0)));
        assert_eq!(event.rate_bytes_per_sec, None);
    }
}
