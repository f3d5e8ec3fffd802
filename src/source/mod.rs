//! Bookmark source: where work items come from and where their tags are
//! cleaned up once ingested.
//!
//! - [`BookmarkSource`] - Async trait the poller and item processor drive
//! - [`PinboardClient`] - Pinboard v1 API implementation
//! - [`TagPolicy`] - What to do with a bookmark after its media is stored
//! - [`RetryPolicy`] - Backoff shared by every request

mod error;
mod pinboard;
mod retry;

pub use error::SourceError;
pub use pinboard::{DEFAULT_API_ENDPOINT, PinboardClient};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_http_status,
    parse_retry_after,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::item::{BookmarkMeta, Item};

/// Default tag marking bookmarks for download.
pub const DEFAULT_SOURCE_TAG: &str = "video";

/// A remote list of tagged bookmarks.
#[async_trait]
pub trait BookmarkSource: Send + Sync {
    /// Time of the most recent change to any bookmark.
    async fn last_updated(&self) -> Result<DateTime<Utc>, SourceError>;

    /// Bookmarks carrying `tag`, in the order the service returns them.
    async fn items(&self, tag: &str) -> Result<Vec<Item>, SourceError>;

    /// Applies the [`TagPolicy`] to an ingested item. No-op for synthetic items.
    async fn mutate_or_delete_tag(&self, item: &Item) -> Result<(), SourceError>;
}

/// Post-ingestion bookmark housekeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    /// The ingestion tag.
    pub tag: String,
    /// Delete single-tag bookmarks outright.
    pub delete_bookmark: bool,
    /// Strip the ingestion tag from the bookmark.
    pub remove_tag: bool,
}

/// What [`TagPolicy`] decides for one bookmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    /// Leave the bookmark alone.
    Keep,
    /// Delete the bookmark.
    Delete,
    /// Re-post the bookmark with these tags.
    Retag(Vec<String>),
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            tag: DEFAULT_SOURCE_TAG.to_string(),
            delete_bookmark: false,
            remove_tag: true,
        }
    }
}

impl TagPolicy {
    /// Decides the action for a bookmark.
    ///
    /// Deletion applies only to bookmarks with exactly one tag; multi-tag
    /// bookmarks fall back to losing the ingestion tag.
    #[must_use]
    pub fn action_for(&self, meta: &BookmarkMeta) -> TagAction {
        if self.delete_bookmark && meta.tags.len() == 1 {
            TagAction::Delete
        } else if self.delete_bookmark || self.remove_tag {
            TagAction::Retag(meta.tags_without(&self.tag))
        } else {
            TagAction::Keep
        }
    }
}
