//! Units of ingestion work.

/// Description used for items created from a single CLI-provided URL.
pub const RUN_ONCE_DESCRIPTION: &str = "Run Once";

/// One unit of ingestion work, keyed by its URL.
///
/// Items are rebuilt from every poll (or from a CLI argument) and are never
/// persisted; the ledger stores outcomes, not items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable identifier and fetch target.
    pub url: String,
    /// Human-readable title.
    pub description: String,
    /// Bookmark-source metadata; `None` for synthetic items.
    pub meta: Option<BookmarkMeta>,
}

/// Mutable bookmark state needed to re-post or delete the bookmark after download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkMeta {
    /// Tags on the bookmark, in source order.
    pub tags: Vec<String>,
    /// Source timestamp, passed back verbatim when the bookmark is re-posted.
    pub time: String,
    /// Public visibility.
    pub shared: bool,
    /// "Read later" flag.
    pub to_read: bool,
}

impl Item {
    /// Creates an item discovered from the bookmark source.
    #[must_use]
    pub fn from_bookmark(
        url: impl Into<String>,
        description: impl Into<String>,
        meta: BookmarkMeta,
    ) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
            meta: Some(meta),
        }
    }

    /// Creates a synthetic item for a one-off run against `url`.
    #[must_use]
    pub fn synthetic(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: RUN_ONCE_DESCRIPTION.to_string(),
            meta: None,
        }
    }
}

impl BookmarkMeta {
    /// Returns the tags with every occurrence of `tag` removed.
    #[must_use]
    pub fn tags_without(&self, tag: &str) -> Vec<String> {
        self.tags.iter().filter(|t| *t != tag).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(tags: &[&str]) -> BookmarkMeta {
        BookmarkMeta {
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            time: "2024-01-01T00:00:00Z".to_string(),
            shared: false,
            to_read: true,
        }
    }

    #[test]
    fn test_synthetic_item_has_no_meta() {
        let item = Item::synthetic("https://example.com/v/1");
        assert!(item.meta.is_none());
        assert_eq!(item.description, RUN_ONCE_DESCRIPTION);
    }

    #[test]
    fn test_bookmark_item_is_not_synthetic() {
        let item = Item::from_bookmark("https://example.com/v/1", "A", meta(&["video"]));
        assert_eq!(item.meta.unwrap().tags, vec!["video"]);
    }

    #[test]
    fn test_tags_without_removes_exact_match_only() {
        let meta = meta(&["video", "videos", "music"]);
        assert_eq!(meta.tags_without("video"), vec!["videos", "music"]);
        assert_eq!(meta.tags_without("vid"), vec!["video", "videos", "music"]);
    }
}
