//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pinfetch_core::{
    BookmarkMeta, BookmarkSource, Clock, FetchError, FetchOutput, Fetcher, FixedClock, Item,
    ItemProcessor, Ledger, OverwriteGuard, SourceError, StagingArea, TransferStatus,
    DEFAULT_BACKUP_SUFFIX,
};
use tempfile::TempDir;

/// One scripted fetch result.
#[derive(Debug, Clone)]
pub enum FetchScript {
    /// Write `file_name` with `bytes` bytes and report `elapsed`.
    Write {
        file_name: String,
        bytes: usize,
        elapsed: Duration,
    },
    /// Fail with a network error carrying `message`.
    Network(String),
}

impl FetchScript {
    pub fn write(file_name: &str, bytes: usize, elapsed_secs: u64) -> Self {
        Self::Write {
            file_name: file_name.to_string(),
            bytes,
            elapsed: Duration::from_secs(elapsed_secs),
        }
    }
}

/// Fetcher that plays back a script and records every URL it was asked for.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    script: Mutex<VecDeque<FetchScript>>,
    calls: Mutex<Vec<String>>,
    remove_during_fetch: Mutex<Option<PathBuf>>,
}

impl FakeFetcher {
    pub fn new(script: impl IntoIterator<Item = FetchScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            remove_during_fetch: Mutex::new(None),
        })
    }

    /// Deletes `dir` (recursively) during the next fetch.
    pub fn remove_during_fetch(&self, dir: impl Into<PathBuf>) {
        *self.remove_during_fetch.lock().unwrap() = Some(dir.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch(&self, url: &str, output_dir: &Path) -> Result<FetchOutput, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(dir) = self.remove_during_fetch.lock().unwrap().take() {
            std::fs::remove_dir_all(dir).unwrap();
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(FetchScript::Write {
                file_name,
                bytes,
                elapsed,
            }) => {
                let path = output_dir.join(&file_name);
                std::fs::write(&path, vec![b'v'; bytes]).unwrap();
                Ok(FetchOutput {
                    file_path: path.clone(),
                    statuses: vec![TransferStatus {
                        filename: path,
                        downloaded_bytes: bytes as u64,
                        elapsed,
                    }],
                })
            }
            Some(FetchScript::Network(message)) => Err(FetchError::network(url, message)),
            None => Err(FetchError::extraction(url, "no scripted response")),
        }
    }
}

/// Bookmark source with scripted responses.
#[derive(Debug)]
pub struct FakeSource {
    pub updated: Mutex<DateTime<Utc>>,
    pub items: Mutex<Vec<Item>>,
    pub fail: Mutex<bool>,
    pub fail_items: Mutex<bool>,
    pub fail_mutate: Mutex<bool>,
    pub item_requests: Mutex<usize>,
    pub mutated: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(updated: DateTime<Utc>, items: Vec<Item>) -> Arc<Self> {
        Arc::new(Self {
            updated: Mutex::new(updated),
            items: Mutex::new(items),
            fail: Mutex::new(false),
            fail_items: Mutex::new(false),
            fail_mutate: Mutex::new(false),
            item_requests: Mutex::new(0),
            mutated: Mutex::new(Vec::new()),
        })
    }

    pub fn set_updated(&self, updated: DateTime<Utc>) {
        *self.updated.lock().unwrap() = updated;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn set_items_failing(&self, fail: bool) {
        *self.fail_items.lock().unwrap() = fail;
    }

    pub fn set_mutate_failing(&self, fail: bool) {
        *self.fail_mutate.lock().unwrap() = fail;
    }

    pub fn item_requests(&self) -> usize {
        *self.item_requests.lock().unwrap()
    }

    pub fn mutated(&self) -> Vec<String> {
        self.mutated.lock().unwrap().clone()
    }

    fn unavailable(endpoint: &str) -> SourceError {
        SourceError::HttpStatus {
            endpoint: endpoint.to_string(),
            status: 503,
            retry_after: None,
        }
    }
}

#[async_trait]
impl BookmarkSource for FakeSource {
    async fn last_updated(&self) -> Result<DateTime<Utc>, SourceError> {
        if *self.fail.lock().unwrap() {
            return Err(Self::unavailable("/v1/posts/update"));
        }
        Ok(*self.updated.lock().unwrap())
    }

    async fn items(&self, _tag: &str) -> Result<Vec<Item>, SourceError> {
        *self.item_requests.lock().unwrap() += 1;
        if *self.fail_items.lock().unwrap() {
            return Err(Self::unavailable("/v1/posts/all"));
        }
        Ok(self.items.lock().unwrap().clone())
    }

    async fn mutate_or_delete_tag(&self, item: &Item) -> Result<(), SourceError> {
        if *self.fail_mutate.lock().unwrap() {
            return Err(Self::unavailable("/v1/posts/delete"));
        }
        if item.meta.is_some() {
            self.mutated.lock().unwrap().push(item.url.clone());
        }
        Ok(())
    }
}

/// A library directory, its history file and a frozen clock.
pub struct Harness {
    pub temp: TempDir,
    pub library: PathBuf,
    pub clock: Arc<FixedClock>,
    pub ledger: Ledger,
}

impl Harness {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let library = temp.path().join("library");
        std::fs::create_dir_all(&library).unwrap();
        let clock = Arc::new(FixedClock::new(start_time()));
        let ledger = Ledger::open(
            temp.path().join("state").join("history.json"),
            clock.clone() as Arc<dyn Clock>,
        )
        .unwrap();
        Self {
            temp,
            library,
            clock,
            ledger,
        }
    }

    pub fn processor(&self, fetcher: Arc<dyn Fetcher>) -> ItemProcessor {
        ItemProcessor::new(
            self.ledger.clone(),
            StagingArea::new(&self.library),
            OverwriteGuard::new(&self.library, DEFAULT_BACKUP_SUFFIX),
            fetcher,
        )
    }

    /// Entries directly under the library root, sorted.
    pub fn library_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.library)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn bookmark(url: &str, description: &str, tags: &[&str]) -> Item {
    Item::from_bookmark(
        url,
        description,
        BookmarkMeta {
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            time: "2024-02-01T10:00:00Z".to_string(),
            shared: false,
            to_read: false,
        },
    )
}
