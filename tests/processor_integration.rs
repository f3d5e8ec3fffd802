//! Integration tests for the per-item ingestion protocol.
//!
//! A scripted fetcher writes into the real staging directory so promotion,
//! backups and history updates run against the filesystem.

mod support;

use std::fs;

use pinfetch_core::ledger::ORPHANED_ARTIFACT_NOTE;
use pinfetch_core::{Item, ItemOutcome};
use support::{FakeFetcher, FakeSource, FetchScript, Harness, bookmark, start_time};

#[tokio::test]
async fn test_fresh_success_records_rate_and_promotes() {
    let harness = Harness::new();
    let fetcher = FakeFetcher::new([FetchScript::write("1.mp4", 1000, 2)]);
    let processor = harness.processor(fetcher.clone());
    let item = Item {
        url: "https://x/1".to_string(),
        description: "A".to_string(),
        meta: None,
    };

    let outcome = processor.process(&item).await;

    let expected_path = harness.library.join("1").join("1.mp4");
    match &outcome {
        ItemOutcome::Succeeded { path } => assert_eq!(path, &expected_path),
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(fs::read(&expected_path).unwrap().len(), 1000);

    let events = harness.ledger.get().unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert!(event.download_completed);
    assert_eq!(event.description, "A");
    assert!(event.video_file.starts_with(&harness.library));
    assert_eq!(event.size_bytes, Some(1000));
    assert_eq!(event.elapsed_seconds, Some(2.0));
    assert_eq!(event.rate_bytes_per_sec, Some(500.0));
    assert_eq!(event.date_time, start_time());

    // Only the promoted directory remains; staging was cleaned up.
    assert_eq!(harness.library_entries(), vec!["1".to_string()]);
}

#[tokio::test]
async fn test_second_run_skips_without_fetching() {
    let harness = Harness::new();
    let fetcher = FakeFetcher::new([FetchScript::write("1.mp4", 10, 1)]);
    let processor = harness.processor(fetcher.clone());
    let item = Item::synthetic("https://x/1");

    assert!(processor.process(&item).await.is_success());
    let before = fs::read(harness.ledger.path()).unwrap();

    let outcome = processor.process(&item).await;

    assert!(matches!(outcome, ItemOutcome::Skipped));
    assert_eq!(fetcher.calls().len(), 1);
    assert_eq!(fs::read(harness.ledger.path()).unwrap(), before);
}

#[tokio::test]
async fn test_failed_attempt_is_skipped_until_forced() {
    let harness = Harness::new();
    let fetcher = FakeFetcher::new([
        FetchScript::Network("HTTP 503".to_string()),
        FetchScript::write("1.mp4", 10, 1),
    ]);
    let item = Item::synthetic("https://x/1");

    let outcome = harness.processor(fetcher.clone()).process(&item).await;
    assert!(matches!(outcome, ItemOutcome::Failed { .. }));

    let outcome = harness.processor(fetcher.clone()).process(&item).await;
    assert!(matches!(outcome, ItemOutcome::Skipped));
    assert_eq!(fetcher.calls().len(), 1);

    let outcome = harness
        .processor(fetcher.clone())
        .with_force(true)
        .process(&item)
        .await;
    assert!(outcome.is_success());
    assert!(harness.ledger.get_event(&item.url).unwrap().unwrap().download_completed);
}

#[tokio::test]
async fn test_forced_overwrite_with_fetch_failure_restores_original() {
    let harness = Harness::new();
    let item = Item::synthetic("https://x/1");

    let initial = FakeFetcher::new([FetchScript::write("1.mp4", 64, 1)]);
    assert!(harness.processor(initial).process(&item).await.is_success());
    let original_path = harness.library.join("1").join("1.mp4");
    let sidecar = harness.library.join("1").join("1.nfo");
    fs::write(&sidecar, "<movie/>").unwrap();
    let original_bytes = fs::read(&original_path).unwrap();

    let failing = FakeFetcher::new([FetchScript::Network("connection reset".to_string())]);
    let outcome = harness
        .processor(failing.clone())
        .with_force(true)
        .process(&item)
        .await;

    assert!(matches!(outcome, ItemOutcome::Failed { .. }));
    assert_eq!(failing.calls(), vec![item.url.clone()]);
    assert_eq!(fs::read(&original_path).unwrap(), original_bytes);
    assert_eq!(fs::read_to_string(&sidecar).unwrap(), "<movie/>");

    let mut names: Vec<String> = fs::read_dir(harness.library.join("1"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["1.mp4".to_string(), "1.nfo".to_string()]);

    let event = harness.ledger.get_event(&item.url).unwrap().unwrap();
    assert!(!event.download_completed);
    assert!(event.error.contains("connection reset"), "{}", event.error);
    assert_eq!(harness.ledger.get().unwrap().len(), 1);
}

#[tokio::test]
async fn test_forced_overwrite_success_replaces_and_drops_backups() {
    let harness = Harness::new();
    let item = Item::synthetic("https://x/1");

    let initial = FakeFetcher::new([FetchScript::write("1.mp4", 64, 1)]);
    assert!(harness.processor(initial).process(&item).await.is_success());

    harness.clock.advance(chrono::Duration::hours(1));
    let refetch = FakeFetcher::new([FetchScript::write("1.mp4", 128, 4)]);
    let outcome = harness
        .processor(refetch)
        .with_force(true)
        .process(&item)
        .await;

    assert!(matches!(outcome, ItemOutcome::Succeeded { .. }));
    let dir = harness.library.join("1");
    assert_eq!(fs::read(dir.join("1.mp4")).unwrap().len(), 128);
    let leftovers: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".pinfetch-bak"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");

    let event = harness.ledger.get_event(&item.url).unwrap().unwrap();
    assert_eq!(event.size_bytes, Some(128));
    assert_eq!(event.rate_bytes_per_sec, Some(32.0));
    assert_eq!(event.date_time, start_time() + chrono::Duration::hours(1));
}

#[tokio::test]
async fn test_orphaned_artifact_records_stub_without_duplicate() {
    let harness = Harness::new();
    let existing_dir = harness.library.join("1");
    fs::create_dir_all(&existing_dir).unwrap();
    let existing = existing_dir.join("1.mp4");
    fs::write(&existing, b"already here").unwrap();

    let fetcher = FakeFetcher::new([FetchScript::write("1.mp4", 1000, 2)]);
    let item = Item::synthetic("https://x/1");
    let outcome = harness.processor(fetcher).process(&item).await;

    match &outcome {
        ItemOutcome::Orphaned { path } => assert_eq!(path, &existing),
        other => panic!("expected orphaned, got {other:?}"),
    }
    assert_eq!(fs::read(&existing).unwrap(), b"already here");
    assert_eq!(fs::read_dir(&existing_dir).unwrap().count(), 1);
    assert_eq!(harness.library_entries(), vec!["1".to_string()]);

    let event = harness.ledger.get_event(&item.url).unwrap().unwrap();
    assert!(event.download_completed);
    assert_eq!(event.video_file, existing);
    assert_eq!(event.error, ORPHANED_ARTIFACT_NOTE);
    assert!(event.size_bytes.is_none());
}

#[tokio::test]
async fn test_unlocatable_artifact_is_recorded_as_failure() {
    let harness = Harness::new();
    // `.part` files are transient and never count as the artifact.
    let fetcher = FakeFetcher::new([FetchScript::write("1.mp4.part", 10, 1)]);
    let item = Item::synthetic("https://x/1");

    let outcome = harness.processor(fetcher).process(&item).await;

    let ItemOutcome::Failed { error } = outcome else {
        panic!("expected failure");
    };
    assert!(error.to_string().contains("could not locate"));
    let event = harness.ledger.get_event(&item.url).unwrap().unwrap();
    assert!(!event.download_completed);
    assert!(harness.library_entries().is_empty());
}

#[tokio::test]
async fn test_source_notified_only_for_stored_bookmarks() {
    let harness = Harness::new();
    let source = FakeSource::new(start_time(), Vec::new());
    let fetcher = FakeFetcher::new([
        FetchScript::write("a.mp4", 10, 1),
        FetchScript::Network("timed out".to_string()),
    ]);
    let processor = harness.processor(fetcher).with_source(source.clone());

    let stored = bookmark("https://x/a", "A", &["video"]);
    let failed = bookmark("https://x/b", "B", &["video"]);
    assert!(processor.process(&stored).await.is_success());
    assert!(!processor.process(&failed).await.is_success());

    assert_eq!(source.mutated(), vec!["https://x/a".to_string()]);
}

#[tokio::test]
async fn test_history_write_failure_after_promotion_keeps_backups() {
    let harness = Harness::new();
    let item = Item::synthetic("https://x/1");

    let initial = FakeFetcher::new([FetchScript::write("1.mp4", 64, 1)]);
    assert!(harness.processor(initial).process(&item).await.is_success());

    // The history directory disappears mid-fetch: reads see an empty ledger
    // but the rewrite has nowhere to go.
    let refetch = FakeFetcher::new([FetchScript::write("1.mp4", 128, 1)]);
    refetch.remove_during_fetch(harness.ledger.path().parent().unwrap());
    let outcome = harness
        .processor(refetch)
        .with_force(true)
        .process(&item)
        .await;

    assert!(matches!(outcome, ItemOutcome::Failed { .. }), "{outcome:?}");
    let dir = harness.library.join("1");
    assert_eq!(fs::read(dir.join("1.mp4")).unwrap().len(), 128);
    assert_eq!(fs::read(dir.join("1.mp4.pinfetch-bak")).unwrap().len(), 64);
}

#[tokio::test]
async fn test_bookmark_update_failure_keeps_success() {
    let harness = Harness::new();
    let source = FakeSource::new(start_time(), Vec::new());
    source.set_mutate_failing(true);
    let fetcher = FakeFetcher::new([FetchScript::write("a.mp4", 10, 1)]);
    let processor = harness.processor(fetcher).with_source(source.clone());
    let item = bookmark("https://x/a", "A", &["video"]);

    let outcome = processor.process(&item).await;

    assert!(matches!(outcome, ItemOutcome::Succeeded { .. }), "{outcome:?}");
    assert!(source.mutated().is_empty());
    assert!(harness.ledger.get_event(&item.url).unwrap().unwrap().download_completed);
}

#[tokio::test]
async fn test_forced_refetch_landing_on_existing_file_restores_backups() {
    let harness = Harness::new();
    let item = Item::synthetic("https://x/1");

    let initial = FakeFetcher::new([FetchScript::write("1.mp4", 64, 1)]);
    assert!(harness.processor(initial).process(&item).await.is_success());
    let original = harness.library.join("1").join("1.mp4");

    // The refetch resolves to a different name that is already in the library.
    let other_dir = harness.library.join("2");
    fs::create_dir_all(&other_dir).unwrap();
    fs::write(other_dir.join("2.mp4"), b"someone else's").unwrap();

    let refetch = FakeFetcher::new([FetchScript::write("2.mp4", 128, 1)]);
    let outcome = harness
        .processor(refetch)
        .with_force(true)
        .process(&item)
        .await;

    match &outcome {
        ItemOutcome::Orphaned { path } => assert_eq!(path, &other_dir.join("2.mp4")),
        other => panic!("expected orphaned, got {other:?}"),
    }
    assert_eq!(fs::read(&original).unwrap().len(), 64);
    assert!(!harness.library.join("1").join("1.mp4.pinfetch-bak").exists());
    assert_eq!(fs::read(other_dir.join("2.mp4")).unwrap(), b"someone else's");

    let event = harness.ledger.get_event(&item.url).unwrap().unwrap();
    assert_eq!(event.video_file, other_dir.join("2.mp4"));
    assert_eq!(event.error, ORPHANED_ARTIFACT_NOTE);
}
