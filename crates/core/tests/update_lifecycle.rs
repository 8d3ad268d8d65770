//! Update lifecycle integration tests.
//!
//! These tests drive the updater over a real directory of torrent files with
//! mock trackers and a mock client, covering every outcome and the
//! crash-safe replace protocol.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use refresher_core::{
    config::CheckKind,
    load_directory,
    testing::{
        fixtures, ClientCall, MockFailure, MockTorrentClient, MockTracker, RecordingReporter,
        ReporterEvent,
    },
    torrent_client::{Customs, TorrentClient},
    tracker::Tracker,
    update::{
        build_report, find_partial_updates, replace_torrent,
        sidecar::{meta_path, newdata_path, time_path},
        ClientContext, Outcome, OutcomeKind, UpdateOptions, UpdateSummary, Updater,
    },
    TorrentRecord,
};

const COMMENT: &str = "https://site.example/t/1";

/// Test helper owning a temporary torrent directory.
struct TestHarness {
    dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, bytes).expect("Failed to write torrent");
        path
    }

    async fn torrents(&self) -> BTreeMap<String, Option<TorrentRecord>> {
        load_directory(self.dir.path())
            .await
            .expect("Failed to load directory")
    }

    /// Names of every file in the directory, sorted.
    fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn run(&self, updater: &Updater) -> (UpdateSummary, RecordingReporter) {
        let mut reporter = RecordingReporter::new();
        let summary = updater
            .run(self.torrents().await, &mut reporter)
            .await
            .expect("Run failed");
        (summary, reporter)
    }
}

fn hash_of(bytes: &[u8]) -> String {
    TorrentRecord::from_bytes(bytes.to_vec())
        .unwrap()
        .info_hash()
        .unwrap()
        .to_string()
}

fn outcome<'a>(summary: &'a UpdateSummary, name: &str) -> &'a Outcome {
    &summary
        .results
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("no result for {}", name))
        .outcome
}

fn old_torrent() -> Vec<u8> {
    fixtures::multi_file_torrent("album", &[("01.flac", 100), ("cover.jpg", 5)], Some(COMMENT))
}

fn new_torrent() -> Vec<u8> {
    fixtures::multi_file_torrent(
        "album",
        &[("01.flac", 120), ("02.flac", 80), ("cover.jpg", 5)],
        Some(COMMENT),
    )
}

fn updater(
    trackers: Vec<Arc<MockTracker>>,
    client: Option<Arc<MockTorrentClient>>,
    options: UpdateOptions,
) -> Updater {
    let trackers = trackers
        .into_iter()
        .map(|t| t as Arc<dyn Tracker>)
        .collect();
    Updater::new(trackers, client.map(|c| c as Arc<dyn TorrentClient>), options)
}

#[tokio::test]
async fn test_classification_outcomes_without_client() {
    let harness = TestHarness::new();
    harness.write("broken.torrent", b"not bencode");
    harness.write("noinfo.torrent", b"d7:comment1:xe");
    harness.write(
        "orphan.torrent",
        &fixtures::single_file_torrent("orphan", 1, Some("https://elsewhere/t/9")),
    );
    harness.write("uncommented.torrent", &fixtures::single_file_torrent("u", 1, None));

    let tracker = Arc::new(MockTracker::new("site", "site.example", CheckKind::Hash));
    let updater = updater(vec![tracker.clone()], None, UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    assert_eq!(outcome(&summary, "broken.torrent"), &Outcome::Invalid);
    assert_eq!(outcome(&summary, "noinfo.torrent"), &Outcome::Invalid);
    assert_eq!(outcome(&summary, "orphan.torrent"), &Outcome::Unknown);
    assert_eq!(outcome(&summary, "uncommented.torrent"), &Outcome::Unknown);
    assert_eq!(tracker.check_calls(), 0);
}

#[tokio::test]
async fn test_not_in_client() {
    let harness = TestHarness::new();
    harness.write("a.torrent", &old_torrent());

    let client = Arc::new(MockTorrentClient::new());
    client.add(&"0".repeat(40), "/elsewhere").await;
    let tracker = Arc::new(MockTracker::new("site", "site.example", CheckKind::Hash));

    let updater = updater(vec![tracker.clone()], Some(client), UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    assert_eq!(outcome(&summary, "a.torrent"), &Outcome::NotInClient);
    assert_eq!(tracker.check_calls(), 0);
}

#[tokio::test]
async fn test_unchanged_hash_passes_without_sidecars() {
    let harness = TestHarness::new();
    let old = old_torrent();
    harness.write("a.torrent", &old);

    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Hash).with_remote_hash(&hash_of(&old)),
    );
    let updater = updater(vec![tracker.clone()], None, UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    assert_eq!(outcome(&summary, "a.torrent"), &Outcome::Passed);
    assert_eq!(summary.results[0].tracker.as_deref(), Some("site"));
    assert_eq!(tracker.fetch_calls(), 0);
    assert_eq!(harness.files(), vec!["a.torrent"]);
}

#[tokio::test]
async fn test_changed_hash_replaces_file_and_client_entry() {
    let harness = TestHarness::new();
    let old = old_torrent();
    let new = new_torrent();
    let path = harness.write("a.torrent", &old);
    let (old_hash, new_hash) = (hash_of(&old), hash_of(&new));

    let client = Arc::new(MockTorrentClient::new());
    client
        .add_with_customs(
            &old_hash,
            "/data/music",
            Customs::from([("category".to_string(), "music".to_string())]),
        )
        .await;

    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Hash)
            .with_remote_hash(&new_hash)
            .with_new_data(new.clone()),
    );
    let options = UpdateOptions {
        save_customs: vec!["category".to_string()],
        set_customs: Customs::from([("tags".to_string(), "refreshed".to_string())]),
        ..UpdateOptions::default()
    };
    let updater = updater(vec![tracker], Some(client.clone()), options);
    let (summary, _) = harness.run(&updater).await;

    let Outcome::Affected { diff } = outcome(&summary, "a.torrent") else {
        panic!("expected affected");
    };
    assert_eq!(diff.added.iter().collect::<Vec<_>>(), vec!["album/02.flac"]);
    assert_eq!(diff.modified.iter().collect::<Vec<_>>(), vec!["album/01.flac"]);
    assert!(diff.removed.is_empty());
    assert!(diff.type_modified.is_empty());

    assert_eq!(std::fs::read(&path).unwrap(), new);
    assert!(!newdata_path(&path).exists());
    assert!(!meta_path(&path).exists());
    assert_eq!(summary.results[0].torrent.as_ref().unwrap().hash, new_hash);

    assert!(client.entry(&old_hash).await.is_none());
    let (prefix, customs) = client.entry(&new_hash).await.unwrap();
    assert_eq!(prefix, "/data/music");
    assert_eq!(customs["category"], "music");
    assert_eq!(customs["tags"], "refreshed");

    let calls = client.calls().await;
    let remove = calls.iter().position(|c| *c == ClientCall::Remove(old_hash.clone()));
    let load = calls
        .iter()
        .position(|c| matches!(c, ClientCall::Load { hash, .. } if *hash == new_hash));
    assert!(remove.unwrap() < load.unwrap());
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let harness = TestHarness::new();
    let old = old_torrent();
    let path = harness.write("a.torrent", &old);

    let client = Arc::new(MockTorrentClient::new());
    client.add(&hash_of(&old), "/data").await;
    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Hash)
            .with_remote_hash(&hash_of(&new_torrent()))
            .with_new_data(new_torrent()),
    );
    let options = UpdateOptions {
        dry_run: true,
        ..UpdateOptions::default()
    };
    let updater = updater(vec![tracker], Some(client.clone()), options);
    let (summary, _) = harness.run(&updater).await;

    assert_eq!(outcome(&summary, "a.torrent").kind(), OutcomeKind::Affected);
    assert_eq!(std::fs::read(&path).unwrap(), old);
    assert_eq!(harness.files(), vec!["a.torrent"]);
    assert_eq!(client.calls().await, vec![ClientCall::Hashes]);
}

#[tokio::test]
async fn test_force_refetches_unchanged_torrent() {
    let harness = TestHarness::new();
    let old = old_torrent();
    let path = harness.write("a.torrent", &old);
    // Same info, different outer keys
    let refetched = fixtures::with_announce(&old, "http://bt.site.example/announce");

    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Hash)
            .with_remote_hash(&hash_of(&old))
            .with_new_data(refetched.clone()),
    );
    let options = UpdateOptions {
        force: true,
        ..UpdateOptions::default()
    };
    let updater = updater(vec![tracker.clone()], None, options);
    let (summary, _) = harness.run(&updater).await;

    let Outcome::Affected { diff } = outcome(&summary, "a.torrent") else {
        panic!("expected affected");
    };
    assert!(diff.is_empty());
    assert_eq!(tracker.fetch_calls(), 1);
    assert_eq!(std::fs::read(&path).unwrap(), refetched);
}

#[tokio::test]
async fn test_tracker_error_does_not_abort_batch() {
    let harness = TestHarness::new();
    harness.write("a.torrent", &old_torrent());
    harness.write(
        "b.torrent",
        &fixtures::single_file_torrent("b", 1, Some("https://other.example/t/2")),
    );

    let failing = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Hash)
            .with_remote_hash(&"f".repeat(40))
            .failing_fetch(MockFailure::Auth("session expired".to_string())),
    );
    let other = Arc::new(
        MockTracker::new("other", "other.example", CheckKind::Scrape).with_registered(true),
    );
    let updater = updater(vec![failing, other], None, UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    let Outcome::TrackerError(error) = outcome(&summary, "a.torrent") else {
        panic!("expected tracker error");
    };
    assert_eq!(error.name, "AuthError");
    assert!(error.message.contains("session expired"));
    assert_eq!(outcome(&summary, "b.torrent"), &Outcome::Passed);
}

#[tokio::test]
async fn test_network_error_is_tracker_error() {
    let harness = TestHarness::new();
    harness.write("a.torrent", &old_torrent());

    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Hash)
            .failing_check(MockFailure::Network("https://site.example/dl/1".to_string())),
    );
    let updater = updater(vec![tracker], None, UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    let error = outcome(&summary, "a.torrent").error().unwrap();
    assert_eq!(error.name, "NetworkError");
}

#[tokio::test]
async fn test_panic_becomes_unhandled_error() {
    let harness = TestHarness::new();
    harness.write("a.torrent", &old_torrent());
    harness.write(
        "b.torrent",
        &fixtures::single_file_torrent("b", 1, Some("https://other.example/t/2")),
    );

    let panicking = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Scrape)
            .failing_check(MockFailure::Panic("plugin bug".to_string())),
    );
    let other = Arc::new(
        MockTracker::new("other", "other.example", CheckKind::Scrape).with_registered(true),
    );
    let updater = updater(vec![panicking, other], None, UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    let Outcome::UnhandledError { error, traceback } = outcome(&summary, "a.torrent") else {
        panic!("expected unhandled error");
    };
    assert_eq!(error.name, "Panic");
    assert_eq!(error.message, "plugin bug");
    assert_eq!(traceback[0], "panicked: plugin bug");
    assert_eq!(traceback[1], "while updating a.torrent with tracker site");
    assert_eq!(outcome(&summary, "b.torrent"), &Outcome::Passed);
}

#[tokio::test]
async fn test_bad_download_is_parse_error() {
    let harness = TestHarness::new();
    harness.write("a.torrent", &old_torrent());

    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Scrape)
            .with_registered(false)
            .with_new_data(b"<html>login</html>".to_vec()),
    );
    let updater = updater(vec![tracker], None, UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    let error = outcome(&summary, "a.torrent").error().unwrap();
    assert_eq!(error.name, "ParseError");
    assert_eq!(harness.files(), vec!["a.torrent"]);
}

#[tokio::test]
async fn test_unregistered_scrape_is_affected() {
    let harness = TestHarness::new();
    let path = harness.write("a.torrent", &old_torrent());

    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Scrape)
            .with_registered(false)
            .with_new_data(new_torrent()),
    );
    let updater = updater(vec![tracker], None, UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    assert_eq!(outcome(&summary, "a.torrent").kind(), OutcomeKind::Affected);
    assert_eq!(std::fs::read(&path).unwrap(), new_torrent());
}

#[tokio::test]
async fn test_timestamp_seeded_from_mtime_then_advanced() {
    let harness = TestHarness::new();
    let path = harness.write("a.torrent", &old_torrent());

    // Remote time long before the file was written: unchanged
    let old_site = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Timestamp)
            .with_remote_timestamp(1_000_000_000),
    );
    let (summary, _) = harness
        .run(&updater(vec![old_site], None, UpdateOptions::default()))
        .await;
    assert_eq!(outcome(&summary, "a.torrent"), &Outcome::Passed);

    let seeded: i64 = std::fs::read_to_string(time_path(&path))
        .unwrap()
        .parse()
        .unwrap();
    assert!(seeded > 1_000_000_000);

    // Remote time after the seed: refreshed and recorded
    let remote = seeded + 3600;
    let new_site = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Timestamp)
            .with_remote_timestamp(remote)
            .with_new_data(new_torrent()),
    );
    let (summary, _) = harness
        .run(&updater(vec![new_site], None, UpdateOptions::default()))
        .await;
    assert_eq!(outcome(&summary, "a.torrent").kind(), OutcomeKind::Affected);
    assert_eq!(
        std::fs::read_to_string(time_path(&path)).unwrap(),
        remote.to_string()
    );
}

#[tokio::test]
async fn test_failed_client_reload_leaves_partial_update() {
    let harness = TestHarness::new();
    let old = old_torrent();
    let new = new_torrent();
    let path = harness.write("a.torrent", &old);

    let client = Arc::new(MockTorrentClient::new());
    client.add(&hash_of(&old), "/data").await;
    client.set_fail_load(true).await;

    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Hash)
            .with_remote_hash(&hash_of(&new))
            .with_new_data(new.clone()),
    );
    let updater = updater(vec![tracker], Some(client), UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    let Outcome::UnhandledError { error, traceback } = outcome(&summary, "a.torrent") else {
        panic!("expected unhandled error");
    };
    assert_eq!(error.name, "TorrentClientError");
    assert_eq!(traceback[0], "loading torrent into client");

    assert_eq!(std::fs::read(&path).unwrap(), new);
    assert!(meta_path(&path).exists());
    assert_eq!(find_partial_updates(harness.dir.path()).await.unwrap(), vec![path]);
}

#[tokio::test]
async fn test_failed_detach_keeps_original() {
    let harness = TestHarness::new();
    let old = old_torrent();
    let path = harness.write("a.torrent", &old);
    let mut record = TorrentRecord::load(&path).await.unwrap();

    // Client lost the torrent: the replace stops before touching the file
    let client = MockTorrentClient::new();
    let ctx = ClientContext {
        client: &client,
        save_customs: &[],
        set_customs: &Customs::new(),
    };
    assert!(replace_torrent(&mut record, new_torrent(), Some(ctx), None)
        .await
        .is_err());

    assert_eq!(std::fs::read(&path).unwrap(), old);
    assert!(!meta_path(&path).exists());
    assert!(!newdata_path(&path).exists());
    assert!(find_partial_updates(harness.dir.path()).await.unwrap().is_empty());
    assert_eq!(record.info_hash().unwrap(), hash_of(&old));
}

#[tokio::test]
async fn test_order_and_notifications() {
    let harness = TestHarness::new();
    for name in ["c.torrent", "a.torrent", "b.torrent"] {
        harness.write(name, &fixtures::single_file_torrent(name, 1, None));
    }

    let updater = updater(vec![], None, UpdateOptions::default());
    let (summary, reporter) = harness.run(&updater).await;

    let names: Vec<_> = summary.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a.torrent", "b.torrent", "c.torrent"]);
    assert_eq!(
        reporter.events,
        vec![
            ReporterEvent::InProgress("a.torrent".to_string()),
            ReporterEvent::Finished("a.torrent".to_string(), OutcomeKind::Unknown),
            ReporterEvent::InProgress("b.torrent".to_string()),
            ReporterEvent::Finished("b.torrent".to_string(), OutcomeKind::Unknown),
            ReporterEvent::InProgress("c.torrent".to_string()),
            ReporterEvent::Finished("c.torrent".to_string(), OutcomeKind::Unknown),
            ReporterEvent::Finish(3),
        ]
    );
    assert_eq!(summary.counts()[&OutcomeKind::Unknown], 3);
}

#[tokio::test]
async fn test_client_failure_aborts_run() {
    let harness = TestHarness::new();
    harness.write("a.torrent", &old_torrent());

    let client = Arc::new(MockTorrentClient::new());
    client.set_fail_hashes(true).await;
    let updater = updater(vec![], Some(client), UpdateOptions::default());

    let mut reporter = RecordingReporter::new();
    let result = updater.run(harness.torrents().await, &mut reporter).await;
    assert!(result.is_err());
    assert!(reporter.events.is_empty());
}

#[tokio::test]
async fn test_report_covers_every_torrent() {
    let harness = TestHarness::new();
    harness.write("a.torrent", &old_torrent());
    harness.write("broken.torrent", b"x");

    let tracker = Arc::new(
        MockTracker::new("site", "site.example", CheckKind::Hash)
            .with_remote_hash(&hash_of(&new_torrent()))
            .with_new_data(new_torrent()),
    );
    let updater = updater(vec![tracker], None, UpdateOptions::default());
    let (summary, _) = harness.run(&updater).await;

    let report = serde_json::to_value(build_report(&summary)).unwrap();
    assert_eq!(report["a.torrent"]["status"], "affected");
    assert_eq!(report["a.torrent"]["tracker"], "site");
    assert_eq!(report["a.torrent"]["torrent"]["comment"], COMMENT);
    assert_eq!(report["a.torrent"]["stat"]["added"], 1);
    assert_eq!(report["broken.torrent"]["status"], "invalid");
}
