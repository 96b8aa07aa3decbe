use sitesnap_core::store::INDEX_FILE;
use sitesnap_core::{CoreError, JobRecord, JobStatus, SnapshotStore};
use tempfile::TempDir;

fn record(host: &str, ts: &str, started_at: &str) -> JobRecord {
    JobRecord {
        host: host.to_string(),
        started_at: started_at.to_string(),
        finished_at: Some(started_at.to_string()),
        root_url: format!("https://{}/", host),
        depth: 1,
        count_fetched: 3,
        bytes_stored: 1024,
        status: JobStatus::Success,
        error: None,
        ts: ts.to_string(),
    }
}

#[tokio::test]
async fn test_missing_index_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    assert!(store.load_index("example.com").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_prepend_keeps_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    store
        .prepend_record(record("example.com", "20250101T000000Z", "2025-01-01T00:00:00Z"))
        .await
        .unwrap();
    store
        .prepend_record(record("example.com", "20250102T000000Z", "2025-01-02T00:00:00Z"))
        .await
        .unwrap();

    let records = store.load_index("example.com").await.unwrap();
    let ts: Vec<&str> = records.iter().map(|r| r.ts.as_str()).collect();
    assert_eq!(ts, vec!["20250102T000000Z", "20250101T000000Z"]);

    let raw = std::fs::read_to_string(dir.path().join("example.com").join(INDEX_FILE)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value[0]["status"], "success");
}

#[tokio::test]
async fn test_ensure_directories_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    let first = store
        .ensure_directories("example.com", "20250101T000000Z")
        .await
        .unwrap();
    let second = store
        .ensure_directories("example.com", "20250101T000000Z")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert!(first.root().join("original").is_dir());
    assert!(first.root().join("local").is_dir());
}

#[tokio::test]
async fn test_delete_snapshot_keeps_other_runs() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    for (ts, started) in [
        ("20250101T000000Z", "2025-01-01T00:00:00Z"),
        ("20250102T000000Z", "2025-01-02T00:00:00Z"),
    ] {
        store.ensure_directories("example.com", ts).await.unwrap();
        store
            .prepend_record(record("example.com", ts, started))
            .await
            .unwrap();
    }

    store
        .delete_snapshot("example.com", "20250101T000000Z")
        .await
        .unwrap();

    let host_dir = dir.path().join("example.com");
    assert!(!host_dir.join("20250101T000000Z").exists());
    assert!(host_dir.join("20250102T000000Z").is_dir());

    let records = store.load_index("example.com").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ts, "20250102T000000Z");
}

#[tokio::test]
async fn test_delete_last_snapshot_removes_host() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    store
        .ensure_directories("example.com", "20250101T000000Z")
        .await
        .unwrap();
    store
        .prepend_record(record("example.com", "20250101T000000Z", "2025-01-01T00:00:00Z"))
        .await
        .unwrap();

    store
        .delete_snapshot("example.com", "20250101T000000Z")
        .await
        .unwrap();

    assert!(!dir.path().join("example.com").exists());
}

#[tokio::test]
async fn test_delete_host_and_all() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    store
        .ensure_directories("a.example", "20250101T000000Z")
        .await
        .unwrap();
    store
        .ensure_directories("b.example", "20250101T000000Z")
        .await
        .unwrap();

    store.delete_host("a.example").await.unwrap();
    assert!(!dir.path().join("a.example").exists());
    assert!(dir.path().join("b.example").exists());

    // Deleting twice is fine
    store.delete_host("a.example").await.unwrap();

    store.delete_all().await.unwrap();
    assert!(dir.path().is_dir());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_list_sites_most_recent_first() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    store
        .prepend_record(record("old.example", "20240101T000000Z", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();
    store
        .prepend_record(record("new.example", "20250101T000000Z", "2025-01-01T00:00:00Z"))
        .await
        .unwrap();
    store
        .prepend_record(record("new.example", "20250201T000000Z", "2025-02-01T00:00:00Z"))
        .await
        .unwrap();
    std::fs::create_dir_all(dir.path().join("empty.example")).unwrap();

    let sites = store.list_sites().await.unwrap();
    let hosts: Vec<&str> = sites.iter().map(|s| s.host.as_str()).collect();
    assert_eq!(hosts, vec!["new.example", "old.example", "empty.example"]);

    assert_eq!(sites[0].snapshots, 2);
    assert_eq!(sites[0].last_ts.as_deref(), Some("20250201T000000Z"));
    assert_eq!(sites[2].snapshots, 0);
    assert_eq!(sites[2].last_started, None);
}

#[tokio::test]
async fn test_list_sites_without_root() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path().join("missing"));

    assert!(store.list_sites().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejects_path_traversal() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    assert!(matches!(
        store.delete_host("..").await,
        Err(CoreError::InvalidRequest(_))
    ));
    assert!(matches!(
        store.delete_snapshot("example.com", "../other").await,
        Err(CoreError::InvalidRequest(_))
    ));
    assert!(store.host_dir("").is_err());
}

#[tokio::test]
async fn test_delete_snapshot_without_index() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    store
        .ensure_directories("example.com", "20250101T000000Z")
        .await
        .unwrap();
    assert!(!dir.path().join("example.com").join(INDEX_FILE).exists());

    store
        .delete_snapshot("example.com", "20250101T000000Z")
        .await
        .unwrap();

    assert!(!dir.path().join("example.com").exists());
}

#[tokio::test]
async fn test_delete_last_snapshot_removes_index() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    store
        .ensure_directories("example.com", "20250101T000000Z")
        .await
        .unwrap();
    store
        .prepend_record(record("example.com", "20250101T000000Z", "2025-01-01T00:00:00Z"))
        .await
        .unwrap();
    // Unrelated content keeps the host directory alive.
    std::fs::write(dir.path().join("example.com").join("notes.txt"), "keep").unwrap();

    store
        .delete_snapshot("example.com", "20250101T000000Z")
        .await
        .unwrap();

    let host_dir = dir.path().join("example.com");
    assert!(!host_dir.join(INDEX_FILE).exists());
    assert!(host_dir.join("notes.txt").is_file());
    assert!(store.load_index("example.com").await.unwrap().is_empty());
}
