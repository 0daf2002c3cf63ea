//! 使用真实 git 的端到端同步测试，PATH 中没有 git 时跳过

use ossync_lib::core::ChangeKind;
use ossync_lib::core::ChangeTracker;
use ossync_lib::core::GitTracker;
use ossync_lib::storage::{LocalStorage, Storage};
use ossync_lib::{SyncConfig, SyncEngine, SyncState};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn engine(source: &Path, storage: Arc<dyn Storage>, incremental: bool) -> SyncEngine {
    let mut config = SyncConfig::new(source, "/site/");
    config.incremental_mode = incremental;
    SyncEngine::new(config, storage)
}

fn keys(ops: &[ossync_lib::core::ObjectOp]) -> Vec<&str> {
    let mut keys: Vec<&str> = ops.iter().map(|op| op.key.as_str()).collect();
    keys.sort();
    keys
}

#[tokio::test]
async fn test_full_then_incremental_sync() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }

    let source = TempDir::new().unwrap();
    let remote_dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> =
        Arc::new(LocalStorage::new(remote_dir.path().to_str().unwrap()).unwrap());

    write(source.path(), "a.txt", "alpha");
    write(source.path(), "dir/b.txt", "bravo");

    let report = engine(source.path(), storage.clone(), false)
        .exec()
        .await
        .unwrap();
    assert_eq!(report.state, SyncState::Fresh);
    assert_eq!(keys(&report.queue.put), vec!["site/a.txt", "site/dir/b.txt"]);
    assert!(report.queue.delete.is_empty());
    assert_eq!(fs::read(remote_dir.path().join("site/a.txt")).unwrap(), b"alpha");

    write(source.path(), "a.txt", "alpha v2");
    write(source.path(), "c.txt", "charlie");
    fs::remove_file(source.path().join("dir/b.txt")).unwrap();

    let report = engine(source.path(), storage.clone(), true)
        .exec()
        .await
        .unwrap();
    assert_eq!(report.state, SyncState::Resumed);
    assert_eq!(keys(&report.queue.put), vec!["site/a.txt", "site/c.txt"]);
    assert_eq!(keys(&report.queue.delete), vec!["site/dir/b.txt"]);
    assert_eq!(fs::read(remote_dir.path().join("site/a.txt")).unwrap(), b"alpha v2");
    assert!(!remote_dir.path().join("site/dir/b.txt").exists());

    // 没有变化时队列为空
    let report = engine(source.path(), storage.clone(), false)
        .exec()
        .await
        .unwrap();
    assert!(report.queue.is_empty());
    assert_eq!(report.files_uploaded, 0);
}

#[tokio::test]
async fn test_rename_becomes_delete_and_put() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }

    let source = TempDir::new().unwrap();
    let remote_dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> =
        Arc::new(LocalStorage::new(remote_dir.path().to_str().unwrap()).unwrap());

    write(source.path(), "docs/old.md", "# same content that git can follow\n");
    engine(source.path(), storage.clone(), true)
        .exec()
        .await
        .unwrap();

    fs::rename(
        source.path().join("docs/old.md"),
        source.path().join("docs/new.md"),
    )
    .unwrap();

    let report = engine(source.path(), storage.clone(), true)
        .exec()
        .await
        .unwrap();
    assert_eq!(keys(&report.queue.put), vec!["site/docs/new.md"]);
    assert_eq!(keys(&report.queue.delete), vec!["site/docs/old.md"]);
    assert!(remote_dir.path().join("site/docs/new.md").exists());
    assert!(!remote_dir.path().join("site/docs/old.md").exists());
}

#[tokio::test]
async fn test_force_upload_resends_everything() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }

    let source = TempDir::new().unwrap();
    let remote_dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> =
        Arc::new(LocalStorage::new(remote_dir.path().to_str().unwrap()).unwrap());

    write(source.path(), "a.txt", "alpha");
    write(source.path(), "b.txt", "bravo");
    engine(source.path(), storage.clone(), false)
        .exec()
        .await
        .unwrap();

    let mut config = SyncConfig::new(source.path(), "site");
    config.force_upload = true;
    let report = SyncEngine::new(config, storage.clone())
        .exec()
        .await
        .unwrap();

    assert_eq!(report.state, SyncState::Reset);
    assert_eq!(keys(&report.queue.put), vec!["site/a.txt", "site/b.txt"]);
    assert!(report.queue.delete.is_empty());
}

#[tokio::test]
async fn test_git_tracker_reports_staged_changes() {
    if !git_available() {
        eprintln!("git not found, skipping");
        return;
    }

    let root = TempDir::new().unwrap();
    let work_tree = root.path().join("trash");
    fs::create_dir_all(&work_tree).unwrap();
    let tracker = GitTracker::new("git", root.path().join("repo"), &work_tree);

    tracker.init().await.unwrap();
    // 重复 init 是幂等的
    tracker.init().await.unwrap();

    write(&work_tree, "keep.txt", "k");
    write(&work_tree, "gone.txt", "g");
    tracker.add().await.unwrap();
    let records = tracker.status().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.kind == ChangeKind::Added));
    tracker.commit().await.unwrap();

    tracker.add().await.unwrap();
    assert!(tracker.status().await.unwrap().is_empty());
    // 没有变化也能提交
    tracker.commit().await.unwrap();

    write(&work_tree, "keep.txt", "k2");
    fs::remove_file(work_tree.join("gone.txt")).unwrap();
    tracker.add().await.unwrap();
    let mut records = tracker.status().await.unwrap();
    records.sort_by(|a, b| a.path.cmp(&b.path));

    assert_eq!(records[0].path, "gone.txt");
    assert_eq!(records[0].kind, ChangeKind::Deleted);
    assert_eq!(records[1].path, "keep.txt");
    assert_eq!(records[1].kind, ChangeKind::Modified);
}
