//! Crash safety of commit
//!
//! Each scenario re-runs this test binary as a child process limited to
//! `crash_child_commit`, with `MULTIDB_CRASH_POINT` set. The child aborts at
//! that point without unwinding; the parent then checks the file.
//!
//! - Crash before the rename: file byte-identical to its pre-commit content
//! - Crash after the rename: the new content, complete
//! - Either way the dead writer's lock is free at once, and the next writer
//!   sweeps the temp file it left behind

use std::env;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use multidb::crash_point::{points, CRASH_POINT_ENV};
use multidb::lock::{is_locked, lock_path, read_holder};
use multidb::{AccessMode, ErrorKind, MultiDb};
use serde_json::json;
use tempfile::TempDir;

/// Database path handed to the child
const CHILD_DB_ENV: &str = "MULTIDB_CRASH_TEST_DB";

/// Child half: open, write, commit. Does nothing outside a crash scenario.
#[test]
#[ignore]
fn crash_child_commit() {
    let Ok(path) = env::var(CHILD_DB_ENV) else {
        return;
    };

    let mut session = MultiDb::open(&path, AccessMode::ReadWrite).unwrap();
    session.set(["a", "b"], json!("new")).unwrap();
    session.set(["c", "d"], json!({"added": true})).unwrap();
    session.delete(["x", "y"]).unwrap();
    session.commit().unwrap();
}

fn execute_with_crash_point(crash_point: &str, db: &Path) -> Output {
    let exe = env::current_exe().expect("test binary path");
    Command::new(exe)
        .args([
            "crash_child_commit",
            "--exact",
            "--ignored",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(CRASH_POINT_ENV, crash_point)
        .env(CHILD_DB_ENV, db)
        .output()
        .expect("failed to spawn child test process")
}

fn seed(dir: &TempDir) -> (std::path::PathBuf, Vec<u8>) {
    let path = dir.path().join("db.json");
    let mut s = MultiDb::create(&path, 2).unwrap();
    s.set(["a", "b"], json!("old")).unwrap();
    s.set(["x", "y"], json!(1)).unwrap();
    s.commit().unwrap();
    s.close().unwrap();
    let before = fs::read(&path).unwrap();
    (path, before)
}

fn report(point: &str, output: &Output) -> String {
    format!(
        "crash point {}: status {:?}\nstdout:\n{}\nstderr:\n{}",
        point,
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn temp_files(dir: &Path) -> Vec<std::path::PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().ends_with(".tmp"))
        .collect()
}

/// The dead child's lock file is still there but holds no OS lock
fn assert_abandoned_lock_is_free(path: &Path) {
    assert!(lock_path(path).exists());
    let holder = read_holder(path).expect("lock file records its last holder");
    assert_ne!(holder.pid, std::process::id());
    assert!(!is_locked(path).unwrap());

    let writer = MultiDb::open(path, AccessMode::ReadWrite).unwrap();
    assert_eq!(read_holder(path).unwrap().session_id, writer.id().to_string());
    assert!(temp_files(path.parent().unwrap()).is_empty());

    let err = MultiDb::open(path, AccessMode::ReadWrite).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lock);
}

#[test]
fn test_crash_before_replace_keeps_original_bytes() {
    for point in [
        points::COMMIT_BEFORE_WRITE,
        points::STORAGE_BEFORE_TEMP_WRITE,
        points::STORAGE_AFTER_TEMP_WRITE,
        points::STORAGE_BEFORE_RENAME,
    ] {
        let dir = TempDir::new().unwrap();
        let (path, before) = seed(&dir);

        let output = execute_with_crash_point(point, &path);
        assert!(!output.status.success(), "{}", report(point, &output));

        assert_eq!(fs::read(&path).unwrap(), before, "{}", report(point, &output));
        if point == points::STORAGE_AFTER_TEMP_WRITE || point == points::STORAGE_BEFORE_RENAME {
            assert_eq!(temp_files(dir.path()).len(), 1, "{}", report(point, &output));
        }

        let reader = MultiDb::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(reader.get(["a", "b"]).unwrap(), Some(json!("old")));
        assert_eq!(reader.get(["c", "d"]).unwrap(), None);
        assert_eq!(reader.get(["x", "y"]).unwrap(), Some(json!(1)));

        assert_abandoned_lock_is_free(&path);
    }
}

#[test]
fn test_crash_after_replace_keeps_new_content() {
    for point in [points::STORAGE_AFTER_RENAME, points::COMMIT_AFTER_WRITE] {
        let dir = TempDir::new().unwrap();
        let (path, _) = seed(&dir);

        let output = execute_with_crash_point(point, &path);
        assert!(!output.status.success(), "{}", report(point, &output));

        let reader = MultiDb::open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(reader.get(["a", "b"]).unwrap(), Some(json!("new")));
        assert_eq!(reader.get(["c", "d"]).unwrap(), Some(json!({"added": true})));
        assert_eq!(reader.get(["x", "y"]).unwrap(), None);
        assert!(reader.list(["x"], None).unwrap().is_empty());

        assert_abandoned_lock_is_free(&path);
    }
}

#[test]
fn test_child_without_crash_point_commits() {
    let dir = TempDir::new().unwrap();
    let (path, _) = seed(&dir);

    let output = execute_with_crash_point("no_such_point", &path);
    assert!(output.status.success(), "{}", report("none", &output));

    let reader = MultiDb::open(&path, AccessMode::ReadOnly).unwrap();
    assert_eq!(reader.get(["a", "b"]).unwrap(), Some(json!("new")));
    assert!(!lock_path(&path).exists());
}
