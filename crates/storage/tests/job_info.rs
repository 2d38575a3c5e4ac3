#![forbid(unsafe_code)]

use rusqlite::{Connection, params};
use sl_core::ids::JobId;
use sl_core::model::Job;
use sl_storage::{InfoStorage, SqliteStore, StoreError};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("sl_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn setup(test_name: &str) -> (SqliteStore, PathBuf, Job) {
    let dir = temp_dir(test_name);
    let mut store = SqliteStore::open(&dir).expect("open store");
    let id = JobId::try_new(1).expect("job id");
    store.job_create(id).expect("create job");
    (store, dir, Job::new(id))
}

fn raw_conn(dir: &PathBuf) -> Connection {
    Connection::open(dir.join("sidelog.db")).expect("open raw connection")
}

fn info_row_count(dir: &PathBuf, job_id: i64, info_key: &[u8]) -> i64 {
    raw_conn(dir)
        .query_row(
            "SELECT COUNT(*) FROM job_info WHERE job_id=?1 AND info_key=?2",
            params![job_id, info_key],
            |row| row.get(0),
        )
        .expect("count info rows")
}

#[test]
fn write_then_get_returns_latest() {
    let (mut store, dir, job) = setup("write_then_get");

    let tx = store.transaction().expect("begin tx");
    let info = InfoStorage::new(&job, &tx);
    info.write(b"checkpoint/0", b"v1").expect("write v1");
    info.write(b"checkpoint/0", b"v2").expect("write v2");
    info.write(b"checkpoint/0", b"v3").expect("write v3");
    assert_eq!(
        info.get(b"checkpoint/0").expect("get"),
        Some(b"v3".to_vec())
    );
    tx.commit().expect("commit");

    // Replacement compacts the revision log: one surviving row per key.
    assert_eq!(info_row_count(&dir, 1, b"checkpoint/0"), 1);
}

#[test]
fn get_missing_key_returns_none() {
    let (mut store, _dir, job) = setup("get_missing_key");

    let tx = store.transaction().expect("begin tx");
    let info = InfoStorage::new(&job, &tx);
    assert_eq!(info.get(b"never-written").expect("get"), None);
}

#[test]
fn iterate_dedups_and_orders_keys() {
    let (mut store, _dir, job) = setup("iterate_dedup_order");

    let tx = store.transaction().expect("begin tx");
    let info = InfoStorage::new(&job, &tx);
    for key in [&b"a/1"[..], b"a/2", b"b/1"] {
        info.write(key, b"first").expect("write first");
        info.write(key, b"second").expect("write second");
    }

    let mut visited = Vec::<(Vec<u8>, Vec<u8>)>::new();
    info.iterate(b"a/", |key, value| {
        visited.push((key.to_vec(), value.to_vec()));
        Ok(())
    })
    .expect("iterate a/");
    assert_eq!(
        visited,
        vec![
            (b"a/1".to_vec(), b"second".to_vec()),
            (b"a/2".to_vec(), b"second".to_vec()),
        ]
    );

    let mut all = Vec::<Vec<u8>>::new();
    info.iterate(b"", |key, _value| {
        all.push(key.to_vec());
        Ok(())
    })
    .expect("iterate all");
    assert_eq!(all, vec![b"a/1".to_vec(), b"a/2".to_vec(), b"b/1".to_vec()]);
}

#[test]
fn iterate_skips_older_revisions() {
    let (mut store, dir, job) = setup("iterate_old_revisions");

    // Seed a multi-revision log directly; `write` would compact it away.
    {
        let conn = raw_conn(&dir);
        for (key, written, value) in [
            (&b"trace/a"[..], 100i64, &b"stale"[..]),
            (b"trace/a", 200, b"fresh"),
            (b"trace/b", 150, b"only"),
        ] {
            conn.execute(
                "INSERT INTO job_info(job_id, info_key, written, value) VALUES (?1, ?2, ?3, ?4)",
                params![1i64, key, written, value],
            )
            .expect("seed revision");
        }
    }

    let tx = store.transaction().expect("begin tx");
    let info = InfoStorage::new(&job, &tx);

    let mut visited = Vec::<(Vec<u8>, Vec<u8>)>::new();
    info.iterate(b"trace/", |key, value| {
        visited.push((key.to_vec(), value.to_vec()));
        Ok(())
    })
    .expect("iterate trace/");

    assert_eq!(
        visited,
        vec![
            (b"trace/a".to_vec(), b"fresh".to_vec()),
            (b"trace/b".to_vec(), b"only".to_vec()),
        ]
    );
}

#[test]
fn visitor_error_aborts_iteration() {
    let (mut store, _dir, job) = setup("visitor_error");

    let tx = store.transaction().expect("begin tx");
    let info = InfoStorage::new(&job, &tx);
    info.write(b"k/1", b"v1").expect("write k/1");
    info.write(b"k/2", b"v2").expect("write k/2");

    let mut visits = 0usize;
    let err = info
        .iterate(b"k/", |_key, _value| {
            visits += 1;
            Err(StoreError::InvalidInput("visitor gave up"))
        })
        .expect_err("iteration should surface the visitor error");

    assert_eq!(visits, 1);
    match err {
        StoreError::InvalidInput(msg) => assert_eq!(msg, "visitor gave up"),
        other => panic!("expected InvalidInput error, got {other:?}"),
    }
}

#[test]
fn delete_removes_every_revision() {
    let (mut store, dir, job) = setup("delete_revisions");

    {
        let conn = raw_conn(&dir);
        for written in [100i64, 200] {
            conn.execute(
                "INSERT INTO job_info(job_id, info_key, written, value) VALUES (?1, ?2, ?3, ?4)",
                params![1i64, &b"doomed"[..], written, &b"x"[..]],
            )
            .expect("seed revision");
        }
    }

    let tx = store.transaction().expect("begin tx");
    let info = InfoStorage::new(&job, &tx);
    info.delete(b"doomed").expect("delete");
    assert_eq!(info.get(b"doomed").expect("get after delete"), None);

    // Deleting an absent key is not an error.
    info.delete(b"doomed").expect("delete again");
    tx.commit().expect("commit");

    assert_eq!(info_row_count(&dir, 1, b"doomed"), 0);
}

#[test]
fn non_blob_value_is_an_assertion_failure() {
    let (mut store, dir, job) = setup("non_blob_value");

    // SQLite keeps the storage class it was given; a TEXT value in the blob
    // column models corruption or a schema mismatch.
    raw_conn(&dir)
        .execute(
            "INSERT INTO job_info(job_id, info_key, written, value) VALUES (?1, ?2, ?3, ?4)",
            params![1i64, &b"mangled"[..], 100i64, "not-a-blob"],
        )
        .expect("seed mangled row");

    let tx = store.transaction().expect("begin tx");
    let info = InfoStorage::new(&job, &tx);
    let err = info
        .get(b"mangled")
        .expect_err("non-blob value should fail the type assertion");
    match err {
        StoreError::Assertion { column, .. } => assert_eq!(column, "value"),
        other => panic!("expected Assertion error, got {other:?}"),
    }
}

#[test]
fn legacy_adapters_round_trip() {
    let (mut store, _dir, job) = setup("legacy_round_trip");

    let tx = store.transaction().expect("begin tx");
    let info = InfoStorage::new(&job, &tx);
    info.write(b"unrelated", b"noise").expect("write unrelated");
    info.write_legacy_payload(b"payload-bytes")
        .expect("write payload");
    info.write_legacy_progress(b"progress-bytes")
        .expect("write progress");

    assert_eq!(
        info.get_legacy_payload().expect("get payload"),
        Some(b"payload-bytes".to_vec())
    );
    assert_eq!(
        info.get_legacy_progress().expect("get progress"),
        Some(b"progress-bytes".to_vec())
    );
    assert_eq!(
        info.get(b"unrelated").expect("get unrelated"),
        Some(b"noise".to_vec())
    );
}
