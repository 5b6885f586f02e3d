//! Transaction lifecycle: finalization, change tracking, deferred work,
//! configuration

use super::*;
use memdb::WriteState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_finalized_transactions_reject_operations() {
    let db = create_db();

    let mut txn = db.write().unwrap();
    txn.insert("nodes", node("n1", "dc1", "ready")).unwrap();
    assert_eq!(txn.commit().unwrap(), 1);
    assert_eq!(txn.state(), WriteState::Committed);
    for err in [
        txn.commit().unwrap_err(),
        txn.abort().unwrap_err(),
        txn.insert("nodes", node("n2", "dc1", "ready")).unwrap_err(),
        txn.count("nodes").unwrap_err(),
    ] {
        assert!(matches!(err, Error::TransactionAlreadyFinalized { .. }));
    }

    let mut txn = db.write().unwrap();
    txn.abort().unwrap();
    assert_eq!(txn.state(), WriteState::Aborted);
    assert!(txn.first("nodes", "name", &["n1".into()]).is_err());

    let mut read = db.read();
    read.close();
    read.close();
    assert!(!read.is_open());
    assert!(matches!(
        read.count("nodes").unwrap_err(),
        Error::TransactionAlreadyFinalized { state: "closed" }
    ));
}

#[test]
fn test_dropped_write_aborts() {
    let db = create_db();
    {
        let mut txn = db.write().unwrap();
        txn.insert("nodes", node("n1", "dc1", "ready")).unwrap();
    }
    assert_eq!(db.read().count("nodes").unwrap(), 0);
    assert!(db.write_with_timeout(Some(Duration::from_millis(20))).is_ok());
}

#[test]
fn test_commit_without_writes_keeps_version() {
    let db = create_db();
    db.update(|txn| txn.insert("nodes", node("n1", "dc1", "ready")))
        .unwrap();
    let table = db.read().table_watch("nodes").unwrap();

    let mut txn = db.write().unwrap();
    assert_eq!(txn.commit().unwrap(), 1);
    assert_eq!(db.version(), 1);
    assert!(!table.is_fired());
}

#[test]
fn test_change_tracking() {
    let db = create_tracking_db();
    let keep = node("keep", "dc1", "ready");
    let gone = node("gone", "dc1", "ready");
    db.update(|txn| {
        txn.insert("nodes", keep.clone())?;
        txn.insert("nodes", gone.clone())
    })
    .unwrap();

    let mut moved = keep.node().clone();
    moved.status = "down".into();
    let mut txn = db.write().unwrap();
    txn.insert("nodes", Obj::Node(moved.clone())).unwrap();
    txn.delete("nodes", &gone).unwrap();
    txn.insert("nodes", node("fresh", "dc2", "ready")).unwrap();
    // Created and removed within the transaction: no net change.
    let temp = node("temp", "dc2", "ready");
    txn.insert("nodes", temp.clone()).unwrap();
    txn.delete("nodes", &temp).unwrap();
    txn.commit().unwrap();

    let changes = txn.changes();
    assert_eq!(changes.len(), 3);

    assert!(changes[0].updated());
    assert_eq!(changes[0].table, "nodes");
    assert_eq!(changes[0].before.as_deref(), Some(&keep));
    assert_eq!(changes[0].after.as_deref(), Some(&Obj::Node(moved)));

    assert!(changes[1].deleted());
    assert_eq!(changes[1].before.as_deref(), Some(&gone));

    assert!(changes[2].created());
    assert_eq!(changes[2].after.as_ref().unwrap().node().name, "fresh");
}

#[test]
fn test_change_tracking_off_by_default() {
    let db = create_db();
    let mut txn = db.write().unwrap();
    txn.insert("nodes", node("n1", "dc1", "ready")).unwrap();
    assert!(txn.changes().is_empty());

    txn.track_changes().unwrap();
    txn.insert("nodes", node("n2", "dc1", "ready")).unwrap();
    txn.commit().unwrap();
    let changes = txn.changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].after.as_ref().unwrap().node().name, "n2");
}

#[test]
fn test_deferred_run_after_commit_in_reverse() {
    let db = create_db();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut txn = db.write().unwrap();
    for i in 0..3 {
        let log = Arc::clone(&log);
        let db = db.clone();
        txn.defer(move || {
            // The commit is already visible.
            let seen = db.read().count("nodes").unwrap();
            log.lock().push((i, seen));
        })
        .unwrap();
    }
    txn.insert("nodes", node("n1", "dc1", "ready")).unwrap();
    assert!(log.lock().is_empty());
    txn.commit().unwrap();

    assert_eq!(*log.lock(), vec![(2, 1), (1, 1), (0, 1)]);
}

#[test]
fn test_deferred_dropped_on_abort() {
    let db = create_db();
    let log = Arc::new(Mutex::new(Vec::<u32>::new()));

    let mut txn = db.write().unwrap();
    let hook = Arc::clone(&log);
    txn.defer(move || hook.lock().push(1)).unwrap();
    txn.abort().unwrap();
    assert!(txn.defer(|| {}).is_err());

    assert!(log.lock().is_empty());
}

#[test]
fn test_config_file_drives_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("memdb.toml");
    std::fs::write(
        &path,
        "write_timeout_ms = 20\nwatch_limit = 4\ntrack_changes = true\n",
    )
    .unwrap();
    let config = MemDbConfig::from_file(&path).unwrap();

    let db = MemDb::builder()
        .table(nodes_table())
        .table(allocs_table())
        .config(config)
        .build()
        .unwrap();
    assert_eq!(db.read().watch_limit(), 4);

    let mut txn = db.write().unwrap();
    txn.insert("nodes", node("n1", "dc1", "ready")).unwrap();
    assert_eq!(txn.changes().len(), 1);

    let err = db.write().unwrap_err();
    assert!(matches!(err, Error::WriteAcquisitionTimeout(d) if d == Duration::from_millis(20)));
}
