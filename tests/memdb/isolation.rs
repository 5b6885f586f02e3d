//! Snapshot isolation and the single-writer rule

use super::*;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_read_txn_pinned_to_its_version() {
    let db = create_db();
    db.update(|txn| txn.insert("nodes", node("n1", "dc1", "ready")))
        .unwrap();

    let old = db.read();
    db.update(|txn| {
        txn.insert("nodes", node("n2", "dc1", "ready"))?;
        txn.delete_all("nodes", "name", &["n1".into()])
    })
    .unwrap();

    assert_eq!(old.version(), 1);
    assert_eq!(names(old.all("nodes", "name").unwrap()), vec!["n1"]);
    assert_eq!(names(db.read().all("nodes", "name").unwrap()), vec!["n2"]);
}

#[test]
fn test_iterator_survives_later_commits() {
    let db = create_db();
    db.update(|txn| {
        for i in 0..10 {
            txn.insert("nodes", node(&format!("n{:02}", i), "dc1", "ready"))?;
        }
        Ok(())
    })
    .unwrap();

    let mut iter = db.read().all("nodes", "name").unwrap();
    let first = iter.next().unwrap();
    db.update(|txn| txn.delete_prefix("nodes", "name", &["n".into()]))
        .unwrap();
    assert_eq!(first.node().name, "n00");
    assert_eq!(iter.count(), 9);
    assert_eq!(db.read().count("nodes").unwrap(), 0);
}

#[test]
fn test_uncommitted_writes_invisible() {
    let db = create_db();
    let mut txn = db.write().unwrap();
    txn.insert("nodes", node("n1", "dc1", "ready")).unwrap();

    // Reads inside the transaction see the staged object.
    assert_eq!(txn.count("nodes").unwrap(), 1);
    assert_eq!(txn.snapshot().unwrap().count("nodes").unwrap(), 1);
    // Readers outside do not, and do not block.
    assert_eq!(db.read().count("nodes").unwrap(), 0);

    txn.abort().unwrap();
    assert_eq!(db.read().count("nodes").unwrap(), 0);
    assert_eq!(db.version(), 0);
}

#[test]
fn test_unique_violation_leaves_store_unchanged() {
    let db = create_db();
    db.update(|txn| txn.insert("nodes", node("web", "dc1", "ready")))
        .unwrap();

    let err = db
        .update(|txn| {
            txn.insert("nodes", node("api", "dc1", "ready"))?;
            // Different id, same name in a different case.
            txn.insert("nodes", node("WEB", "dc2", "ready"))
        })
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateUniqueKey { ref table, ref index } if table == "nodes" && index == "name"
    ));
    assert!(err.is_retryable());

    let read = db.read();
    assert_eq!(db.version(), 1);
    assert_eq!(names(read.all("nodes", "name").unwrap()), vec!["web"]);
    assert_eq!(read.get("nodes", "datacenter", &["dc2".into()]).unwrap().count(), 0);
}

#[test]
fn test_one_writer_at_a_time() {
    let db = create_db();
    let held = db.write().unwrap();

    let contender = {
        let db = db.clone();
        thread::spawn(move || {
            db.write_with_timeout(Some(Duration::from_millis(30)))
                .map(|_| ())
        })
    };
    let err = contender.join().unwrap().unwrap_err();
    assert!(matches!(err, Error::WriteAcquisitionTimeout(_)));

    drop(held);
    assert!(db.write_with_timeout(Some(Duration::from_millis(30))).is_ok());
}

#[test]
fn test_writer_waits_for_release() {
    let db = create_db();
    let barrier = Arc::new(Barrier::new(2));

    let first = {
        let db = db.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut txn = db.write().unwrap();
            barrier.wait();
            thread::sleep(Duration::from_millis(30));
            txn.insert("nodes", node("first", "dc1", "ready")).unwrap();
            txn.commit().unwrap()
        })
    };

    barrier.wait();
    let version = db
        .update(|txn| {
            // The first writer committed before this one got the lock.
            assert_eq!(txn.count("nodes")?, 1);
            txn.insert("nodes", node("second", "dc1", "ready"))
        })
        .map(|_| db.version())
        .unwrap();

    assert_eq!(first.join().unwrap(), 1);
    assert_eq!(version, 2);
}

#[test]
fn test_readers_never_see_partial_commits() {
    let db = create_db();
    let barrier = Arc::new(Barrier::new(4));

    let writer = {
        let db = db.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for round in 0..100 {
                db.update(|txn| {
                    // Each commit moves every node to the next datacenter.
                    txn.delete_all("nodes", "datacenter", &[format!("dc{}", round).into()])?;
                    for i in 0..5 {
                        txn.insert(
                            "nodes",
                            node(&format!("r{}-{}", round, i), &format!("dc{}", round + 1), "ready"),
                        )?;
                    }
                    Ok(())
                })
                .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let db = db.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..300 {
                    let read = db.read();
                    let version = read.version();
                    let total = read.count("nodes").unwrap();
                    if version == 0 {
                        assert_eq!(total, 0);
                        continue;
                    }
                    let dc = format!("dc{}", version);
                    assert_eq!(total, 5);
                    assert_eq!(read.get("nodes", "datacenter", &[dc.into()]).unwrap().count(), 5);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(db.version(), 100);
}

#[test]
fn test_forked_store_is_independent() {
    let db = create_db();
    db.update(|txn| txn.insert("nodes", node("shared", "dc1", "ready")))
        .unwrap();
    let fork = db.snapshot();

    fork.update(|txn| txn.insert("nodes", node("fork-only", "dc1", "ready")))
        .unwrap();
    db.update(|txn| txn.insert("nodes", node("main-only", "dc1", "ready")))
        .unwrap();

    assert_eq!(
        names(db.read().all("nodes", "name").unwrap()),
        vec!["main-only", "shared"]
    );
    assert_eq!(
        names(fork.read().all("nodes", "name").unwrap()),
        vec!["fork-only", "shared"]
    );

    // Writers of the two stores do not contend.
    let _a = db.write().unwrap();
    assert!(fork.write_with_timeout(Some(Duration::from_millis(20))).is_ok());
}
