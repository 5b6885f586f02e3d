//! Change notification through watch channels and watch sets

use super::*;
use memdb::WatchCh;
use std::thread;
use std::time::{Duration, Instant};

const SHORT: Duration = Duration::from_millis(30);
const LONG: Duration = Duration::from_secs(10);

#[test]
fn test_watch_wakes_blocked_reader() {
    let db = create_db();
    let (ch, found) = db
        .read()
        .first_watch("nodes", "name", &["web".into()])
        .unwrap();
    assert!(found.is_none());

    let waiter = thread::spawn(move || {
        let mut ws = WatchSet::new();
        ws.add(ch);
        let started = Instant::now();
        (ws.watch(Some(LONG)), started.elapsed())
    });

    thread::sleep(SHORT);
    db.update(|txn| txn.insert("nodes", node("web", "dc1", "ready")))
        .unwrap();

    let (outcome, waited) = waiter.join().unwrap();
    assert_eq!(outcome, WatchOutcome::Fired);
    assert!(waited < LONG);
    assert!(db.read().first("nodes", "name", &["web".into()]).unwrap().is_some());
}

#[test]
fn test_unrelated_commit_does_not_fire() {
    let db = create_db();
    db.update(|txn| {
        txn.insert("nodes", node("web", "dc1", "ready"))?;
        txn.insert("nodes", node("api", "dc2", "ready"))
    })
    .unwrap();

    let (ch, _) = db.read().first_watch("nodes", "name", &["web".into()]).unwrap();
    let (dc_ch, _) = db.read().get_watch("nodes", "datacenter", &["dc1".into()]).unwrap();

    // A new node elsewhere in both indexes.
    db.update(|txn| txn.insert("nodes", node("db", "dc3", "ready")))
        .unwrap();
    assert!(!ch.is_fired());
    assert!(!dc_ch.is_fired());

    let mut ws = WatchSet::new();
    ws.add(ch.clone());
    ws.add(dc_ch);
    assert_eq!(ws.watch(Some(SHORT)), WatchOutcome::TimedOut);

    db.update(|txn| txn.delete_all("nodes", "name", &["web".into()]))
        .unwrap();
    assert!(ch.is_fired());
    assert_eq!(ws.watch(Some(SHORT)), WatchOutcome::Fired);
}

#[test]
fn test_commit_between_read_and_wait_is_not_missed() {
    let db = create_db();
    let (ch, _) = db.read().get_watch("nodes", "datacenter", &["dc1".into()]).unwrap();

    db.update(|txn| txn.insert("nodes", node("n1", "dc1", "ready")))
        .unwrap();

    let mut ws = WatchSet::new();
    ws.add(ch);
    assert_eq!(ws.watch(Some(SHORT)), WatchOutcome::Fired);
}

#[test]
fn test_aborted_write_fires_nothing() {
    let db = create_db();
    let table = db.read().table_watch("nodes").unwrap();

    let mut txn = db.write().unwrap();
    txn.insert("nodes", node("n1", "dc1", "ready")).unwrap();
    txn.abort().unwrap();

    assert!(!table.is_fired());
}

#[test]
fn test_prefix_watch() {
    let db = create_db();
    db.update(|txn| {
        txn.insert("nodes", node("api-1", "dc1", "ready"))?;
        txn.insert("nodes", node("api-2", "dc1", "ready"))?;
        txn.insert("nodes", node("web-1", "dc1", "ready"))
    })
    .unwrap();

    let (ch, iter) = db.read().prefix_watch("nodes", "name", &["api".into()]).unwrap();
    assert_eq!(iter.count(), 2);

    // Keys outside the prefix leave its subtree untouched.
    db.update(|txn| txn.insert("nodes", node("web-2", "dc1", "ready")))
        .unwrap();
    assert!(!ch.is_fired());

    db.update(|txn| txn.insert("nodes", node("api-3", "dc1", "ready")))
        .unwrap();
    assert!(ch.is_fired());
}

#[test]
fn test_table_watch_fires_on_any_change() {
    let db = create_db();
    let nodes = db.read().table_watch("nodes").unwrap();
    let allocs = db.read().table_watch("allocs").unwrap();

    db.update(|txn| txn.insert("nodes", node("n1", "dc1", "ready")))
        .unwrap();
    assert!(nodes.is_fired());
    assert!(!allocs.is_fired());
}

#[test]
fn test_watch_limit_falls_back_to_table_channel() {
    let db = MemDb::builder()
        .table(nodes_table())
        .table(allocs_table())
        .watch_limit(2)
        .build()
        .unwrap();
    db.update(|txn| {
        for i in 0..4 {
            txn.insert("nodes", node(&format!("n{}", i), "dc1", "ready"))?;
        }
        Ok(())
    })
    .unwrap();

    let read = db.read();
    let mut ws = WatchSet::new();
    for i in 0..4 {
        let (ch, _) = read
            .first_watch("nodes", "name", &[format!("n{}", i).into()])
            .unwrap();
        read.add_watch(&mut ws, "nodes", ch).unwrap();
    }
    // Two precise channels plus the shared table channel.
    assert_eq!(ws.len(), 3);

    // n3 was only covered by the table channel, which still catches it.
    db.update(|txn| txn.delete_all("nodes", "name", &["n3".into()]))
        .unwrap();
    assert_eq!(ws.watch(Some(SHORT)), WatchOutcome::Fired);
}

#[test]
fn test_cancel_ends_watch() {
    let db = create_db();
    let ch: WatchCh = db.read().table_watch("nodes").unwrap();
    let token = CancelToken::new();

    let waiter = {
        let token = token.clone();
        thread::spawn(move || {
            let mut ws = WatchSet::new();
            ws.add(ch);
            ws.watch_with_cancel(&token, Some(LONG))
        })
    };
    thread::sleep(SHORT);
    token.cancel();
    assert_eq!(waiter.join().unwrap(), WatchOutcome::Cancelled);
}

#[test]
fn test_many_watchers_one_commit() {
    let db = create_db();
    let (ch, _) = db.read().get_watch("nodes", "datacenter", &["dc9".into()]).unwrap();
    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let ch = ch.clone();
            thread::spawn(move || ch.wait(Some(LONG)))
        })
        .collect();

    thread::sleep(SHORT);
    db.update(|txn| txn.insert("nodes", node("n", "dc9", "ready")))
        .unwrap();
    for w in waiters {
        assert!(w.join().unwrap());
    }
}

#[test]
fn test_empty_watch_set_returns_immediately() {
    let ws = WatchSet::new();
    assert_eq!(ws.watch(Some(LONG)), WatchOutcome::Fired);
}
