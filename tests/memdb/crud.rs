//! Index maintenance through insert, update and delete

use super::*;
use std::sync::Arc;

#[test]
fn test_insert_then_lookup_every_index() {
    let db = create_db();
    let web = node("web-1", "dc1", "ready");
    let id = web.node().id.clone();
    db.update(|txn| txn.insert("nodes", web.clone())).unwrap();

    let read = db.read();
    let by_id = read.first("nodes", "id", &[id.as_str().into()]).unwrap();
    assert_eq!(by_id.as_deref(), Some(&web));

    // Unique string index lowercases both sides.
    let by_name = read.first("nodes", "name", &["WEB-1".into()]).unwrap();
    assert_eq!(by_name.as_deref(), Some(&web));

    let by_dc = read.get("nodes", "datacenter", &["dc1".into()]).unwrap();
    assert_eq!(names(by_dc), vec!["web-1"]);

    let by_pair = read
        .first("nodes", "dc_status", &["dc1".into(), "ready".into()])
        .unwrap();
    assert_eq!(by_pair.as_deref(), Some(&web));

    let by_drain = read.get("nodes", "drain", &[false.into()]).unwrap();
    assert_eq!(by_drain.count(), 1);
}

#[test]
fn test_uuid_index_accepts_text_and_bytes() {
    let db = create_db();
    let uuid = Uuid::new_v4();
    let mut n = node("n1", "dc1", "ready");
    if let Obj::Node(inner) = &mut n {
        inner.id = uuid.to_string();
    }
    db.update(|txn| txn.insert("nodes", n.clone())).unwrap();

    let read = db.read();
    let by_bytes = read.first("nodes", "id", &[uuid.into()]).unwrap();
    let by_text = read
        .first("nodes", "id", &[uuid.to_string().into()])
        .unwrap();
    assert_eq!(by_bytes, by_text);
    assert!(by_bytes.is_some());

    let err = read.first("nodes", "id", &["not-a-uuid".into()]).unwrap_err();
    assert!(matches!(err, Error::MalformedUuid(_)));
}

#[test]
fn test_update_moves_secondary_entries() {
    let db = create_db();
    let original = node("web-1", "dc1", "ready");
    db.update(|txn| txn.insert("nodes", original.clone())).unwrap();

    let mut moved = original.node().clone();
    moved.datacenter = "dc2".to_string();
    moved.status = "down".to_string();
    db.update(|txn| txn.insert("nodes", Obj::Node(moved.clone())))
        .unwrap();

    let read = db.read();
    assert_eq!(read.count("nodes").unwrap(), 1);
    assert_eq!(read.get("nodes", "datacenter", &["dc1".into()]).unwrap().count(), 0);
    assert_eq!(names(read.get("nodes", "datacenter", &["dc2".into()]).unwrap()), vec!["web-1"]);
    assert!(read
        .first("nodes", "dc_status", &["dc1".into(), "ready".into()])
        .unwrap()
        .is_none());
    let found = read
        .first("nodes", "dc_status", &["dc2".into(), "down".into()])
        .unwrap();
    assert_eq!(found.as_deref(), Some(&Obj::Node(moved)));
}

#[test]
fn test_non_unique_index_returns_all_in_pk_order() {
    let db = create_db();
    db.update(|txn| {
        for i in 0..5 {
            txn.insert("nodes", node(&format!("n{}", i), "dc1", "ready"))?;
        }
        txn.insert("nodes", node("other", "dc2", "ready"))
    })
    .unwrap();

    let read = db.read();
    let found: Vec<Arc<Obj>> = read
        .get("nodes", "datacenter", &["dc1".into()])
        .unwrap()
        .collect();
    assert_eq!(found.len(), 5);

    let ids: Vec<Vec<u8>> = found
        .iter()
        .map(|o| Uuid::parse_str(&o.node().id).unwrap().as_bytes().to_vec())
        .collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let last = read.last("nodes", "datacenter", &["dc1".into()]).unwrap();
    assert_eq!(last.as_ref(), found.last());
}

#[test]
fn test_prefix_and_compound_prefix() {
    let db = create_db();
    db.update(|txn| {
        txn.insert("nodes", node("api-1", "us-east", "ready"))?;
        txn.insert("nodes", node("api-2", "us-east", "down"))?;
        txn.insert("nodes", node("api-3", "us-west", "ready"))?;
        txn.insert("nodes", node("web-1", "eu-west", "ready"))
    })
    .unwrap();

    let read = db.read();
    assert_eq!(
        names(read.prefix("nodes", "name", &["api".into()]).unwrap()),
        vec!["api-1", "api-2", "api-3"]
    );
    assert_eq!(read.prefix("nodes", "datacenter", &["us-".into()]).unwrap().count(), 3);
    assert_eq!(read.prefix("nodes", "dc_status", &["us-east".into()]).unwrap().count(), 2);
    assert_eq!(
        names(
            read.prefix("nodes", "dc_status", &["us-east".into(), "rea".into()])
                .unwrap()
        ),
        vec!["api-1"]
    );

    let err = read
        .prefix("nodes", "dc_status", &["a".into(), "b".into(), "c".into()])
        .unwrap_err();
    assert!(matches!(err, Error::ArgCountMismatch { .. }));
}

#[test]
fn test_lower_bound_is_ordered() {
    let db = create_db();
    let node_id = Uuid::new_v4().to_string();
    db.update(|txn| {
        for (id, index) in [("a1", 30u64), ("a2", 10), ("a3", 20), ("a4", 40)] {
            txn.insert("allocs", alloc(id, &node_id, "job", index))?;
        }
        Ok(())
    })
    .unwrap();

    let read = db.read();
    let from_15: Vec<u64> = read
        .lower_bound("allocs", "index", &[15u64.into()])
        .unwrap()
        .map(|o| o.alloc().index)
        .collect();
    assert_eq!(from_15, vec![20, 30, 40]);

    let ids: Vec<String> = read
        .lower_bound("allocs", "id", &["a2".into()])
        .unwrap()
        .map(|o| o.alloc().id.clone())
        .collect();
    assert_eq!(ids, vec!["a2", "a3", "a4"]);

    assert_eq!(read.lower_bound("allocs", "index", &[41u64.into()]).unwrap().count(), 0);
}

#[test]
fn test_all_orders_by_index() {
    let db = create_db();
    db.update(|txn| {
        txn.insert("nodes", node("charlie", "dc1", "ready"))?;
        txn.insert("nodes", node("alpha", "dc1", "ready"))?;
        txn.insert("nodes", node("bravo", "dc1", "ready"))
    })
    .unwrap();
    let read = db.read();
    assert_eq!(
        names(read.all("nodes", "name").unwrap()),
        vec!["alpha", "bravo", "charlie"]
    );
    assert_eq!(read.all("nodes", "id").unwrap().count(), 3);
}

#[test]
fn test_multi_valued_tags() {
    let db = create_db();
    let mut gpu = node("gpu-1", "dc1", "ready");
    if let Obj::Node(n) = &mut gpu {
        n.tags = vec!["gpu".into(), "ssd".into()];
    }
    db.update(|txn| {
        txn.insert("nodes", gpu.clone())?;
        // No tags at all is allowed.
        txn.insert("nodes", node("plain", "dc1", "ready"))
    })
    .unwrap();

    let read = db.read();
    assert_eq!(names(read.get("nodes", "tags", &["gpu".into()]).unwrap()), vec!["gpu-1"]);
    assert_eq!(names(read.get("nodes", "tags", &["ssd".into()]).unwrap()), vec!["gpu-1"]);
    assert_eq!(read.get("nodes", "tags", &["hdd".into()]).unwrap().count(), 0);

    // Every tag is its own entry, so a scan yields the object once per tag.
    assert_eq!(read.prefix("nodes", "tags", &["".into()]).unwrap().count(), 2);
}

#[test]
fn test_delete_removes_every_entry() {
    let db = create_db();
    let web = node("web-1", "dc1", "ready");
    db.update(|txn| txn.insert("nodes", web.clone())).unwrap();
    db.update(|txn| txn.delete("nodes", &web)).unwrap();

    let read = db.read();
    assert_eq!(read.count("nodes").unwrap(), 0);
    for index in ["id", "name", "datacenter", "dc_status", "drain", "tags"] {
        assert_eq!(read.all("nodes", index).unwrap().count(), 0, "index {}", index);
    }

    let err = db.update(|txn| txn.delete("nodes", &web)).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_delete_all_and_delete_prefix() {
    let db = create_db();
    let node_a = Uuid::new_v4().to_string();
    let node_b = Uuid::new_v4().to_string();
    db.update(|txn| {
        txn.insert("allocs", alloc("web-1", &node_a, "web", 1))?;
        txn.insert("allocs", alloc("web-2", &node_b, "web", 2))?;
        txn.insert("allocs", alloc("api-1", &node_a, "api", 3))?;
        txn.insert("allocs", alloc("batch-1", &node_b, "batch", 4))
    })
    .unwrap();

    let removed = db
        .update(|txn| txn.delete_all("allocs", "node", &[node_a.as_str().into()]))
        .unwrap();
    assert_eq!(removed, 2);

    let removed = db
        .update(|txn| txn.delete_prefix("allocs", "id", &["web".into()]))
        .unwrap();
    assert_eq!(removed, 1);

    let read = db.read();
    let left: Vec<String> = read
        .all("allocs", "id")
        .unwrap()
        .map(|o| o.alloc().id.clone())
        .collect();
    assert_eq!(left, vec!["batch-1"]);
    assert_eq!(read.get("allocs", "job", &["web".into()]).unwrap().count(), 0);
}

#[test]
fn test_tables_are_separate() {
    let db = create_db();
    let n = node("n1", "dc1", "ready");
    let node_id = n.node().id.clone();
    db.update(|txn| {
        txn.insert("nodes", n)?;
        txn.insert("allocs", alloc("a1", &node_id, "web", 1))
    })
    .unwrap();

    let read = db.read();
    assert_eq!(read.count("nodes").unwrap(), 1);
    assert_eq!(read.count("allocs").unwrap(), 1);
    let on_node = read
        .first("allocs", "node", &[node_id.as_str().into()])
        .unwrap()
        .unwrap();
    assert_eq!(on_node.alloc().id, "a1");
}

#[test]
fn test_lookup_errors() {
    let db = create_db();
    let read = db.read();
    assert!(matches!(
        read.get("jobs", "id", &["x".into()]).unwrap_err(),
        Error::UnknownTable(_)
    ));
    assert!(matches!(
        read.get("nodes", "region", &["x".into()]).unwrap_err(),
        Error::UnknownIndex { .. }
    ));
    assert!(matches!(
        read.get("nodes", "name", &[]).unwrap_err(),
        Error::ArgCountMismatch { expected: 1, actual: 0 }
    ));
    assert!(matches!(
        read.get("nodes", "name", &[42u64.into()]).unwrap_err(),
        Error::ArgTypeMismatch { .. }
    ));
}

#[test]
fn test_missing_required_value_rejected() {
    let db = create_db();
    let nameless = node("", "dc1", "ready");
    let err = db.update(|txn| txn.insert("nodes", nameless)).unwrap_err();
    assert!(matches!(err, Error::MissingIndexValue { ref index, .. } if index == "name"));
    assert_eq!(db.read().count("nodes").unwrap(), 0);
}

#[test]
fn test_nul_in_value_cannot_widen_exact_lookup() {
    let db = create_db();
    db.update(|txn| txn.insert("nodes", node("a", "n", "ready"))).unwrap();

    let err = db
        .update(|txn| txn.insert("nodes", node("b", "n\0x", "ready")))
        .unwrap_err();
    assert!(matches!(err, Error::NulInText { ref field } if field == "Datacenter"));

    let read = db.read();
    assert_eq!(names(read.get("nodes", "datacenter", &["n".into()]).unwrap()), vec!["a"]);
    assert_eq!(read.count("nodes").unwrap(), 1);
}

#[test]
fn test_schema_from_config() {
    let schema: SchemaConfig = toml::from_str(
        r#"
        [[tables]]
        name = "nodes"

        [[tables.indexes]]
        name = "id"
        unique = true
        indexer = { type = "uuid", field = "ID" }

        [[tables.indexes]]
        name = "name"
        unique = true
        indexer = { type = "string", field = "Name", lowercase = true }
        "#,
    )
    .unwrap();
    let db: MemDb<Obj> = MemDb::builder().schema_config(schema).build().unwrap();
    db.update(|txn| txn.insert("nodes", node("Web", "dc1", "ready")))
        .unwrap();
    assert!(db.read().first("nodes", "name", &["web".into()]).unwrap().is_some());
}
