//! Record store integration tests
//!
//! Exercises save/load/delete/query end to end through `Database`, using
//! the order/flower schema of the demo client.

use recordlayer_engine::{
    Database, Error, FieldType, KeyExpression, Query, Record, RecordMetaData, RecordQuery,
    RecordStore, Subspace, Tuple, Value,
};
use std::sync::Arc;

fn metadata() -> Arc<RecordMetaData> {
    RecordMetaData::builder()
        .add_message_type(
            "Flower",
            [("type", FieldType::String), ("color", FieldType::String)],
        )
        .add_record_type(
            "Order",
            [
                ("order_id", FieldType::Int),
                ("price", FieldType::Int),
                ("flower", FieldType::Message("Flower".into())),
            ],
        )
        .set_primary_key("Order", KeyExpression::field("order_id"))
        .add_index("Order", "priceIndex", KeyExpression::field("price"))
        .build()
        .unwrap()
}

fn demo_store(db: &Database) -> RecordStore {
    db.open_record_store(
        metadata(),
        Subspace::new(&Tuple::new().with("record-layer-demo")),
    )
}

fn order(id: i64, price: i64, flower: &str, color: &str) -> Record {
    Record::new("Order")
        .with("order_id", id)
        .with("price", price)
        .with(
            "flower",
            Record::new("Flower").with("type", flower).with("color", color),
        )
}

fn seed(db: &Database, store: &RecordStore) {
    db.run(|txn| {
        store.save_record(txn, order(1, 123, "ROSE", "RED"))?;
        store.save_record(txn, order(23, 34, "ROSE", "PINK"))?;
        store.save_record(txn, order(3, 55, "TULIP", "YELLOW"))?;
        Ok(())
    })
    .unwrap();
}

fn ids(records: &[recordlayer_engine::StoredRecord]) -> Vec<i64> {
    records
        .iter()
        .map(|s| match s.primary_key.get(0) {
            Some(recordlayer_engine::TupleElement::Int(id)) => *id,
            other => panic!("unexpected key element {:?}", other),
        })
        .collect()
}

// ============================================================================
// Demo scenario
// ============================================================================

#[test]
fn test_demo_load_hits_and_misses() {
    let db = Database::in_memory();
    let store = demo_store(&db);
    seed(&db, &store);

    let (hit, miss) = db
        .transaction(|txn| {
            let hit = store.load_record(txn, "Order", &Tuple::new().with(1i64))?;
            let miss = store.load_record(txn, "Order", &Tuple::new().with(133i64))?;
            Ok((hit, miss))
        })
        .unwrap();
    assert_eq!(hit.unwrap().record, order(1, 123, "ROSE", "RED"));
    assert!(miss.is_none());
}

#[test]
fn test_demo_price_query_in_index_order() {
    let db = Database::in_memory();
    let store = demo_store(&db);
    seed(&db, &store);

    let query = RecordQuery::new("Order").with_filter(Query::field("price").lt(60));
    assert_eq!(
        store.plan_query(&query).unwrap().to_string(),
        "Index(priceIndex (null, 60))"
    );
    let found = db
        .transaction(|txn| store.execute_query(txn, &query)?.collect_records())
        .unwrap();
    assert_eq!(ids(&found), vec![23, 3]);
}

#[test]
fn test_demo_nested_filter_is_residual() {
    let db = Database::in_memory();
    let store = demo_store(&db);
    seed(&db, &store);

    let query = RecordQuery::new("Order").with_filter(Query::and([
        Query::field("price").lt(50),
        Query::field("flower").matches(Query::field("type").eq("ROSE")),
    ]));
    let plan = store.plan_query(&query).unwrap();
    assert_eq!(plan.index_name(), Some("priceIndex"));
    assert!(plan.residual().is_some());

    let found = db
        .transaction(|txn| store.execute_query(txn, &query)?.collect_records())
        .unwrap();
    assert_eq!(ids(&found), vec![23]);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_update_moves_index_entry() {
    let db = Database::in_memory();
    let store = demo_store(&db);
    seed(&db, &store);

    let previous = db
        .run(|txn| store.save_record(txn, order(1, 5, "ROSE", "WHITE")))
        .unwrap();
    assert_eq!(previous.unwrap().get("price"), Some(&Value::Int(123)));

    let entries = db
        .transaction(|txn| store.scan_index(txn, "priceIndex", ..))
        .unwrap();
    let rendered: Vec<String> = entries.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "priceIndex(5) -> (1)",
            "priceIndex(34) -> (23)",
            "priceIndex(55) -> (3)",
        ]
    );
}

#[test]
fn test_delete_twice_is_quiet() {
    let db = Database::in_memory();
    let store = demo_store(&db);
    seed(&db, &store);

    let pk = Tuple::new().with(23i64);
    assert!(db.run(|txn| store.delete_record(txn, "Order", &pk)).unwrap());
    assert!(!db.run(|txn| store.delete_record(txn, "Order", &pk)).unwrap());
    assert!(!db
        .run(|txn| store.delete_record(txn, "Order", &Tuple::new().with(999i64)))
        .unwrap());

    let entries = db
        .transaction(|txn| store.scan_index(txn, "priceIndex", ..))
        .unwrap();
    assert!(entries.iter().all(|e| e.primary_key != pk));
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_failed_unit_of_work_leaves_no_trace() {
    let db = Database::in_memory();
    let store = demo_store(&db);
    seed(&db, &store);
    let before = db.current_version();

    let err = db
        .run(|txn| {
            store.save_record(txn, order(50, 1, "ROSE", "RED"))?;
            store.save_record(txn, Record::new("Order").with("order_id", 51).with("price", "x"))
        })
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(db.current_version(), before);
    assert!(db
        .transaction(|txn| store.load_record(txn, "Order", &Tuple::new().with(50i64)))
        .unwrap()
        .is_none());
}

#[test]
fn test_unknown_record_type_is_schema_error() {
    let db = Database::in_memory();
    let store = demo_store(&db);
    let err = db
        .transaction(|txn| store.save_record(txn, Record::new("Invoice").with("id", 1)))
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));

    let err = db
        .transaction(|txn| store.scan_records(txn, "Invoice").map(|_| ()))
        .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

// ============================================================================
// Richer schemas
// ============================================================================

#[test]
fn test_composite_keys_and_multi_column_index() {
    let md = RecordMetaData::builder()
        .add_record_type(
            "Line",
            [
                ("order_id", FieldType::Int),
                ("line", FieldType::Uint),
                ("sku", FieldType::String),
                ("weight", FieldType::Double),
            ],
        )
        .set_primary_key(
            "Line",
            KeyExpression::concat([KeyExpression::field("order_id"), KeyExpression::field("line")]),
        )
        .add_index(
            "Line",
            "skuWeight",
            KeyExpression::concat([KeyExpression::field("sku"), KeyExpression::field("weight")]),
        )
        .build()
        .unwrap();
    let db = Database::in_memory();
    let store = db.open_record_store(md, Subspace::new(&Tuple::new().with("lines")));

    let line = |order: i64, n: u64, sku: &str, weight: f64| {
        Record::new("Line")
            .with("order_id", order)
            .with("line", n)
            .with("sku", sku)
            .with("weight", weight)
    };
    db.run(|txn| {
        store.save_record(txn, line(1, 1, "A", 2.5))?;
        store.save_record(txn, line(1, 2, "B", 0.5))?;
        store.save_record(txn, line(2, 1, "A", -1.0))?;
        // Integer literal for a double field is coerced on save.
        store.save_record(
            txn,
            Record::new("Line")
                .with("order_id", 2)
                .with("line", 2u64)
                .with("sku", "A")
                .with("weight", 7),
        )?;
        Ok(())
    })
    .unwrap();

    let query = RecordQuery::new("Line").with_filter(Query::and([
        Query::field("sku").eq("A"),
        Query::field("weight").ge(0),
    ]));
    assert_eq!(
        store.plan_query(&query).unwrap().to_string(),
        "Index(skuWeight [= \"A\"] [0.0, +inf))"
    );
    let weights: Vec<Value> = db
        .transaction(|txn| store.execute_query(txn, &query)?.collect_records())
        .unwrap()
        .into_iter()
        .filter_map(|s| s.record.get("weight").cloned())
        .collect();
    assert_eq!(weights, vec![Value::Double(2.5), Value::Double(7.0)]);

    let first_order = db
        .transaction(|txn| {
            store
                .execute_query(
                    txn,
                    &RecordQuery::new("Line").with_filter(Query::field("order_id").eq(1)),
                )?
                .collect_records()
        })
        .unwrap();
    assert_eq!(first_order.len(), 2);
    assert_eq!(
        first_order[1].primary_key,
        Tuple::new().with(1i64).with(2u64)
    );
}

#[test]
fn test_limit_and_batches_across_many_records() {
    let db = Database::builder().scan_batch_size(4).open().unwrap();
    let store = demo_store(&db);
    db.run(|txn| {
        for id in 0..40i64 {
            store.save_record(txn, order(id, 100 - id, "ROSE", "RED"))?;
        }
        Ok(())
    })
    .unwrap();

    let all = db
        .transaction(|txn| store.scan_records(txn, "Order")?.collect_records())
        .unwrap();
    assert_eq!(all.len(), 40);
    assert_eq!(ids(&all), (0..40).collect::<Vec<_>>());

    let query = RecordQuery::new("Order")
        .with_filter(Query::field("price").ge(70))
        .with_limit(5);
    let cheapest_over_70 = db
        .transaction(|txn| store.execute_query(txn, &query)?.collect_records())
        .unwrap();
    assert_eq!(ids(&cheapest_over_70), vec![30, 29, 28, 27, 26]);
}

#[test]
fn test_string_index_ranges_with_embedded_nul() {
    let metadata = RecordMetaData::builder()
        .add_record_type(
            "Person",
            [("id", FieldType::Int), ("name", FieldType::String)],
        )
        .set_primary_key("Person", KeyExpression::field("id"))
        .add_index("Person", "nameIndex", KeyExpression::field("name"))
        .build()
        .unwrap();
    let db = Database::in_memory();
    let store = db.open_record_store(metadata, Subspace::new(&Tuple::new().with("people")));
    db.run(|txn| {
        for (id, name) in [(1i64, "ab"), (2, "ab\0"), (3, "ab\0z"), (4, "ac"), (5, "aa")] {
            store.save_record(txn, Record::new("Person").with("id", id).with("name", name))?;
        }
        Ok(())
    })
    .unwrap();

    for (filter, expected) in [
        (Query::field("name").gt("ab"), vec![2i64, 3, 4]),
        (Query::field("name").ge("ab\0"), vec![2, 3, 4]),
        (Query::field("name").le("ab"), vec![5, 1]),
        (Query::field("name").lt("ab\0"), vec![5, 1]),
        (Query::field("name").eq("ab\0"), vec![2]),
    ] {
        let query = RecordQuery::new("Person").with_filter(filter.clone());
        assert_eq!(store.plan_query(&query).unwrap().index_name(), Some("nameIndex"));
        let (indexed, scanned) = db
            .transaction(|txn| {
                let indexed = store.execute_query(txn, &query)?.collect_records()?;
                let scanned: Vec<_> = store
                    .scan_records(txn, "Person")?
                    .collect_records()?
                    .into_iter()
                    .filter(|s| filter.eval(&s.record))
                    .collect();
                Ok((indexed, scanned))
            })
            .unwrap();
        assert_eq!(ids(&indexed), expected, "{}", filter);
        let mut sorted = ids(&indexed);
        sorted.sort_unstable();
        assert_eq!(sorted, ids(&scanned), "{}", filter);
    }
}
