//! Property tests: index consistency and access-path independence
//!
//! Random save/delete sequences are committed over several transactions.
//! After every commit each index must hold exactly the entries its records
//! produce, and every conjunctive filter must return the same records
//! whether it runs through an index or is evaluated against a full scan.
//! String ranges are checked separately over names that embed NUL.

use std::collections::BTreeSet;

use proptest::prelude::*;
use recordlayer_engine::{
    Database, FieldType, KeyExpression, Query, QueryComponent, Record, RecordMetaData,
    RecordQuery, RecordStore, Subspace, Tuple, Value,
};

#[derive(Debug, Clone)]
enum Op {
    Save { id: i64, price: Option<i64>, store: u8 },
    Delete { id: i64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..12, prop::option::weighted(0.85, -20i64..20), 0u8..3)
            .prop_map(|(id, price, store)| Op::Save { id, price, store }),
        1 => (0i64..12).prop_map(|id| Op::Delete { id }),
    ]
}

#[derive(Debug, Clone)]
enum Pred {
    PriceEq(i64),
    PriceLt(i64),
    PriceLe(i64),
    PriceGt(i64),
    PriceGe(i64),
    StoreEq(u8),
    IdLt(i64),
}

fn pred() -> impl Strategy<Value = Pred> {
    prop_oneof![
        (-22i64..22).prop_map(Pred::PriceEq),
        (-22i64..22).prop_map(Pred::PriceLt),
        (-22i64..22).prop_map(Pred::PriceLe),
        (-22i64..22).prop_map(Pred::PriceGt),
        (-22i64..22).prop_map(Pred::PriceGe),
        (0u8..4).prop_map(Pred::StoreEq),
        (0i64..12).prop_map(Pred::IdLt),
    ]
}

fn component(p: &Pred) -> QueryComponent {
    match p {
        Pred::PriceEq(v) => Query::field("price").eq(*v),
        Pred::PriceLt(v) => Query::field("price").lt(*v),
        Pred::PriceLe(v) => Query::field("price").le(*v),
        Pred::PriceGt(v) => Query::field("price").gt(*v),
        Pred::PriceGe(v) => Query::field("price").ge(*v),
        Pred::StoreEq(s) => Query::field("store").eq(store_name(*s)),
        Pred::IdLt(v) => Query::field("order_id").lt(*v),
    }
}

fn store_name(s: u8) -> String {
    format!("store-{}", s)
}

fn record_store(db: &Database) -> RecordStore {
    let metadata = RecordMetaData::builder()
        .add_record_type(
            "Order",
            [
                ("order_id", FieldType::Int),
                ("price", FieldType::Int),
                ("store", FieldType::String),
            ],
        )
        .set_primary_key("Order", KeyExpression::field("order_id"))
        .add_index("Order", "priceIndex", KeyExpression::field("price"))
        .add_index(
            "Order",
            "storePriceIndex",
            KeyExpression::concat([KeyExpression::field("store"), KeyExpression::field("price")]),
        )
        .build()
        .unwrap();
    // Small batches make cursors cross page boundaries.
    db.open_record_store(metadata, Subspace::new(&Tuple::new().with("prop")))
        .with_scan_batch_size(3)
}

fn apply(store: &RecordStore, db: &Database, ops: &[Op]) {
    db.run(|txn| {
        for op in ops {
            match op {
                Op::Save { id, price, store: s } => {
                    let mut record = Record::new("Order")
                        .with("order_id", *id)
                        .with("store", store_name(*s));
                    if let Some(p) = price {
                        record.set("price", *p);
                    }
                    store.save_record(txn, record)?;
                }
                Op::Delete { id } => {
                    store.delete_record(txn, "Order", &Tuple::new().with(*id))?;
                }
            }
        }
        Ok(())
    })
    .unwrap();
}

/// Names drawn from values that share prefixes and embed NUL
fn name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["", "\0", "a", "a\0", "a\0b", "ab", "ab\0", "ab\0\0", "b"])
        .prop_map(String::from)
}

fn name_pred() -> impl Strategy<Value = QueryComponent> {
    (0u8..5, name()).prop_map(|(op, v)| {
        let field = Query::field("name");
        match op {
            0 => field.eq(v),
            1 => field.lt(v),
            2 => field.le(v),
            3 => field.gt(v),
            _ => field.ge(v),
        }
    })
}

fn people_store(db: &Database) -> RecordStore {
    let metadata = RecordMetaData::builder()
        .add_record_type(
            "Person",
            [("id", FieldType::Int), ("name", FieldType::String)],
        )
        .set_primary_key("Person", KeyExpression::field("id"))
        .add_index("Person", "nameIndex", KeyExpression::field("name"))
        .build()
        .unwrap();
    db.open_record_store(metadata, Subspace::new(&Tuple::new().with("people")))
        .with_scan_batch_size(2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn indexes_match_records_after_every_commit(
        batches in prop::collection::vec(prop::collection::vec(op(), 1..6), 1..8)
    ) {
        let db = Database::in_memory();
        let store = record_store(&db);
        for batch in &batches {
            apply(&store, &db, batch);
            for index in ["priceIndex", "storePriceIndex"] {
                let report = db.transaction(|txn| store.check_index(txn, index)).unwrap();
                prop_assert!(report.is_consistent(), "{}: {:?}", index, report);
            }
        }
    }

    #[test]
    fn access_path_never_changes_the_result_set(
        ops in prop::collection::vec(op(), 0..30),
        preds in prop::collection::vec(pred(), 1..4),
    ) {
        let db = Database::in_memory();
        let store = record_store(&db);
        apply(&store, &db, &ops);

        let filter = Query::and(preds.iter().map(component));
        let query = RecordQuery::new("Order").with_filter(filter.clone());

        let (planned, scanned) = db.transaction(|txn| {
            let planned: Vec<Tuple> = store
                .execute_query(txn, &query)?
                .map(|r| r.map(|s| s.primary_key))
                .collect::<recordlayer_engine::Result<_>>()?;
            let scanned: BTreeSet<Tuple> = store
                .scan_records(txn, "Order")?
                .collect_records()?
                .into_iter()
                .filter(|s| filter.eval(&s.record))
                .map(|s| s.primary_key)
                .collect();
            Ok((planned, scanned))
        }).unwrap();

        let planned_set: BTreeSet<Tuple> = planned.iter().cloned().collect();
        prop_assert_eq!(planned.len(), planned_set.len(), "duplicate records");
        prop_assert_eq!(planned_set, scanned);
    }

    #[test]
    fn index_scans_yield_records_in_index_order(
        ops in prop::collection::vec(op(), 0..30),
        bound in -22i64..22,
    ) {
        let db = Database::in_memory();
        let store = record_store(&db);
        apply(&store, &db, &ops);

        let query = RecordQuery::new("Order").with_filter(Query::field("price").gt(bound));
        let plan = store.plan_query(&query).unwrap();
        prop_assert_eq!(plan.index_name(), Some("priceIndex"));
        let prices: Vec<Value> = db.transaction(|txn| {
            store.execute_query(txn, &query)?.collect_records()
        })
        .unwrap()
        .into_iter()
        .filter_map(|s| s.record.get("price").cloned())
        .collect();
        for pair in prices.windows(2) {
            prop_assert!(pair[0].compare(&pair[1]) != Some(std::cmp::Ordering::Greater));
        }
    }

    #[test]
    fn string_index_ranges_match_full_scan(
        names in prop::collection::vec(name(), 0..12),
        filter in name_pred(),
    ) {
        let db = Database::in_memory();
        let store = people_store(&db);
        db.run(|txn| {
            for (id, n) in names.iter().enumerate() {
                let record = Record::new("Person").with("id", id as i64).with("name", n.as_str());
                store.save_record(txn, record)?;
            }
            Ok(())
        })
        .unwrap();

        let query = RecordQuery::new("Person").with_filter(filter.clone());
        let plan = store.plan_query(&query).unwrap();
        prop_assert_eq!(plan.index_name(), Some("nameIndex"));
        let (planned, scanned) = db.transaction(|txn| {
            let planned: BTreeSet<Tuple> = store
                .execute_query(txn, &query)?
                .map(|r| r.map(|s| s.primary_key))
                .collect::<recordlayer_engine::Result<_>>()?;
            let scanned: BTreeSet<Tuple> = store
                .scan_records(txn, "Person")?
                .collect_records()?
                .into_iter()
                .filter(|s| filter.eval(&s.record))
                .map(|s| s.primary_key)
                .collect();
            Ok((planned, scanned))
        }).unwrap();
        prop_assert_eq!(planned, scanned);
    }
}
