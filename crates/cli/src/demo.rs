//! The order/flower walkthrough: save three orders, load two keys, run one query.

use std::sync::Arc;

use recordlayer_engine::{
    Database, FieldType, KeyExpression, Query, Record, RecordMetaData, RecordQuery, RecordStore,
    Result, Subspace, Tuple,
};

use crate::commands::Options;
use crate::format::{format_load, format_plan, format_query};

/// Root subspace every demo record and index entry lives under.
pub const DEMO_ROOT: &str = "record-layer-demo";

/// `Flower { type, color }` nested in `Order { order_id, price, flower }`,
/// keyed by `order_id` with `priceIndex` on `price`.
pub fn demo_metadata() -> Result<Arc<RecordMetaData>> {
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

/// Open the database the options ask for.
pub fn open_database(opts: &Options) -> Result<Arc<Database>> {
    match &opts.config {
        Some(path) => Database::in_memory_from_config_file(path),
        None => Ok(Database::in_memory()),
    }
}

/// Run the walkthrough, returning one formatted block per step.
pub fn run_demo(db: &Database, opts: &Options) -> Result<Vec<String>> {
    let store = db.open_record_store(
        demo_metadata()?,
        Subspace::new(&Tuple::new().with(DEMO_ROOT)),
    );
    let mut out = Vec::new();

    db.run(|txn| {
        store.save_record(txn, order(1, 123, "ROSE", "RED"))?;
        store.save_record(txn, order(23, 34, "ROSE", "PINK"))?;
        store.save_record(txn, order(3, 55, "TULIP", "YELLOW"))?;
        Ok(())
    })?;

    for id in [1i64, 133] {
        let pk = Tuple::new().with(id);
        let loaded = db.run(|txn| store.load_record(txn, "Order", &pk))?;
        out.push(format_load(&pk, loaded.as_ref(), opts.mode));
    }

    let query = cheap_roses();
    if opts.explain {
        out.push(format_plan(&store.plan_query(&query)?, opts.mode));
    }
    let found = query_records(db, &store, &query)?;
    let filter = query
        .filter()
        .map(ToString::to_string)
        .unwrap_or_default();
    out.push(format_query(&filter, &found, opts.mode));
    Ok(out)
}

/// `price < 50 AND flower matches (type == "ROSE")`
fn cheap_roses() -> RecordQuery {
    RecordQuery::new("Order").with_filter(Query::and([
        Query::field("price").lt(50),
        Query::field("flower").matches(Query::field("type").eq("ROSE")),
    ]))
}

fn query_records(
    db: &Database,
    store: &RecordStore,
    query: &RecordQuery,
) -> Result<Vec<recordlayer_engine::StoredRecord>> {
    db.run(|txn| store.execute_query(txn, query)?.collect_records())
}
