//! Record/plan → human/json/raw string formatting.
//!
//! Three modes:
//! - **Human** (default): labelled lines, e.g. `(record) Order (1) { ... }`, `(nil)`
//! - **JSON** (`--json`): one pretty-printed object per step
//! - **Raw** (`--raw`): bare records, no labels

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use recordlayer_engine::{Error, QueryPlan, Record, StoredRecord, Tuple, Value};
use serde_json::{json, Map};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
    Raw,
}

/// Format the result of loading `primary_key`.
pub fn format_load(primary_key: &Tuple, loaded: Option<&StoredRecord>, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(json!({
            "load": primary_key.to_string(),
            "record": loaded.map(|s| record_to_json(&s.record)),
        })),
        OutputMode::Raw => loaded.map(|s| s.record.to_string()).unwrap_or_default(),
        OutputMode::Human => match loaded {
            Some(stored) => format!("load {} -> {}", primary_key, format_stored(stored)),
            None => format!("load {} -> (nil)", primary_key),
        },
    }
}

/// Format the records produced by a query.
pub fn format_query(filter: &str, records: &[StoredRecord], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(json!({
            "query": filter,
            "records": records.iter().map(|s| record_to_json(&s.record)).collect::<Vec<_>>(),
        })),
        OutputMode::Raw => records
            .iter()
            .map(|s| s.record.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        OutputMode::Human => {
            let mut out = format!("query {} -> ({} record(s))", filter, records.len());
            for (i, stored) in records.iter().enumerate() {
                out.push_str(&format!("\n{}) {}", i + 1, format_stored(stored)));
            }
            out
        }
    }
}

/// Format a query plan.
pub fn format_plan(plan: &QueryPlan, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(json!({
            "plan": plan.to_string(),
            "index": plan.index_name(),
        })),
        OutputMode::Raw => plan.to_string(),
        OutputMode::Human => format!("(plan) {}", plan),
    }
}

/// Format an error.
pub fn format_error(err: &Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => pretty(json!({ "error": err.to_string() })),
        OutputMode::Raw => err.to_string(),
        OutputMode::Human => format!("(error) {}", err),
    }
}

fn format_stored(stored: &StoredRecord) -> String {
    format!("(record) {} {}", stored.primary_key, stored.record)
}

fn pretty(value: serde_json::Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Plain JSON view of a record: fields by name, nested messages as objects.
pub fn record_to_json(record: &Record) -> serde_json::Value {
    let mut fields = Map::new();
    fields.insert("_type".to_string(), json!(record.type_name()));
    for (name, value) in record.fields() {
        fields.insert(name.to_string(), value_to_json(value));
    }
    serde_json::Value::Object(fields)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Uint(u) => json!(u),
        Value::Double(d) => json!(d),
        Value::String(s) => json!(s),
        Value::Bytes(b) => json!(STANDARD.encode(b)),
        Value::Message(nested) => record_to_json(nested),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> StoredRecord {
        StoredRecord {
            record_type: "Order".to_string(),
            primary_key: Tuple::new().with(23i64),
            record: Record::new("Order")
                .with("order_id", 23)
                .with("price", 34)
                .with("flower", Record::new("Flower").with("type", "ROSE")),
        }
    }

    #[test]
    fn test_format_load_human() {
        let pk = Tuple::new().with(23i64);
        assert_eq!(
            format_load(&pk, Some(&stored()), OutputMode::Human),
            "load (23) -> (record) (23) Order { flower: Flower { type: \"ROSE\" }, order_id: 23, price: 34 }"
        );
        assert_eq!(
            format_load(&Tuple::new().with(133i64), None, OutputMode::Human),
            "load (133) -> (nil)"
        );
        assert_eq!(format_load(&pk, None, OutputMode::Raw), "");
    }

    #[test]
    fn test_format_query_human_numbers_records() {
        let out = format_query("price < 50", &[stored()], OutputMode::Human);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "query price < 50 -> (1 record(s))");
        assert!(lines[1].starts_with("1) (record) (23)"));
    }

    #[test]
    fn test_record_to_json_flattens_values() {
        let json = record_to_json(&stored().record);
        assert_eq!(json["_type"], "Order");
        assert_eq!(json["price"], 34);
        assert_eq!(json["flower"]["type"], "ROSE");

        let bytes = record_to_json(&Record::new("Blob").with("data", vec![1u8, 2, 3]));
        assert_eq!(bytes["data"], "AQID");
    }

    #[test]
    fn test_format_error_modes() {
        let err = Error::schema("unknown field 'prize'");
        assert!(format_error(&err, OutputMode::Human).starts_with("(error) Schema error"));
        assert!(format_error(&err, OutputMode::Json).contains("\"error\""));
    }
}
