//! Record metadata: message types, record types, primary keys and indexes
//!
//! Metadata is assembled once with [`RecordMetaDataBuilder`], validated as a
//! whole in `build()`, and then shared read-only behind an `Arc`. Lookups are
//! by name; there is no reflection.
//!
//! # Save-time validation
//!
//! [`RecordMetaData::validate_record`] checks a record against its type
//! before any write happens and returns the record with numeric literals
//! coerced to the declared field types.

mod builder;
mod key_expression;

pub use builder::RecordMetaDataBuilder;
pub use key_expression::KeyExpression;

use std::collections::BTreeMap;

use recordlayer_core::{Error, FieldType, Record, Result, Value};

/// One declared field of a message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: FieldType,
}

/// A named, ordered list of typed fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    name: String,
    fields: Vec<FieldDef>,
}

impl MessageType {
    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Declared type of `name`
    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.field_type)
    }
}

/// A message type that is stored as top-level records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    message: MessageType,
    primary_key: KeyExpression,
}

impl RecordType {
    /// Type name
    pub fn name(&self) -> &str {
        self.message.name()
    }

    /// Field layout
    pub fn message(&self) -> &MessageType {
        &self.message
    }

    /// Primary key expression
    pub fn primary_key(&self) -> &KeyExpression {
        &self.primary_key
    }
}

/// A secondary index over one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    record_type: String,
    root_expression: KeyExpression,
}

impl Index {
    /// Index name, unique across the metadata
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record type this index covers
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Expression producing the indexed columns
    pub fn root_expression(&self) -> &KeyExpression {
        &self.root_expression
    }

    /// Number of indexed columns preceding the primary key in each entry
    pub fn column_count(&self) -> usize {
        self.root_expression.column_count()
    }
}

/// Immutable, validated schema shared by every store operation
#[derive(Debug, Clone)]
pub struct RecordMetaData {
    message_types: BTreeMap<String, MessageType>,
    record_types: BTreeMap<String, RecordType>,
    indexes: Vec<Index>,
}

impl RecordMetaData {
    /// Start building metadata
    pub fn builder() -> RecordMetaDataBuilder {
        RecordMetaDataBuilder::new()
    }

    /// Record type by name
    ///
    /// # Errors
    /// `Error::Schema` if no such record type is registered.
    pub fn record_type(&self, name: &str) -> Result<&RecordType> {
        self.record_types
            .get(name)
            .ok_or_else(|| Error::schema(format!("unknown record type '{}'", name)))
    }

    /// All record types, by name
    pub fn record_types(&self) -> impl Iterator<Item = &RecordType> {
        self.record_types.values()
    }

    /// Message type (record or nested) by name
    pub fn message_type(&self, name: &str) -> Option<&MessageType> {
        self.record_types
            .get(name)
            .map(RecordType::message)
            .or_else(|| self.message_types.get(name))
    }

    /// Index by name
    ///
    /// # Errors
    /// `Error::Schema` if no such index is declared.
    pub fn index(&self, name: &str) -> Result<&Index> {
        self.indexes
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::schema(format!("unknown index '{}'", name)))
    }

    /// All indexes in declaration order
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Indexes over `record_type`, in declaration order
    pub fn indexes_for<'a>(&'a self, record_type: &'a str) -> impl Iterator<Item = &'a Index> + 'a {
        self.indexes
            .iter()
            .filter(move |i| i.record_type == record_type)
    }

    /// Resolve a dotted field path starting at message type `root`
    ///
    /// # Errors
    /// `Error::Schema` for unknown fields, or when a non-final path segment
    /// is not a message.
    pub fn resolve_path<S: AsRef<str>>(&self, root: &str, path: &[S]) -> Result<&FieldType> {
        let mut message = self
            .message_type(root)
            .ok_or_else(|| Error::schema(format!("unknown message type '{}'", root)))?;
        let mut resolved: Option<&FieldType> = None;
        for (i, segment) in path.iter().enumerate() {
            let segment = segment.as_ref();
            if i > 0 {
                message = match resolved {
                    Some(FieldType::Message(name)) => self.message_type(name).ok_or_else(|| {
                        Error::schema(format!("unknown message type '{}'", name))
                    })?,
                    _ => {
                        return Err(Error::schema(format!(
                            "field before '{}' is not a message",
                            segment
                        )))
                    }
                };
            }
            resolved = Some(message.field(segment).ok_or_else(|| {
                Error::schema(format!(
                    "unknown field '{}' in type '{}'",
                    segment,
                    message.name()
                ))
            })?);
        }
        resolved.ok_or_else(|| Error::schema("empty field path"))
    }

    /// Check `record` against its record type and coerce numeric literals
    ///
    /// # Errors
    /// - `Error::Schema` if the record's type is not registered
    /// - `Error::Validation` for undeclared fields, type mismatches, nested
    ///   messages of the wrong type, or a null/missing primary key component
    pub fn validate_record(&self, record: Record) -> Result<Record> {
        let record_type = self.record_type(record.type_name())?;
        let type_name = record_type.name().to_string();
        let record = self.validate_message(&type_name, record_type.message(), record)?;

        let pk = record_type.primary_key();
        for (path, value) in pk.column_paths().iter().zip(pk.evaluate(&record)) {
            if value.is_null() {
                return Err(Error::validation(
                    type_name,
                    format!("primary key field '{}' is missing or null", path.join(".")),
                ));
            }
        }
        Ok(record)
    }

    fn validate_message(
        &self,
        record_type: &str,
        message: &MessageType,
        record: Record,
    ) -> Result<Record> {
        let mut validated = Record::new(message.name());
        for (name, value) in record.fields() {
            let field_type = message.field(name).ok_or_else(|| {
                Error::validation(
                    record_type,
                    format!("field '{}' is not declared in '{}'", name, message.name()),
                )
            })?;
            let value = match (value, field_type) {
                (Value::Null, _) => Value::Null,
                (Value::Message(nested), FieldType::Message(expected)) => {
                    if nested.type_name() != expected {
                        return Err(Error::validation(
                            record_type,
                            format!(
                                "field '{}' expects message '{}', got '{}'",
                                name,
                                expected,
                                nested.type_name()
                            ),
                        ));
                    }
                    let nested_type = self.message_type(expected).ok_or_else(|| {
                        Error::schema(format!("unknown message type '{}'", expected))
                    })?;
                    Value::Message(self.validate_message(record_type, nested_type, nested.clone())?)
                }
                (value, field_type) => value.coerce_to(field_type).ok_or_else(|| {
                    Error::validation(
                        record_type,
                        format!(
                            "field '{}' expects {}, got {}",
                            name,
                            field_type,
                            value.kind()
                        ),
                    )
                })?,
            };
            validated.set(name, value);
        }
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> RecordMetaData {
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
                    ("weight", FieldType::Double),
                    ("flower", FieldType::Message("Flower".into())),
                ],
            )
            .set_primary_key("Order", KeyExpression::field("order_id"))
            .add_index("Order", "priceIndex", KeyExpression::field("price"))
            .build()
            .map(|m| (*m).clone())
            .unwrap()
    }

    #[test]
    fn test_lookups() {
        let md = metadata();
        assert_eq!(md.record_type("Order").unwrap().name(), "Order");
        assert!(matches!(md.record_type("Flower"), Err(Error::Schema(_))));
        assert!(md.message_type("Flower").is_some());
        assert_eq!(md.index("priceIndex").unwrap().record_type(), "Order");
        assert!(md.index("nope").is_err());
        assert_eq!(md.indexes_for("Order").count(), 1);
    }

    #[test]
    fn test_resolve_nested_path() {
        let md = metadata();
        assert_eq!(
            md.resolve_path("Order", &["flower", "type"]).unwrap(),
            &FieldType::String
        );
        assert!(md.resolve_path("Order", &["price", "type"]).is_err());
        assert!(md.resolve_path("Order", &["flower", "petals"]).is_err());
    }

    #[test]
    fn test_validate_coerces_numeric_literals() {
        let md = metadata();
        let record = Record::new("Order").with("order_id", 1).with("weight", 2);
        let validated = md.validate_record(record).unwrap();
        assert_eq!(validated.get("weight"), Some(&Value::Double(2.0)));
    }

    #[test]
    fn test_validate_rejections() {
        let md = metadata();

        let err = md
            .validate_record(Record::new("Order").with("order_id", 1).with("price", "cheap"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = md
            .validate_record(Record::new("Order").with("order_id", 1).with("colour", "red"))
            .unwrap_err();
        assert!(err.to_string().contains("colour"));

        let err = md
            .validate_record(Record::new("Order").with("price", 5))
            .unwrap_err();
        assert!(err.to_string().contains("primary key"));

        let err = md
            .validate_record(
                Record::new("Order")
                    .with("order_id", 1)
                    .with("flower", Record::new("Order").with("order_id", 2)),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = md
            .validate_record(
                Record::new("Order")
                    .with("order_id", 1)
                    .with("flower", Record::new("Flower").with("type", 7)),
            )
            .unwrap_err();
        assert!(err.to_string().contains("type"));

        assert!(matches!(
            md.validate_record(Record::new("Invoice").with("id", 1)),
            Err(Error::Schema(_))
        ));
    }
}
