//! Query filter expressions
//!
//! Filters are trees of [`QueryComponent`]s built with the [`Query`]
//! helpers:
//!
//! ```ignore
//! Query::and([
//!     Query::field("price").lt(50),
//!     Query::field("flower").matches(Query::field("type").eq("ROSE")),
//! ])
//! ```
//!
//! Comparisons never match a null or missing field; only `is_null` does.

use std::fmt;

use recordlayer_core::{Error, FieldType, Record, Result, Value};

use crate::metadata::{MessageType, RecordMetaData};

/// A comparison applied to one field value
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// `==`
    Equals(Value),
    /// `!=`
    NotEquals(Value),
    /// `<`
    LessThan(Value),
    /// `<=`
    LessThanOrEquals(Value),
    /// `>`
    GreaterThan(Value),
    /// `>=`
    GreaterThanOrEquals(Value),
    /// Field is null or absent
    IsNull,
    /// Field is present and not null
    NotNull,
}

impl Comparison {
    /// Operand, for comparisons that have one
    pub fn operand(&self) -> Option<&Value> {
        match self {
            Comparison::Equals(v)
            | Comparison::NotEquals(v)
            | Comparison::LessThan(v)
            | Comparison::LessThanOrEquals(v)
            | Comparison::GreaterThan(v)
            | Comparison::GreaterThanOrEquals(v) => Some(v),
            Comparison::IsNull | Comparison::NotNull => None,
        }
    }

    fn with_operand(&self, operand: Value) -> Comparison {
        match self {
            Comparison::Equals(_) => Comparison::Equals(operand),
            Comparison::NotEquals(_) => Comparison::NotEquals(operand),
            Comparison::LessThan(_) => Comparison::LessThan(operand),
            Comparison::LessThanOrEquals(_) => Comparison::LessThanOrEquals(operand),
            Comparison::GreaterThan(_) => Comparison::GreaterThan(operand),
            Comparison::GreaterThanOrEquals(_) => Comparison::GreaterThanOrEquals(operand),
            Comparison::IsNull => Comparison::IsNull,
            Comparison::NotNull => Comparison::NotNull,
        }
    }

    /// Evaluate against a field value (`None` = field absent)
    pub fn eval(&self, value: Option<&Value>) -> bool {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => return matches!(self, Comparison::IsNull),
        };
        use std::cmp::Ordering::*;
        match self {
            Comparison::IsNull => false,
            Comparison::NotNull => true,
            Comparison::Equals(rhs) => value.compare(rhs) == Some(Equal),
            Comparison::NotEquals(rhs) => matches!(value.compare(rhs), Some(Less | Greater)),
            Comparison::LessThan(rhs) => value.compare(rhs) == Some(Less),
            Comparison::LessThanOrEquals(rhs) => matches!(value.compare(rhs), Some(Less | Equal)),
            Comparison::GreaterThan(rhs) => value.compare(rhs) == Some(Greater),
            Comparison::GreaterThanOrEquals(rhs) => {
                matches!(value.compare(rhs), Some(Greater | Equal))
            }
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equals(_) => "==",
            Comparison::NotEquals(_) => "!=",
            Comparison::LessThan(_) => "<",
            Comparison::LessThanOrEquals(_) => "<=",
            Comparison::GreaterThan(_) => ">",
            Comparison::GreaterThanOrEquals(_) => ">=",
            Comparison::IsNull => "IS NULL",
            Comparison::NotNull => "IS NOT NULL",
        }
    }
}

/// Node of a filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum QueryComponent {
    /// Comparison on a field of the current message
    Field {
        /// Field name
        name: String,
        /// Comparison applied to its value
        comparison: Comparison,
    },
    /// Predicate evaluated inside a nested message field
    Matches {
        /// Message-typed field
        field: String,
        /// Predicate over the nested message
        child: Box<QueryComponent>,
    },
    /// All children hold
    And(Vec<QueryComponent>),
    /// At least one child holds
    Or(Vec<QueryComponent>),
    /// Child does not hold
    Not(Box<QueryComponent>),
}

impl QueryComponent {
    /// Evaluate against a record (or nested message)
    pub fn eval(&self, record: &Record) -> bool {
        match self {
            QueryComponent::Field { name, comparison } => comparison.eval(record.get(name)),
            QueryComponent::Matches { field, child } => record
                .get(field)
                .and_then(Value::as_message)
                .map_or(false, |nested| child.eval(nested)),
            QueryComponent::And(children) => children.iter().all(|c| c.eval(record)),
            QueryComponent::Or(children) => children.iter().any(|c| c.eval(record)),
            QueryComponent::Not(child) => !child.eval(record),
        }
    }

    /// Conjuncts of this filter, with nested `And`s flattened
    pub fn conjuncts(&self) -> Vec<&QueryComponent> {
        match self {
            QueryComponent::And(children) => {
                children.iter().flat_map(QueryComponent::conjuncts).collect()
            }
            other => vec![other],
        }
    }

    /// Check the filter against `message` and coerce operands to field types
    ///
    /// # Errors
    /// `Error::Schema` for unknown fields, `matches` on a non-message field,
    /// comparisons on message fields, null operands, and operands that
    /// cannot be converted to the field's type.
    pub fn normalize(&self, metadata: &RecordMetaData, message: &MessageType) -> Result<QueryComponent> {
        match self {
            QueryComponent::Field { name, comparison } => {
                let field_type = message.field(name).ok_or_else(|| {
                    Error::schema(format!(
                        "unknown field '{}' in type '{}'",
                        name,
                        message.name()
                    ))
                })?;
                let comparison = match comparison.operand() {
                    None => comparison.clone(),
                    Some(_) if !field_type.is_scalar() => {
                        return Err(Error::schema(format!(
                            "field '{}' is a message; use matches() or is_null()",
                            name
                        )))
                    }
                    Some(Value::Null) => {
                        return Err(Error::schema(format!(
                            "comparison of '{}' with null; use is_null()",
                            name
                        )))
                    }
                    Some(operand) => {
                        let coerced = operand.coerce_to(field_type).ok_or_else(|| {
                            Error::schema(format!(
                                "cannot compare {} field '{}' with {} value {}",
                                field_type,
                                name,
                                operand.kind(),
                                operand
                            ))
                        })?;
                        comparison.with_operand(coerced)
                    }
                };
                Ok(QueryComponent::Field {
                    name: name.clone(),
                    comparison,
                })
            }
            QueryComponent::Matches { field, child } => {
                let nested = match message.field(field) {
                    Some(FieldType::Message(type_name)) => {
                        metadata.message_type(type_name).ok_or_else(|| {
                            Error::schema(format!("unknown message type '{}'", type_name))
                        })?
                    }
                    Some(other) => {
                        return Err(Error::schema(format!(
                            "matches() on field '{}' of type {}",
                            field, other
                        )))
                    }
                    None => {
                        return Err(Error::schema(format!(
                            "unknown field '{}' in type '{}'",
                            field,
                            message.name()
                        )))
                    }
                };
                Ok(QueryComponent::Matches {
                    field: field.clone(),
                    child: Box::new(child.normalize(metadata, nested)?),
                })
            }
            QueryComponent::And(children) => Ok(QueryComponent::And(
                children
                    .iter()
                    .map(|c| c.normalize(metadata, message))
                    .collect::<Result<_>>()?,
            )),
            QueryComponent::Or(children) => Ok(QueryComponent::Or(
                children
                    .iter()
                    .map(|c| c.normalize(metadata, message))
                    .collect::<Result<_>>()?,
            )),
            QueryComponent::Not(child) => Ok(QueryComponent::Not(Box::new(
                child.normalize(metadata, message)?,
            ))),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[QueryComponent], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        match child {
            QueryComponent::And(_) | QueryComponent::Or(_) => write!(f, "({})", child)?,
            _ => write!(f, "{}", child)?,
        }
    }
    Ok(())
}

impl fmt::Display for QueryComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryComponent::Field { name, comparison } => match comparison.operand() {
                Some(v) => write!(f, "{} {} {}", name, comparison.symbol(), v),
                None => write!(f, "{} {}", name, comparison.symbol()),
            },
            QueryComponent::Matches { field, child } => write!(f, "{} matches ({})", field, child),
            QueryComponent::And(children) => write_joined(f, children, "AND"),
            QueryComponent::Or(children) => write_joined(f, children, "OR"),
            QueryComponent::Not(child) => write!(f, "NOT ({})", child),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Entry points for building filters
pub struct Query;

impl Query {
    /// Predicates on field `name`
    pub fn field(name: impl Into<String>) -> Field {
        Field { name: name.into() }
    }

    /// All of `children`
    pub fn and(children: impl IntoIterator<Item = QueryComponent>) -> QueryComponent {
        QueryComponent::And(children.into_iter().collect())
    }

    /// Any of `children`
    pub fn or(children: impl IntoIterator<Item = QueryComponent>) -> QueryComponent {
        QueryComponent::Or(children.into_iter().collect())
    }

    /// Negation of `child`
    pub fn not(child: QueryComponent) -> QueryComponent {
        QueryComponent::Not(Box::new(child))
    }
}

/// A field awaiting its predicate
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
}

impl Field {
    fn compare(self, comparison: Comparison) -> QueryComponent {
        QueryComponent::Field {
            name: self.name,
            comparison,
        }
    }

    /// `field == value`
    pub fn eq(self, value: impl Into<Value>) -> QueryComponent {
        self.compare(Comparison::Equals(value.into()))
    }

    /// `field != value`
    pub fn ne(self, value: impl Into<Value>) -> QueryComponent {
        self.compare(Comparison::NotEquals(value.into()))
    }

    /// `field < value`
    pub fn lt(self, value: impl Into<Value>) -> QueryComponent {
        self.compare(Comparison::LessThan(value.into()))
    }

    /// `field <= value`
    pub fn le(self, value: impl Into<Value>) -> QueryComponent {
        self.compare(Comparison::LessThanOrEquals(value.into()))
    }

    /// `field > value`
    pub fn gt(self, value: impl Into<Value>) -> QueryComponent {
        self.compare(Comparison::GreaterThan(value.into()))
    }

    /// `field >= value`
    pub fn ge(self, value: impl Into<Value>) -> QueryComponent {
        self.compare(Comparison::GreaterThanOrEquals(value.into()))
    }

    /// `low <= field <= high`
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> QueryComponent {
        let name = self.name;
        QueryComponent::And(vec![
            Query::field(name.clone()).ge(low),
            Query::field(name).le(high),
        ])
    }

    /// Field is null or absent
    pub fn is_null(self) -> QueryComponent {
        self.compare(Comparison::IsNull)
    }

    /// Field is present and not null
    pub fn not_null(self) -> QueryComponent {
        self.compare(Comparison::NotNull)
    }

    /// Nested message in this field satisfies `child`
    pub fn matches(self, child: QueryComponent) -> QueryComponent {
        QueryComponent::Matches {
            field: self.name,
            child: Box::new(child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::KeyExpression;

    fn rose(price: i64) -> Record {
        Record::new("Order")
            .with("order_id", 1)
            .with("price", price)
            .with(
                "flower",
                Record::new("Flower").with("type", "ROSE").with("color", "RED"),
            )
    }

    fn metadata() -> std::sync::Arc<RecordMetaData> {
        RecordMetaData::builder()
            .add_message_type("Flower", [("type", FieldType::String)])
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
            .build()
            .unwrap()
    }

    #[test]
    fn test_eval_demo_filter() {
        let filter = Query::and([
            Query::field("price").lt(50),
            Query::field("flower").matches(Query::field("type").eq("ROSE")),
        ]);
        assert!(filter.eval(&rose(34)));
        assert!(!filter.eval(&rose(123)));
        assert!(!filter.eval(&Record::new("Order").with("price", 10)));
    }

    #[test]
    fn test_null_never_matches_comparisons() {
        let record = Record::new("Order").with("price", Value::Null);
        assert!(!Query::field("price").lt(50).eval(&record));
        assert!(!Query::field("price").ne(50).eval(&record));
        assert!(Query::field("price").is_null().eval(&record));
        assert!(Query::field("missing").is_null().eval(&record));
        assert!(!Query::field("price").not_null().eval(&record));
    }

    #[test]
    fn test_between_or_not() {
        let f = Query::field("price").between(10, 20);
        assert!(f.eval(&rose(10)));
        assert!(f.eval(&rose(20)));
        assert!(!f.eval(&rose(21)));

        let f = Query::or([Query::field("price").eq(1), Query::not(Query::field("price").lt(100))]);
        assert!(f.eval(&rose(1)));
        assert!(f.eval(&rose(150)));
        assert!(!f.eval(&rose(50)));
    }

    #[test]
    fn test_conjuncts_flatten_nested_and() {
        let f = Query::and([
            Query::field("a").eq(1),
            Query::and([Query::field("b").eq(2), Query::field("c").eq(3)]),
        ]);
        assert_eq!(f.conjuncts().len(), 3);
    }

    #[test]
    fn test_display() {
        let f = Query::and([
            Query::field("price").lt(50),
            Query::field("flower").matches(Query::field("type").eq("ROSE")),
            Query::or([Query::field("price").is_null(), Query::field("price").ge(7)]),
        ]);
        assert_eq!(
            f.to_string(),
            "price < 50 AND flower matches (type == \"ROSE\") AND (price IS NULL OR price >= 7)"
        );
    }

    #[test]
    fn test_normalize_coerces_and_rejects() {
        let md = metadata();
        let order = md.message_type("Order").unwrap();

        let normalized = Query::field("weight").gt(2).normalize(&md, order).unwrap();
        assert_eq!(
            normalized,
            QueryComponent::Field {
                name: "weight".into(),
                comparison: Comparison::GreaterThan(Value::Double(2.0)),
            }
        );

        for bad in [
            Query::field("colour").eq("RED"),
            Query::field("price").matches(Query::field("type").eq("ROSE")),
            Query::field("flower").eq("ROSE"),
            Query::field("price").eq("cheap"),
            Query::field("price").eq(Value::Null),
            Query::field("flower").matches(Query::field("petals").gt(3)),
        ] {
            assert!(
                matches!(bad.normalize(&md, order), Err(Error::Schema(_))),
                "expected schema error for {}",
                bad
            );
        }

        assert!(Query::field("flower").is_null().normalize(&md, order).is_ok());
    }
}
