//! Key expressions: how primary keys and index keys are derived from records

use std::fmt;

use recordlayer_core::{Record, Value};

/// Derives an ordered list of scalar values (columns) from a record
///
/// - `field("price")` yields one column
/// - `nest("flower", field("type"))` yields the nested field as one column
/// - `concat([..])` yields the columns of each part in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyExpression {
    /// A top-level field
    Field(String),
    /// An expression evaluated inside a nested message field
    Nest {
        /// Message-typed field in the outer record
        parent: String,
        /// Expression over the nested message
        child: Box<KeyExpression>,
    },
    /// Columns of every part, in order
    Concat(Vec<KeyExpression>),
}

impl KeyExpression {
    /// Single top-level field
    pub fn field(name: impl Into<String>) -> Self {
        KeyExpression::Field(name.into())
    }

    /// `child` evaluated inside the message stored in `parent`
    pub fn nest(parent: impl Into<String>, child: KeyExpression) -> Self {
        KeyExpression::Nest {
            parent: parent.into(),
            child: Box::new(child),
        }
    }

    /// Concatenation of several expressions
    pub fn concat(parts: impl IntoIterator<Item = KeyExpression>) -> Self {
        KeyExpression::Concat(parts.into_iter().collect())
    }

    /// Number of columns this expression produces
    pub fn column_count(&self) -> usize {
        match self {
            KeyExpression::Field(_) => 1,
            KeyExpression::Nest { child, .. } => child.column_count(),
            KeyExpression::Concat(parts) => parts.iter().map(KeyExpression::column_count).sum(),
        }
    }

    /// Field path of every column, outermost field first
    pub fn column_paths(&self) -> Vec<Vec<String>> {
        match self {
            KeyExpression::Field(name) => vec![vec![name.clone()]],
            KeyExpression::Nest { parent, child } => child
                .column_paths()
                .into_iter()
                .map(|mut path| {
                    path.insert(0, parent.clone());
                    path
                })
                .collect(),
            KeyExpression::Concat(parts) => {
                parts.iter().flat_map(KeyExpression::column_paths).collect()
            }
        }
    }

    /// Evaluate against `record`; absent fields and absent parents yield `Null`
    pub fn evaluate(&self, record: &Record) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.column_count());
        self.evaluate_into(Some(record), &mut out);
        out
    }

    fn evaluate_into(&self, record: Option<&Record>, out: &mut Vec<Value>) {
        match self {
            KeyExpression::Field(name) => out.push(
                record
                    .and_then(|r| r.get(name))
                    .cloned()
                    .unwrap_or(Value::Null),
            ),
            KeyExpression::Nest { parent, child } => {
                let nested = record.and_then(|r| r.get(parent)).and_then(Value::as_message);
                child.evaluate_into(nested, out);
            }
            KeyExpression::Concat(parts) => {
                for part in parts {
                    part.evaluate_into(record, out);
                }
            }
        }
    }
}

impl fmt::Display for KeyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyExpression::Field(name) => write!(f, "{}", name),
            KeyExpression::Nest { parent, child } => write!(f, "{}.{}", parent, child),
            KeyExpression::Concat(parts) => {
                write!(f, "(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", part)?;
                }
                write!(f, ")")
            }
        }
    }
}
