//! Builder for `RecordMetaData`
//!
//! Declarations are collected as given and checked together in `build()`,
//! so the order of calls does not matter (an index may be declared before
//! the primary key of its type, a nested message after the record that uses
//! it).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use recordlayer_core::{Error, FieldType, Result};

use super::{FieldDef, Index, KeyExpression, MessageType, RecordMetaData, RecordType};

/// Collects schema declarations and validates them in `build()`
#[derive(Debug, Clone, Default)]
pub struct RecordMetaDataBuilder {
    message_types: Vec<MessageType>,
    record_types: Vec<MessageType>,
    primary_keys: Vec<(String, KeyExpression)>,
    indexes: Vec<Index>,
}

fn message<N, F, S>(name: N, fields: F) -> MessageType
where
    N: Into<String>,
    F: IntoIterator<Item = (S, FieldType)>,
    S: Into<String>,
{
    MessageType {
        name: name.into(),
        fields: fields
            .into_iter()
            .map(|(name, field_type)| FieldDef {
                name: name.into(),
                field_type,
            })
            .collect(),
    }
}

impl RecordMetaDataBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a nested message type (usable as a field type, not stored on its own)
    pub fn add_message_type<N, F, S>(mut self, name: N, fields: F) -> Self
    where
        N: Into<String>,
        F: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        self.message_types.push(message(name, fields));
        self
    }

    /// Declare a record type; it needs a primary key before `build()`
    pub fn add_record_type<N, F, S>(mut self, name: N, fields: F) -> Self
    where
        N: Into<String>,
        F: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        self.record_types.push(message(name, fields));
        self
    }

    /// Set the primary key expression of a record type
    pub fn set_primary_key(mut self, record_type: impl Into<String>, key: KeyExpression) -> Self {
        self.primary_keys.push((record_type.into(), key));
        self
    }

    /// Declare a secondary index named `index_name` over `record_type`
    pub fn add_index(
        mut self,
        record_type: impl Into<String>,
        index_name: impl Into<String>,
        expression: KeyExpression,
    ) -> Self {
        self.indexes.push(Index {
            name: index_name.into(),
            record_type: record_type.into(),
            root_expression: expression,
        });
        self
    }

    /// Validate every declaration and freeze the metadata
    ///
    /// # Errors
    /// `Error::Schema` for: duplicate type, field or index names; field types
    /// naming unknown messages; record types without a primary key (or with
    /// two); key or index expressions over unknown or non-scalar fields.
    pub fn build(self) -> Result<Arc<RecordMetaData>> {
        let mut names = HashSet::new();
        for ty in self.message_types.iter().chain(&self.record_types) {
            if !names.insert(ty.name.as_str()) {
                return Err(Error::schema(format!("duplicate type name '{}'", ty.name)));
            }
            let mut fields = HashSet::new();
            for field in &ty.fields {
                if !fields.insert(field.name.as_str()) {
                    return Err(Error::schema(format!(
                        "duplicate field '{}' in type '{}'",
                        field.name, ty.name
                    )));
                }
            }
        }
        for ty in self.message_types.iter().chain(&self.record_types) {
            for field in &ty.fields {
                if let FieldType::Message(target) = &field.field_type {
                    if !names.contains(target.as_str()) {
                        return Err(Error::schema(format!(
                            "field '{}.{}' references unknown message type '{}'",
                            ty.name, field.name, target
                        )));
                    }
                }
            }
        }

        let mut primary_keys: BTreeMap<String, KeyExpression> = BTreeMap::new();
        for (record_type, key) in self.primary_keys {
            if !self.record_types.iter().any(|t| t.name == record_type) {
                return Err(Error::schema(format!(
                    "primary key set on unknown record type '{}'",
                    record_type
                )));
            }
            if primary_keys.insert(record_type.clone(), key).is_some() {
                return Err(Error::schema(format!(
                    "primary key of '{}' set more than once",
                    record_type
                )));
            }
        }

        let mut record_types = BTreeMap::new();
        for message in self.record_types {
            let primary_key = primary_keys.remove(&message.name).ok_or_else(|| {
                Error::schema(format!("record type '{}' has no primary key", message.name))
            })?;
            record_types.insert(
                message.name.clone(),
                RecordType {
                    message,
                    primary_key,
                },
            );
        }

        let metadata = RecordMetaData {
            message_types: self
                .message_types
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect(),
            record_types,
            indexes: Vec::new(),
        };

        for record_type in metadata.record_types.values() {
            check_scalar_columns(&metadata, record_type.name(), record_type.primary_key())
                .map_err(|e| Error::schema(format!("primary key of '{}': {}", record_type.name(), e)))?;
        }

        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if !index_names.insert(index.name.as_str()) {
                return Err(Error::schema(format!("duplicate index name '{}'", index.name)));
            }
            metadata.record_type(&index.record_type).map_err(|_| {
                Error::schema(format!(
                    "index '{}' declared on unknown record type '{}'",
                    index.name, index.record_type
                ))
            })?;
            check_scalar_columns(&metadata, &index.record_type, &index.root_expression)
                .map_err(|e| Error::schema(format!("index '{}': {}", index.name, e)))?;
        }

        Ok(Arc::new(RecordMetaData {
            indexes: self.indexes,
            ..metadata
        }))
    }
}

/// Every column of `expr` must resolve to a declared scalar field
fn check_scalar_columns(
    metadata: &RecordMetaData,
    record_type: &str,
    expr: &KeyExpression,
) -> std::result::Result<(), String> {
    if expr.column_count() == 0 {
        return Err("expression has no columns".to_string());
    }
    for path in expr.column_paths() {
        let field_type = metadata
            .resolve_path(record_type, path.as_slice())
            .map_err(|e| match e {
                Error::Schema(msg) => msg,
                other => other.to_string(),
            })?;
        if !field_type.is_scalar() {
            return Err(format!("field '{}' is not a scalar", path.join(".")));
        }
    }
    Ok(())
}
