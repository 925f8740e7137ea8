//! Access path selection
//!
//! The planner looks only at the top-level conjuncts of a filter. A conjunct
//! is sargable when it compares a plain field of the record with a constant;
//! `matches`, `or` and `not` always stay in the residual filter.
//!
//! For every index over the queried type, in declaration order, the planner
//! consumes equality conjuncts on the leading index columns, then any range
//! conjuncts on the next column (merged into the tightest bounds). The index
//! with the most equality columns wins, a range breaks ties, and the first
//! declared index wins remaining ties. With no usable index the plan is a
//! full scan of the record type.

use std::fmt;
use std::ops::Bound;

use recordlayer_core::{Error, Result, Subspace, Tuple, Value};
use tracing::debug;

use super::filter::{Comparison, QueryComponent};
use crate::index;
use crate::metadata::{Index, RecordMetaData};

/// A query over one record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    record_type: String,
    filter: Option<QueryComponent>,
    limit: Option<usize>,
}

impl RecordQuery {
    /// All records of `record_type`
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            filter: None,
            limit: None,
        }
    }

    /// Only records satisfying `filter`
    pub fn with_filter(mut self, filter: QueryComponent) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Stop after `limit` records
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Queried record type
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Filter, if any
    pub fn filter(&self) -> Option<&QueryComponent> {
        self.filter.as_ref()
    }

    /// Limit, if any
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// How candidate records are produced
#[derive(Debug, Clone, PartialEq)]
pub enum AccessPath {
    /// Every record of the type, in primary key order
    Scan {
        /// Record type scanned
        record_type: String,
    },
    /// Entries of one index, in index order
    Index {
        /// Index scanned
        index_name: String,
        /// Record type the index covers
        record_type: String,
        /// Values fixed for the leading index columns
        equals: Vec<Value>,
        /// Lower bound on the column after `equals`
        low: Bound<Value>,
        /// Upper bound on the column after `equals`
        high: Bound<Value>,
    },
}

impl AccessPath {
    /// Record type the path produces
    pub fn record_type(&self) -> &str {
        match self {
            AccessPath::Scan { record_type } | AccessPath::Index { record_type, .. } => {
                record_type
            }
        }
    }

    /// Raw key range of an index path inside `index_subspace`
    pub(crate) fn index_key_range(&self, index_subspace: &Subspace) -> Result<(Vec<u8>, Vec<u8>)> {
        let AccessPath::Index {
            equals, low, high, ..
        } = self
        else {
            return Ok(index_subspace.range());
        };
        let prefix: Tuple = equals
            .iter()
            .map(to_element)
            .collect::<Result<_>>()?;
        let low = bound_tuple(low)?;
        let high = bound_tuple(high)?;
        index::key_range(
            &index_subspace.subspace(&prefix),
            low.as_ref(),
            high.as_ref(),
        )
    }
}

fn to_element(value: &Value) -> Result<recordlayer_core::TupleElement> {
    value
        .to_tuple_element()
        .ok_or_else(|| Error::schema(format!("{} cannot bound an index scan", value.kind())))
}

fn bound_tuple(bound: &Bound<Value>) -> Result<Bound<Tuple>> {
    Ok(match bound {
        Bound::Included(v) => Bound::Included(Tuple::new().with(to_element(v)?)),
        Bound::Excluded(v) => Bound::Excluded(Tuple::new().with(to_element(v)?)),
        Bound::Unbounded => Bound::Unbounded,
    })
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPath::Scan { record_type } => write!(f, "Scan({})", record_type),
            AccessPath::Index {
                index_name,
                equals,
                low,
                high,
                ..
            } => {
                write!(f, "Index({}", index_name)?;
                if !equals.is_empty() {
                    write!(f, " [= ")?;
                    for (i, v) in equals.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", v)?;
                    }
                    write!(f, "]")?;
                }
                if !(matches!(low, Bound::Unbounded) && matches!(high, Bound::Unbounded)) {
                    match low {
                        Bound::Included(v) => write!(f, " [{}, ", v)?,
                        Bound::Excluded(v) => write!(f, " ({}, ", v)?,
                        Bound::Unbounded => write!(f, " (-inf, ")?,
                    }
                    match high {
                        Bound::Included(v) => write!(f, "{}]", v)?,
                        Bound::Excluded(v) => write!(f, "{})", v)?,
                        Bound::Unbounded => write!(f, "+inf)")?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}

/// Executable plan: an access path, a residual filter and an optional limit
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    access: AccessPath,
    residual: Option<QueryComponent>,
    limit: Option<usize>,
}

impl QueryPlan {
    /// Access path
    pub fn access(&self) -> &AccessPath {
        &self.access
    }

    /// Filter applied to every candidate record
    pub fn residual(&self) -> Option<&QueryComponent> {
        self.residual.as_ref()
    }

    /// Maximum number of records produced
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Name of the scanned index, for index plans
    pub fn index_name(&self) -> Option<&str> {
        match &self.access {
            AccessPath::Index { index_name, .. } => Some(index_name),
            AccessPath::Scan { .. } => None,
        }
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.access)?;
        if let Some(residual) = &self.residual {
            write!(f, " | {}", residual)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " | limit {}", limit)?;
        }
        Ok(())
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Candidate use of one index
struct Candidate<'a> {
    index: &'a Index,
    equals: Vec<Value>,
    low: Bound<Value>,
    high: Bound<Value>,
    has_range: bool,
    used: Vec<usize>,
}

impl Candidate<'_> {
    fn score(&self) -> (usize, bool) {
        (self.equals.len(), self.has_range)
    }
}

/// Plan `query` against `metadata`
///
/// # Errors
/// `Error::Schema` if the record type is unknown or the filter does not fit
/// its fields.
pub fn plan(metadata: &RecordMetaData, query: &RecordQuery) -> Result<QueryPlan> {
    let record_type = metadata.record_type(query.record_type())?;
    let filter = query
        .filter()
        .map(|f| f.normalize(metadata, record_type.message()))
        .transpose()?;

    let conjuncts: Vec<&QueryComponent> = filter
        .as_ref()
        .map(QueryComponent::conjuncts)
        .unwrap_or_default();

    let mut best: Option<Candidate<'_>> = None;
    for index in metadata.indexes_for(record_type.name()) {
        if let Some(candidate) = match_index(index, &conjuncts) {
            if best.as_ref().map_or(true, |b| candidate.score() > b.score()) {
                best = Some(candidate);
            }
        }
    }

    let plan = match best {
        Some(candidate) => {
            let rest: Vec<QueryComponent> = conjuncts
                .iter()
                .enumerate()
                .filter(|(i, _)| !candidate.used.contains(i))
                .map(|(_, c)| (*c).clone())
                .collect();
            QueryPlan {
                access: AccessPath::Index {
                    index_name: candidate.index.name().to_string(),
                    record_type: record_type.name().to_string(),
                    equals: candidate.equals,
                    low: candidate.low,
                    high: candidate.high,
                },
                residual: residual_of(rest),
                limit: query.limit(),
            }
        }
        None => QueryPlan {
            access: AccessPath::Scan {
                record_type: record_type.name().to_string(),
            },
            residual: filter,
            limit: query.limit(),
        },
    };
    debug!(record_type = record_type.name(), plan = %plan, "planned query");
    Ok(plan)
}

fn residual_of(mut rest: Vec<QueryComponent>) -> Option<QueryComponent> {
    match rest.len() {
        0 => None,
        1 => rest.pop(),
        _ => Some(QueryComponent::And(rest)),
    }
}

fn match_index<'a>(index: &'a Index, conjuncts: &[&QueryComponent]) -> Option<Candidate<'a>> {
    let mut candidate = Candidate {
        index,
        equals: Vec::new(),
        low: Bound::Unbounded,
        high: Bound::Unbounded,
        has_range: false,
        used: Vec::new(),
    };

    for path in index.root_expression().column_paths() {
        let [column] = path.as_slice() else {
            break;
        };

        let equality = conjuncts.iter().position(|c| {
            matches!(c, QueryComponent::Field { name, comparison: Comparison::Equals(_) } if name == column)
        });
        if let Some(i) = equality {
            if let QueryComponent::Field {
                comparison: Comparison::Equals(v),
                ..
            } = conjuncts[i]
            {
                candidate.equals.push(v.clone());
                candidate.used.push(i);
                continue;
            }
        }

        for (i, conjunct) in conjuncts.iter().enumerate() {
            let QueryComponent::Field { name, comparison } = conjunct else {
                continue;
            };
            if name != column {
                continue;
            }
            match comparison {
                Comparison::LessThan(v) => tighten_high(&mut candidate.high, Bound::Excluded(v.clone())),
                Comparison::LessThanOrEquals(v) => {
                    tighten_high(&mut candidate.high, Bound::Included(v.clone()))
                }
                Comparison::GreaterThan(v) => tighten_low(&mut candidate.low, Bound::Excluded(v.clone())),
                Comparison::GreaterThanOrEquals(v) => {
                    tighten_low(&mut candidate.low, Bound::Included(v.clone()))
                }
                _ => continue,
            }
            candidate.has_range = true;
            candidate.used.push(i);
        }
        if candidate.has_range && matches!(candidate.low, Bound::Unbounded) {
            // Nulls sort first in the index; a range never matches them.
            candidate.low = Bound::Excluded(Value::Null);
        }
        break;
    }

    if candidate.equals.is_empty() && !candidate.has_range {
        None
    } else {
        Some(candidate)
    }
}

fn bound_value(bound: &Bound<Value>) -> Option<&Value> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

fn tighten_low(current: &mut Bound<Value>, new: Bound<Value>) {
    use std::cmp::Ordering::*;
    let replace = match (bound_value(current), bound_value(&new)) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(cur), Some(v)) => match v.compare(cur) {
            Some(Greater) => true,
            Some(Equal) => matches!(new, Bound::Excluded(_)),
            _ => false,
        },
    };
    if replace {
        *current = new;
    }
}

fn tighten_high(current: &mut Bound<Value>, new: Bound<Value>) {
    use std::cmp::Ordering::*;
    let replace = match (bound_value(current), bound_value(&new)) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(cur), Some(v)) => match v.compare(cur) {
            Some(Less) => true,
            Some(Equal) => matches!(new, Bound::Excluded(_)),
            _ => false,
        },
    };
    if replace {
        *current = new;
    }
}
