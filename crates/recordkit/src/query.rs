//! Query construction: predicates, sort keys, limits and paging cursors.

use crate::mapping::RecordMapping;
use crate::types::{FieldValue, Record};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    BeginsWith,
    In,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub operator: ComparisonOperator,
    pub value: FieldValue,
}

impl Comparison {
    /// A record lacking the field never matches.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.get(&self.field) else {
            return false;
        };
        match self.operator {
            ComparisonOperator::Equals => actual.compare(&self.value) == Some(Ordering::Equal),
            ComparisonOperator::NotEquals => actual.compare(&self.value) != Some(Ordering::Equal),
            ComparisonOperator::LessThan => actual.compare(&self.value) == Some(Ordering::Less),
            ComparisonOperator::LessThanOrEquals => matches!(
                actual.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            ComparisonOperator::GreaterThan => {
                actual.compare(&self.value) == Some(Ordering::Greater)
            }
            ComparisonOperator::GreaterThanOrEquals => matches!(
                actual.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ComparisonOperator::BeginsWith => match (actual, &self.value) {
                (FieldValue::Text(actual), FieldValue::Text(prefix)) => {
                    actual.starts_with(prefix.as_str())
                }
                _ => false,
            },
            ComparisonOperator::In => match &self.value {
                FieldValue::List(candidates) => candidates
                    .iter()
                    .any(|candidate| actual.compare(candidate) == Some(Ordering::Equal)),
                _ => false,
            },
        }
    }
}

/// Builds comparisons against one field.
#[derive(Clone, Debug)]
pub struct FieldCondition {
    field: String,
}

impl FieldCondition {
    fn compare(self, operator: ComparisonOperator, value: impl Into<FieldValue>) -> Comparison {
        Comparison {
            field: self.field,
            operator,
            value: value.into(),
        }
    }

    pub fn equals(self, value: impl Into<FieldValue>) -> Comparison {
        self.compare(ComparisonOperator::Equals, value)
    }

    pub fn not_equals(self, value: impl Into<FieldValue>) -> Comparison {
        self.compare(ComparisonOperator::NotEquals, value)
    }

    pub fn less_than(self, value: impl Into<FieldValue>) -> Comparison {
        self.compare(ComparisonOperator::LessThan, value)
    }

    pub fn at_most(self, value: impl Into<FieldValue>) -> Comparison {
        self.compare(ComparisonOperator::LessThanOrEquals, value)
    }

    pub fn greater_than(self, value: impl Into<FieldValue>) -> Comparison {
        self.compare(ComparisonOperator::GreaterThan, value)
    }

    pub fn at_least(self, value: impl Into<FieldValue>) -> Comparison {
        self.compare(ComparisonOperator::GreaterThanOrEquals, value)
    }

    pub fn begins_with(self, prefix: impl Into<String>) -> Comparison {
        self.compare(ComparisonOperator::BeginsWith, FieldValue::Text(prefix.into()))
    }

    pub fn is_in<V: Into<FieldValue>>(self, values: impl IntoIterator<Item = V>) -> Comparison {
        let values = values.into_iter().map(Into::into).collect::<Vec<_>>();
        self.compare(ComparisonOperator::In, FieldValue::List(values))
    }
}

/// Filter restricting which records a query matches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    #[default]
    All,
    And(Vec<Comparison>),
}

impl Predicate {
    pub fn all() -> Self {
        Self::All
    }

    pub fn field(name: impl Into<String>) -> FieldCondition {
        FieldCondition { field: name.into() }
    }

    pub fn and(comparisons: impl IntoIterator<Item = Comparison>) -> Self {
        let comparisons = comparisons.into_iter().collect::<Vec<_>>();
        if comparisons.is_empty() {
            Self::All
        } else {
            Self::And(comparisons)
        }
    }

    /// Adds one more conjunct.
    pub fn with(self, comparison: Comparison) -> Self {
        match self {
            Self::All => Self::And(vec![comparison]),
            Self::And(mut comparisons) => {
                comparisons.push(comparison);
                Self::And(comparisons)
            }
        }
    }

    pub fn comparisons(&self) -> &[Comparison] {
        match self {
            Self::All => &[],
            Self::And(comparisons) => comparisons,
        }
    }

    pub fn is_match_all(&self) -> bool {
        self.comparisons().is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.comparisons()
            .iter()
            .all(|comparison| comparison.matches(record))
    }
}

impl From<Comparison> for Predicate {
    fn from(comparison: Comparison) -> Self {
        Self::And(vec![comparison])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

/// Orders records by `sort_keys`, primary key first. Missing fields sort first.
pub fn compare_records(left: &Record, right: &Record, sort_keys: &[SortKey]) -> Ordering {
    for key in sort_keys {
        let ordering = match (left.get(&key.field), right.get(&key.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(left), Some(right)) => left.compare(right).unwrap_or(Ordering::Equal),
        };
        let ordering = if key.ascending {
            ordering
        } else {
            ordering.reverse()
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Immutable description of one fetch invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub record_type: String,
    pub predicate: Predicate,
    pub sort_keys: Vec<SortKey>,
    /// Ceiling on records returned by one invocation. `None` leaves the
    /// ceiling to the service.
    pub limit: Option<usize>,
    /// Fields to return. `None` returns every field.
    pub desired_keys: Option<Vec<String>>,
}

impl QuerySpec {
    pub fn for_type<T: RecordMapping>() -> QueryBuilder {
        QueryBuilder::new(T::RECORD_TYPE)
    }
}

pub fn build_query(
    record_type: impl Into<String>,
    predicate: Predicate,
    sort_keys: Option<Vec<SortKey>>,
    limit: Option<usize>,
) -> QuerySpec {
    QuerySpec {
        record_type: record_type.into(),
        predicate,
        sort_keys: sort_keys.unwrap_or_default(),
        limit: limit.filter(|limit| *limit > 0),
        desired_keys: None,
    }
}

#[derive(Clone, Debug)]
pub struct QueryBuilder {
    spec: QuerySpec,
}

impl QueryBuilder {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            spec: build_query(record_type, Predicate::All, None, None),
        }
    }

    pub fn filter(mut self, comparison: Comparison) -> Self {
        self.spec.predicate = self.spec.predicate.with(comparison);
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.spec.predicate = predicate;
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.spec.sort_keys.push(key);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.spec.limit = Some(limit).filter(|limit| *limit > 0);
        self
    }

    pub fn desired_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.spec.desired_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> QuerySpec {
        self.spec
    }
}

/// Opaque continuation token returned with a partial result set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryCursor(String);

impl QueryCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fetch invocation's decoded records plus the cursor to continue from.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPage<T> {
    pub items: Vec<T>,
    pub cursor: Option<QueryCursor>,
}

impl<T> QueryPage<T> {
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}
