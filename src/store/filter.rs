//! Query predicates evaluated against serialized rows
//!
//! Filters operate on the JSON form of each row so the gateway stays
//! schema-agnostic: equality, membership, and range comparisons on
//! top-level fields, with range semantics that understand numbers and
//! RFC-3339 timestamps.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A predicate over one row.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Matches every row.
    All,
    /// Field equals value.
    Eq(String, Value),
    /// Field is one of the given values.
    In(String, Vec<Value>),
    /// Field >= value (numeric or timestamp).
    Gte(String, Value),
    /// Field <= value (numeric or timestamp).
    Lte(String, Value),
    /// All sub-filters match.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn is_in(field: &str, values: Vec<Value>) -> Self {
        Filter::In(field.to_string(), values)
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(field.to_string(), value.into())
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Filter::Lte(field.to_string(), value.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// Evaluate this predicate against a serialized row.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, expected) => row.get(field.as_str()) == Some(expected),
            Filter::In(field, values) => row
                .get(field.as_str())
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Filter::Gte(field, bound) => compare(row.get(field.as_str()), bound)
                .map(|ord| ord != std::cmp::Ordering::Less)
                .unwrap_or(false),
            Filter::Lte(field, bound) => compare(row.get(field.as_str()), bound)
                .map(|ord| ord != std::cmp::Ordering::Greater)
                .unwrap_or(false),
            Filter::And(filters) => filters.iter().all(|f| f.matches(row)),
        }
    }
}

/// Compare a row field against a bound: numbers numerically, RFC-3339
/// strings chronologically, other strings lexically.
fn compare(field: Option<&Value>, bound: &Value) -> Option<std::cmp::Ordering> {
    let field = field?;
    if let (Some(a), Some(b)) = (field.as_f64(), bound.as_f64()) {
        return a.partial_cmp(&b);
    }
    let (a, b) = (field.as_str()?, bound.as_str()?);
    match (
        a.parse::<DateTime<Utc>>(),
        b.parse::<DateTime<Utc>>(),
    ) {
        (Ok(ta), Ok(tb)) => Some(ta.cmp(&tb)),
        _ => Some(a.cmp(b)),
    }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A filtered, ordered, paginated read.
#[derive(Debug, Clone)]
pub struct Query {
    pub filter: Filter,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self {
            filter: Filter::All,
            order_by: None,
            limit: None,
            offset: 0,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        self.order_by = Some((field.to_string(), Direction::Asc));
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order_by = Some((field.to_string(), Direction::Desc));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Sort rows in place per `order_by`.
    pub(crate) fn sort_rows(&self, rows: &mut [(Value, Vec<u8>)]) {
        if let Some((field, direction)) = &self.order_by {
            rows.sort_by(|(a, _), (b, _)| {
                let ord = compare(a.get(field.as_str()), b.get(field.as_str()).unwrap_or(&Value::Null))
                    .unwrap_or(std::cmp::Ordering::Equal);
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}
