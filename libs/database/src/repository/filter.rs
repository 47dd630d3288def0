//! Declarative filters and ordering for tenant-scoped listings.
//!
//! A filter document maps a field name to one of:
//! - a scalar: equality,
//! - an array: membership (`IN`),
//! - an object with any of `gte`, `lte`, `gt`, `lt`, `in`, `like`, `ilike`,
//!   all ANDed together.
//!
//! Field names that do not exist on the target entity are ignored, so a
//! misspelled field widens the result instead of failing the request.
//! Unknown *operators* are rejected.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::RepositoryError;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 200;

/// A typed filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FilterValue {
    /// Infers the operand type from a JSON scalar. Strings that parse as a
    /// UUID or an RFC 3339 timestamp become those types.
    pub fn from_json(value: &Value) -> Result<Self, RepositoryError> {
        match value {
            Value::String(s) => Ok(Self::infer_from_str(s)),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .ok_or_else(|| RepositoryError::InvalidFilter(format!("unsupported number {}", n))),
            other => Err(RepositoryError::InvalidFilter(format!(
                "expected a scalar operand, got {}",
                other
            ))),
        }
    }

    fn infer_from_str(s: &str) -> Self {
        if let Ok(id) = Uuid::parse_str(s) {
            return Self::Uuid(id);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Self::Timestamp(ts.with_timezone(&Utc));
        }
        Self::String(s.to_string())
    }

    /// Compares this operand with a serialized entity field. `None` means the
    /// two are not comparable (type mismatch), which never matches.
    pub fn compare_json(&self, field: &Value) -> Option<Ordering> {
        match (self, field) {
            (Self::Uuid(id), Value::String(s)) => Uuid::parse_str(s).ok().map(|v| v.cmp(id)),
            (Self::Timestamp(ts), Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|v| v.with_timezone(&Utc).cmp(ts)),
            (Self::String(expected), Value::String(s)) => Some(s.as_str().cmp(expected.as_str())),
            (Self::Int(expected), Value::Number(n)) => n
                .as_f64()
                .and_then(|v| v.partial_cmp(&(*expected as f64))),
            (Self::Float(expected), Value::Number(n)) => {
                n.as_f64().and_then(|v| v.partial_cmp(expected))
            }
            (Self::Bool(expected), Value::Bool(b)) => Some(b.cmp(expected)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(FilterValue),
    In(Vec<FilterValue>),
    Gte(FilterValue),
    Lte(FilterValue),
    Gt(FilterValue),
    Lt(FilterValue),
    Like(String),
    Ilike(String),
}

impl Predicate {
    fn parse(op: &str, operand: &Value) -> Result<Self, RepositoryError> {
        let scalar = || FilterValue::from_json(operand);
        let pattern = || {
            operand.as_str().map(str::to_string).ok_or_else(|| {
                RepositoryError::InvalidFilter(format!("'{}' expects a string pattern", op))
            })
        };

        match op {
            "eq" => Ok(Self::Eq(scalar()?)),
            "gte" => Ok(Self::Gte(scalar()?)),
            "lte" => Ok(Self::Lte(scalar()?)),
            "gt" => Ok(Self::Gt(scalar()?)),
            "lt" => Ok(Self::Lt(scalar()?)),
            "in" => Ok(Self::In(parse_list(operand)?)),
            "like" => Ok(Self::Like(pattern()?)),
            "ilike" => Ok(Self::Ilike(pattern()?)),
            other => Err(RepositoryError::InvalidFilter(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }

    /// Evaluates the predicate against a serialized field value.
    pub fn matches(&self, field: &Value) -> bool {
        match self {
            Self::Eq(v) => v.compare_json(field) == Some(Ordering::Equal),
            Self::In(values) => values
                .iter()
                .any(|v| v.compare_json(field) == Some(Ordering::Equal)),
            Self::Gte(v) => matches!(
                v.compare_json(field),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lte(v) => matches!(
                v.compare_json(field),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt(v) => v.compare_json(field) == Some(Ordering::Greater),
            Self::Lt(v) => v.compare_json(field) == Some(Ordering::Less),
            Self::Like(pattern) => field
                .as_str()
                .is_some_and(|s| like_match(pattern, s, false)),
            Self::Ilike(pattern) => field
                .as_str()
                .is_some_and(|s| like_match(pattern, s, true)),
        }
    }
}

fn parse_list(value: &Value) -> Result<Vec<FilterValue>, RepositoryError> {
    value
        .as_array()
        .ok_or_else(|| RepositoryError::InvalidFilter("'in' expects an array".to_string()))?
        .iter()
        .map(FilterValue::from_json)
        .collect()
}

/// SQL `LIKE` semantics: `%` matches any run, `_` matches one character.
fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text): (Vec<char>, Vec<char>) = if case_insensitive {
        (
            pattern.to_lowercase().chars().collect(),
            text.to_lowercase().chars().collect(),
        )
    } else {
        (pattern.chars().collect(), text.chars().collect())
    };

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

/// All predicates for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub predicates: Vec<Predicate>,
}

/// A conjunction of field filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    fields: Vec<FieldFilter>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate; repeated calls for one field AND together.
    pub fn with(mut self, field: impl Into<String>, predicate: Predicate) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|f| f.field == field) {
            Some(existing) => existing.predicates.push(predicate),
            None => self.fields.push(FieldFilter {
                field,
                predicates: vec![predicate],
            }),
        }
        self
    }

    pub fn eq(self, field: impl Into<String>, value: FilterValue) -> Self {
        self.with(field, Predicate::Eq(value))
    }

    /// Parses a JSON filter document.
    pub fn from_json(doc: &Value) -> Result<Self, RepositoryError> {
        let object = match doc {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => {
                return Err(RepositoryError::InvalidFilter(
                    "filter must be a JSON object".to_string(),
                ));
            }
        };

        let mut filters = Self::default();
        for (field, spec) in object {
            filters = match spec {
                Value::Array(_) => filters.with(field.as_str(), Predicate::In(parse_list(spec)?)),
                Value::Object(ops) => {
                    for (op, operand) in ops {
                        filters = filters.with(field.as_str(), Predicate::parse(op, operand)?);
                    }
                    filters
                }
                scalar => filters.eq(field.as_str(), FilterValue::from_json(scalar)?),
            };
        }
        Ok(filters)
    }

    /// Filters with any caller-supplied `tenant_id` removed. Tenant scoping is
    /// applied by the repository and cannot be overridden.
    pub fn without_tenant(&self) -> impl Iterator<Item = &FieldFilter> {
        self.fields.iter().filter(|f| f.field != "tenant_id")
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// In-memory evaluation against a serialized entity. Fields absent from
    /// the object are ignored.
    pub fn matches(&self, entity: &Value) -> bool {
        self.without_tenant().all(|f| match entity.get(&f.field) {
            Some(value) => f.predicates.iter().all(|p| p.matches(value)),
            None => true,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One ordering term, parsed from `field` or `-field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses a comma separated list such as `-created_at,name`.
    pub fn parse_list(spec: &str) -> Vec<OrderBy> {
        spec.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    /// The stable default: `created_at DESC, id DESC`.
    pub fn default_order() -> Vec<OrderBy> {
        vec![OrderBy::desc("created_at"), OrderBy::desc("id")]
    }

    /// True when `order` sorts the same way as the default once the
    /// tie-break is applied, e.g. `-created_at`.
    pub fn is_default_order(order: &[OrderBy]) -> bool {
        Self::with_tie_break(order) == Self::default_order()
    }

    /// Appends the `created_at DESC, id DESC` tie-break so every ordering is
    /// total.
    pub fn with_tie_break(order: &[OrderBy]) -> Vec<OrderBy> {
        let mut terms: Vec<OrderBy> = order.to_vec();
        for term in Self::default_order() {
            if !terms.iter().any(|t| t.field == term.field) {
                terms.push(term);
            }
        }
        terms
    }
}

impl FromStr for OrderBy {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (field, direction) = match s.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Desc),
            None => (s.strip_prefix('+').unwrap_or(s), SortDirection::Asc),
        };
        if field.is_empty() {
            return Err(RepositoryError::InvalidFilter("empty order field".to_string()));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Orders two serialized values the way Postgres orders the typed columns.
pub fn compare_json_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        // Postgres sorts NULL last in ascending order.
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => match (Uuid::parse_str(x), Uuid::parse_str(y)) {
                    (Ok(ux), Ok(uy)) => ux.cmp(&uy),
                    _ => x.cmp(y),
                },
            }
        }
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Listing parameters.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filters: Filters,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub cursor: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_order(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn effective_limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Ordering with the stable tie-break applied.
    pub fn effective_order(&self) -> Vec<OrderBy> {
        OrderBy::with_tie_break(&self.order_by)
    }

    /// Cursors encode `(created_at, id)`, which only describes a position
    /// under the default ordering.
    pub fn uses_default_order(&self) -> bool {
        OrderBy::is_default_order(&self.order_by)
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}
