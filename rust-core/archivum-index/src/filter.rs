// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Filters, sorting and pagination over indexed documents.
//!
//! Documents are matched in their JSON form, so any field of any indexed
//! type can be filtered or sorted on. Nested fields use dotted names
//! (`permissions.users.READ`); array fields match if any element matches.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IndexError;

/// Default page size when the caller does not choose one.
pub const DEFAULT_LIMIT: usize = 100;

/// One conjunct of a [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterParameter {
    /// Field equals the value.
    Simple { field: String, value: String },
    /// Field equals any of the values.
    OneOf { field: String, values: Vec<String> },
    /// Field lies within the inclusive bounds. Numbers compare numerically,
    /// everything else as text.
    Range {
        field: String,
        from: Option<String>,
        to: Option<String>,
    },
    /// Field is missing, null, blank or an empty list.
    Empty { field: String },
}

impl FilterParameter {
    pub fn field(&self) -> &str {
        match self {
            FilterParameter::Simple { field, .. }
            | FilterParameter::OneOf { field, .. }
            | FilterParameter::Range { field, .. }
            | FilterParameter::Empty { field } => field,
        }
    }

    fn matches(&self, doc: &Value) -> bool {
        let values = values_at(doc, self.field());
        match self {
            FilterParameter::Simple { value, .. } => values
                .iter()
                .any(|v| scalar_text(v).as_deref() == Some(value.as_str())),
            FilterParameter::OneOf { values: wanted, .. } => values.iter().any(|v| {
                scalar_text(v)
                    .map(|text| wanted.iter().any(|w| *w == text))
                    .unwrap_or(false)
            }),
            FilterParameter::Range { from, to, .. } => values.iter().any(|v| {
                if scalar_text(v).is_none() {
                    return false;
                }
                let above = from
                    .as_deref()
                    .map(|bound| compare_to_bound(v, bound) != Ordering::Less)
                    .unwrap_or(true);
                let below = to
                    .as_deref()
                    .map(|bound| compare_to_bound(v, bound) != Ordering::Greater)
                    .unwrap_or(true);
                above && below
            }),
            FilterParameter::Empty { .. } => values
                .iter()
                .all(|v| scalar_text(v).map(|t| t.is_empty()).unwrap_or(true)),
        }
    }
}

/// A conjunction of parameters. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub parameters: Vec<FilterParameter>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(parameters: Vec<FilterParameter>) -> Self {
        Self { parameters }
    }

    pub fn simple(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::all().and_simple(field, value)
    }

    pub fn and_simple(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(FilterParameter::Simple {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn and_one_of<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.push(FilterParameter::OneOf {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn and_range(
        mut self,
        field: impl Into<String>,
        from: Option<String>,
        to: Option<String>,
    ) -> Self {
        self.parameters.push(FilterParameter::Range {
            field: field.into(),
            from,
            to,
        });
        self
    }

    pub fn and_empty(mut self, field: impl Into<String>) -> Self {
        self.parameters.push(FilterParameter::Empty { field: field.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        for parameter in &self.parameters {
            if parameter.field().trim().is_empty() {
                return Err(IndexError::InvalidFilter("blank field name".to_string()));
            }
            if let FilterParameter::Range { from: None, to: None, field } = parameter {
                return Err(IndexError::InvalidFilter(format!(
                    "range on '{field}' has no bounds"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.parameters.iter().all(|p| p.matches(doc))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortParameter {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// Ordered sort keys. Ties, and the empty sorter, fall back to the
/// document id so pages are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    pub parameters: Vec<SortParameter>,
}

impl Sorter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self::none().then(field, false)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::none().then(field, true)
    }

    pub fn then(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.parameters.push(SortParameter {
            field: field.into(),
            descending,
        });
        self
    }

    /// Compare two `(id, document)` pairs.
    pub fn compare(&self, a: (&str, &Value), b: (&str, &Value)) -> Ordering {
        for parameter in &self.parameters {
            let left = values_at(a.1, &parameter.field).into_iter().next();
            let right = values_at(b.1, &parameter.field).into_iter().next();
            let ordering = compare_values(left, right);
            let ordering = if parameter.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.0.cmp(b.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sublist {
    pub offset: usize,
    pub limit: usize,
}

impl Sublist {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn all() -> Self {
        Self::new(0, usize::MAX)
    }
}

impl Default for Sublist {
    fn default() -> Self {
        Self::new(0, DEFAULT_LIMIT)
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexResult<T> {
    /// Matches before pagination.
    pub total_count: u64,
    pub offset: usize,
    /// Number of results actually returned.
    pub limit: usize,
    pub results: Vec<T>,
}

/// Values found at a dotted field path. Arrays are flattened one level.
fn values_at<'a>(doc: &'a Value, field: &str) -> Vec<&'a Value> {
    let mut current = Some(doc);
    for part in field.split('.') {
        current = current.and_then(|v| v.get(part));
    }
    match current {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(value) => vec![value],
        None => Vec::new(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare_to_bound(value: &Value, bound: &str) -> Ordering {
    if let (Some(number), Ok(bound)) = (value.as_f64(), bound.parse::<f64>()) {
        return number.partial_cmp(&bound).unwrap_or(Ordering::Equal);
    }
    match scalar_text(value) {
        Some(text) => text.as_str().cmp(bound),
        None => Ordering::Less,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => scalar_text(a).cmp(&scalar_text(b)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "id": "A",
            "parent_id": null,
            "title": "",
            "level": "fonds",
            "representation_count": 2,
            "date_initial": "2001-05-01",
            "permissions": {"users": {"READ": ["alice", "bob"]}},
            "tags": []
        })
    }

    #[test]
    fn test_simple_and_one_of() {
        assert!(Filter::simple("id", "A").matches(&doc()));
        assert!(!Filter::simple("id", "B").matches(&doc()));
        assert!(Filter::simple("representation_count", "2").matches(&doc()));
        assert!(Filter::all().and_one_of("level", ["series", "fonds"]).matches(&doc()));
        assert!(Filter::simple("permissions.users.READ", "bob").matches(&doc()));
        assert!(!Filter::simple("missing", "x").matches(&doc()));
    }

    #[test]
    fn test_empty_matches_missing_null_blank_and_empty_list() {
        for field in ["parent_id", "title", "tags", "nonexistent"] {
            assert!(Filter::all().and_empty(field).matches(&doc()), "{field}");
        }
        assert!(!Filter::all().and_empty("level").matches(&doc()));
    }

    #[test]
    fn test_range() {
        let d = doc();
        let within = Filter::all().and_range(
            "date_initial",
            Some("2001-01-01".into()),
            Some("2001-12-31".into()),
        );
        assert!(within.matches(&d));
        let after = Filter::all().and_range("date_initial", Some("2002".into()), None);
        assert!(!after.matches(&d));
        let numeric = Filter::all().and_range("representation_count", Some("10".into()), None);
        // 2 < 10 numerically even though "2" > "10" as text.
        assert!(!numeric.matches(&d));
    }

    #[test]
    fn test_conjunction() {
        let f = Filter::simple("id", "A").and_simple("level", "series");
        assert!(!f.matches(&doc()));
        assert!(Filter::all().matches(&doc()));
    }

    #[test]
    fn test_validate() {
        assert!(Filter::simple(" ", "x").validate().is_err());
        assert!(Filter::all().and_range("x", None, None).validate().is_err());
        assert!(Filter::simple("id", "x").validate().is_ok());
    }

    #[test]
    fn test_sorter_ties_break_on_id() {
        let a = json!({"level": "fonds"});
        let b = json!({"level": "fonds"});
        let sorter = Sorter::ascending("level");
        assert_eq!(sorter.compare(("a", &a), ("b", &b)), Ordering::Less);
        assert_eq!(
            Sorter::descending("level").compare(("b", &b), ("a", &a)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_sorter_missing_first_and_numeric() {
        let none = json!({});
        let two = json!({"n": 2});
        let ten = json!({"n": 10});
        let sorter = Sorter::ascending("n");
        assert_eq!(sorter.compare(("x", &none), ("y", &two)), Ordering::Less);
        assert_eq!(sorter.compare(("x", &two), ("y", &ten)), Ordering::Less);
    }

    #[test]
    fn test_filter_serde_tagging() {
        let f = Filter::simple("id", "A").and_empty("parent_id");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["parameters"][0]["kind"], "simple");
        assert_eq!(json["parameters"][1]["kind"], "empty");
        let back: Filter = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);
    }
}
