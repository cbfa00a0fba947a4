//! Predicate evaluation against records.
//!
//! Rules:
//! - all filters are AND-combined
//! - `contains`, `startswith` and `endswith` ignore case
//! - `eq`, `neq` and `in` compare exactly; numbers and timestamps use natural ordering
//! - a null field value satisfies only `isnull`

use std::cmp::Ordering;

use crate::schema::FieldRegistry;
use crate::types::{FieldValue, Record};

use super::filter::{CompiledFilter, Predicate};

impl Predicate {
    /// Test a single field value.
    pub fn evaluate(&self, actual: &FieldValue) -> bool {
        if actual.is_null() {
            return matches!(self, Predicate::IsNull);
        }

        let cmp = |expected: &FieldValue| actual.compare(expected);

        match self {
            Predicate::Equals(v) => cmp(v) == Some(Ordering::Equal),
            Predicate::NotEquals(v) => matches!(cmp(v), Some(Ordering::Less | Ordering::Greater)),
            Predicate::GreaterThan(v) => cmp(v) == Some(Ordering::Greater),
            Predicate::GreaterOrEqual(v) => {
                matches!(cmp(v), Some(Ordering::Greater | Ordering::Equal))
            }
            Predicate::LessThan(v) => cmp(v) == Some(Ordering::Less),
            Predicate::LessOrEqual(v) => matches!(cmp(v), Some(Ordering::Less | Ordering::Equal)),
            Predicate::Between(lo, hi) => {
                matches!(cmp(lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(cmp(hi), Some(Ordering::Less | Ordering::Equal))
            }
            Predicate::InSet(values) => values.iter().any(|v| cmp(v) == Some(Ordering::Equal)),
            Predicate::Contains(needle) => {
                text_matches(actual, needle, |hay, needle| hay.contains(needle))
            }
            Predicate::StartsWith(prefix) => {
                text_matches(actual, prefix, |hay, prefix| hay.starts_with(prefix))
            }
            Predicate::EndsWith(suffix) => {
                text_matches(actual, suffix, |hay, suffix| hay.ends_with(suffix))
            }
            Predicate::IsTrue => *actual == FieldValue::Boolean(true),
            Predicate::IsFalse => *actual == FieldValue::Boolean(false),
            Predicate::IsNull => false,
        }
    }
}

fn text_matches(actual: &FieldValue, operand: &str, test: impl Fn(&str, &str) -> bool) -> bool {
    match actual {
        FieldValue::Text(hay) => test(&hay.to_lowercase(), &operand.to_lowercase()),
        _ => false,
    }
}

impl CompiledFilter {
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.predicate.evaluate(&record.value_of(self.field.name))
    }
}

/// Free-text search across the registry's searchable fields.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchTerm {
    term: String,
    needle: String,
    fields: Vec<&'static str>,
}

impl SearchTerm {
    /// Returns `None` for a blank term.
    pub fn new(registry: &FieldRegistry, term: &str) -> Option<Self> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            term: trimmed.to_string(),
            needle: trimmed.to_lowercase(),
            fields: registry.searchable().map(|f| f.name).collect(),
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.fields.iter().any(|field| match record.value_of(field) {
            FieldValue::Text(text) => text.to_lowercase().contains(&self.needle),
            _ => false,
        })
    }
}

/// The full predicate set handed to a record store.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria {
    pub filters: Vec<CompiledFilter>,
    pub search: Option<SearchTerm>,
}

impl Criteria {
    pub fn new(filters: Vec<CompiledFilter>) -> Self {
        Self {
            filters,
            search: None,
        }
    }

    /// Everything matches.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: Option<SearchTerm>) -> Self {
        self.search = search;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.search.is_none()
    }

    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.filters.iter().all(|f| f.matches(record))
            && self.search.as_ref().map_or(true, |s| s.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::{FilterCompiler, RawFilter};
    use crate::types::{Product, ProductId, ProductInput};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn product(id: u64, title: &str, price: f64, description: Option<&str>) -> Product {
        let now = Utc.with_ymd_and_hms(2024, 1, id as u32, 0, 0, 0).unwrap();
        let mut input = ProductInput::new(title, "Electronics", price, 10);
        input.description = description.map(str::to_string);
        Product::from_input(ProductId(id), input, now).unwrap()
    }

    fn filter(field: &str, op: &str, value: Value) -> CompiledFilter {
        let registry = FieldRegistry::products();
        FilterCompiler::new(&registry)
            .compile_one(&RawFilter::new(field, op, value))
            .unwrap()
    }

    #[test]
    fn test_between_inclusive() {
        let f = filter("price", "between", json!([10, 20]));
        assert!(f.matches(&product(1, "a", 10.0, None)));
        assert!(f.matches(&product(1, "a", 20.0, None)));
        assert!(f.matches(&product(1, "a", 10.5, None)));
        assert!(!f.matches(&product(1, "a", 20.01, None)));
    }

    #[test]
    fn test_inverted_between_matches_nothing() {
        let f = filter("price", "between", json!([10, 5]));
        for price in [4.0, 5.0, 7.5, 10.0, 11.0] {
            assert!(!f.matches(&product(1, "a", price, None)));
        }
    }

    #[test]
    fn test_text_operators_ignore_case() {
        let p = product(1, "Wireless Mouse", 10.0, None);
        assert!(filter("title", "contains", json!("MOUSE")).matches(&p));
        assert!(filter("title", "startswith", json!("wire")).matches(&p));
        assert!(filter("title", "endswith", json!("OUSE")).matches(&p));
        assert!(!filter("title", "startswith", json!("mouse")).matches(&p));
    }

    #[test]
    fn test_equality_is_exact() {
        let p = product(1, "Lamp", 10.0, None);
        assert!(filter("title", "eq", json!("Lamp")).matches(&p));
        assert!(!filter("title", "eq", json!("lamp")).matches(&p));
        assert!(filter("title", "neq", json!("lamp")).matches(&p));
    }

    #[test]
    fn test_null_only_satisfies_isnull() {
        let p = product(1, "Lamp", 10.0, None);
        assert!(filter("description", "isnull", Value::Null).matches(&p));
        assert!(!filter("description", "neq", json!("x")).matches(&p));
        assert!(!filter("description", "contains", json!("")).matches(&p));

        let described = product(2, "Lamp", 10.0, Some("warm"));
        assert!(!filter("description", "isnull", Value::Null).matches(&described));
        assert!(filter("description", "neq", json!("x")).matches(&described));
    }

    #[test]
    fn test_flags() {
        let mut p = product(1, "Lamp", 10.0, None);
        assert!(filter("available", "istrue", Value::Null).matches(&p));
        p.available = false;
        assert!(filter("available", "isfalse", Value::Null).matches(&p));
        assert!(!filter("available", "istrue", Value::Null).matches(&p));
    }

    #[test]
    fn test_in_set_and_timestamps() {
        let p = product(3, "Lamp", 12.5, None);
        assert!(filter("price", "in", json!([1, 12.5])).matches(&p));
        assert!(!filter("price", "in", json!([1, 12])).matches(&p));
        assert!(filter("created_at", "gte", json!("2024-01-03")).matches(&p));
        assert!(!filter("created_at", "gt", json!("2024-01-03T00:00:00Z")).matches(&p));
    }

    #[test]
    fn test_criteria_and_search() {
        let registry = FieldRegistry::products();
        let p = product(1, "Lamp", 15.0, Some("Warm light SKU 1"));
        let criteria = Criteria::new(vec![filter("price", "gt", json!(10))])
            .with_search(SearchTerm::new(&registry, "  sku "));
        assert!(criteria.matches(&p));

        let criteria = criteria.with_search(SearchTerm::new(&registry, "desk"));
        assert!(!criteria.matches(&p));

        assert!(SearchTerm::new(&registry, "   ").is_none());
        assert!(Criteria::all().matches(&p));
    }
}
