//! Query execution against a record store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::store::RecordStore;
use crate::types::Product;

use super::filter::AppliedFilter;
use super::pagination::PaginationSpec;
use super::predicate::Criteria;
use super::sort::{AppliedSort, SortTerms};

/// Cooperative cancellation flag shared between a caller and a running query.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CatalogError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One page of matching records plus the metadata needed to describe it.
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub items: Vec<Product>,
    /// Matching records across all pages, computed from the same snapshot
    /// as `items` when the store supports it.
    pub total: usize,
    pub pagination: PaginationSpec,
    pub applied_sort: Vec<AppliedSort>,
    pub applied_filters: Vec<AppliedFilter>,
    pub search: Option<String>,
    pub next_offset: Option<usize>,
    pub prev_offset: Option<usize>,
}

/// Runs compiled queries. Holds no state between calls.
pub struct QueryExecutor<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> QueryExecutor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn execute(
        &self,
        criteria: &Criteria,
        sort: &SortTerms,
        pagination: PaginationSpec,
        cancel: &Cancellation,
    ) -> Result<QueryResult> {
        cancel.check()?;

        let page = self
            .store
            .page(criteria, sort, pagination.offset, pagination.limit, cancel)?;

        debug!(
            filters = criteria.filters.len(),
            search = criteria.search.is_some(),
            sort = %sort.to_spec(),
            offset = pagination.offset,
            limit = pagination.limit,
            total = page.total,
            returned = page.items.len(),
            "list query executed"
        );

        Ok(QueryResult {
            next_offset: pagination.next_offset(page.total),
            prev_offset: pagination.prev_offset(),
            items: page.items,
            total: page.total,
            pagination,
            applied_sort: sort.applied(),
            applied_filters: criteria.filters.iter().map(|f| f.applied()).collect(),
            search: criteria.search.as_ref().map(|s| s.term().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::{FilterCompiler, RawFilter};
    use crate::query::pagination::PaginationNormalizer;
    use crate::query::sort::SortCompiler;
    use crate::schema::FieldRegistry;
    use crate::store::MemoryStore;
    use crate::types::ProductInput;
    use chrono::Utc;
    use serde_json::json;

    fn store_with(prices: &[f64]) -> MemoryStore {
        let store = MemoryStore::new();
        for (i, price) in prices.iter().enumerate() {
            store
                .insert(
                    ProductInput::new(format!("Item {i}"), "Electronics", *price, 5),
                    Utc::now(),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_execute_counts_and_windows() {
        let store = store_with(&[5.0, 12.0, 15.0, 18.0, 30.0]);
        let registry = FieldRegistry::products();
        let filters = FilterCompiler::new(&registry)
            .compile(&[RawFilter::new("price", "between", json!([10, 20]))])
            .unwrap();
        let sort = SortCompiler::new(&registry).compile(Some("price,desc")).unwrap();
        let pagination = PaginationNormalizer::default()
            .normalize(None, None, Some(2), None)
            .unwrap();

        let result = QueryExecutor::new(&store)
            .execute(&Criteria::new(filters), &sort, pagination, &Cancellation::new())
            .unwrap();

        assert_eq!(result.total, 3);
        let prices: Vec<f64> = result.items.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![18.0, 15.0]);
        assert_eq!(result.next_offset, Some(2));
        assert_eq!(result.prev_offset, None);
        assert_eq!(result.applied_filters.len(), 1);
        assert_eq!(result.applied_sort.len(), 2);
    }

    #[test]
    fn test_cancelled_before_start() {
        let store = store_with(&[1.0]);
        let registry = FieldRegistry::products();
        let sort = SortCompiler::new(&registry).compile(None).unwrap();
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = QueryExecutor::new(&store)
            .execute(
                &Criteria::all(),
                &sort,
                PaginationNormalizer::default().normalize(None, None, None, None).unwrap(),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, CatalogError::Cancelled));
    }

    #[test]
    fn test_cancellation_is_shared() {
        let cancel = Cancellation::new();
        let other = cancel.clone();
        assert!(cancel.check().is_ok());
        other.cancel();
        assert!(cancel.is_cancelled());
    }
}
