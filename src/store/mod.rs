//! Record storage.
//!
//! `RecordStore` is the seam between the query/mutation paths and whatever
//! keeps the products. Two implementations ship with the crate:
//!
//! - `MemoryStore`: an ordered map behind a read/write lock
//! - `FileStore`: a `MemoryStore` rebuilt from, and journaled to, a directory

mod file;
mod journal;
mod memory;

pub use file::{FileStore, StoreConfig};
pub use journal::{Journal, JournalEntry};
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::query::{Cancellation, Criteria, SortTerms};
use crate::types::{Product, ProductId, ProductInput, ProductPatch};

/// Records polled between cancellation checks during a scan.
pub(crate) const CANCEL_POLL_INTERVAL: usize = 256;

/// One window of matching records and the total they were drawn from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Product>,
    pub total: usize,
}

/// Storage collaborator for products.
pub trait RecordStore: Send + Sync {
    /// Number of stored products.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch one product; `RecordNotFound` when absent.
    fn get(&self, id: ProductId) -> Result<Product>;

    /// Store a new product under a freshly assigned id.
    fn insert(&self, input: ProductInput, now: DateTime<Utc>) -> Result<Product>;

    /// Apply a patch; `RecordNotFound` when absent.
    fn update(&self, id: ProductId, patch: &ProductPatch, now: DateTime<Utc>) -> Result<Product>;

    /// Remove a product, returning its last state; `RecordNotFound` when absent.
    fn delete(&self, id: ProductId) -> Result<Product>;

    /// Number of products matching `criteria`.
    fn count(&self, criteria: &Criteria, cancel: &Cancellation) -> Result<usize>;

    /// Ordered window of products matching `criteria`.
    fn scan(
        &self,
        criteria: &Criteria,
        sort: &SortTerms,
        offset: usize,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<Vec<Product>>;

    /// Count and window together. The default runs `count` then `scan`, so
    /// `total` may drift from `items` if a write lands in between;
    /// implementations that can read a single snapshot should override it.
    fn page(
        &self,
        criteria: &Criteria,
        sort: &SortTerms,
        offset: usize,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<Page> {
        let total = self.count(criteria, cancel)?;
        let items = self.scan(criteria, sort, offset, limit, cancel)?;
        Ok(Page { items, total })
    }
}

/// Filter, order and window a set of products, polling `cancel` as it goes.
pub(crate) fn select<'a>(
    products: impl Iterator<Item = &'a Product>,
    criteria: &Criteria,
    sort: &SortTerms,
    offset: usize,
    limit: usize,
    cancel: &Cancellation,
) -> Result<Page> {
    let mut matched = Vec::new();
    for (i, product) in products.enumerate() {
        if i % CANCEL_POLL_INTERVAL == 0 {
            cancel.check()?;
        }
        if criteria.matches(product) {
            matched.push(product);
        }
    }
    cancel.check()?;

    let total = matched.len();
    matched.sort_by(|a, b| sort.compare(*a, *b));
    let items = matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    Ok(Page { items, total })
}

/// Count matches, polling `cancel` as it goes.
pub(crate) fn count_matching<'a>(
    products: impl Iterator<Item = &'a Product>,
    criteria: &Criteria,
    cancel: &Cancellation,
) -> Result<usize> {
    let mut total = 0;
    for (i, product) in products.enumerate() {
        if i % CANCEL_POLL_INTERVAL == 0 {
            cancel.check()?;
        }
        if criteria.matches(product) {
            total += 1;
        }
    }
    Ok(total)
}
