//! In-memory product store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{CatalogError, Result};
use crate::query::{Cancellation, Criteria, SortTerms};
use crate::types::{Product, ProductId, ProductInput, ProductPatch};

use super::{count_matching, select, Page, RecordStore};

/// Products keyed by id plus the id allocator.
#[derive(Debug)]
pub(crate) struct ProductTable {
    products: BTreeMap<ProductId, Product>,
    next_id: ProductId,
}

impl Default for ProductTable {
    fn default() -> Self {
        Self {
            products: BTreeMap::new(),
            next_id: ProductId(1),
        }
    }
}

impl ProductTable {
    /// Reserve the next id. Ids are never handed out twice.
    pub(crate) fn allocate(&mut self) -> Result<ProductId> {
        let id = self.next_id;
        self.next_id = id
            .next()
            .ok_or_else(|| CatalogError::Internal("product id space exhausted".into()))?;
        Ok(id)
    }

    pub(crate) fn next_id(&self) -> ProductId {
        self.next_id
    }

    /// Keep the allocator ahead of `id`. An id with no successor can only
    /// come from a damaged journal.
    pub(crate) fn observe(&mut self, id: ProductId) -> Result<()> {
        let next = id
            .next()
            .ok_or_else(|| CatalogError::Corruption(format!("product id {id} out of range")))?;
        self.advance_to(next);
        Ok(())
    }

    /// Never allocate below `next_id`.
    pub(crate) fn advance_to(&mut self, next_id: ProductId) {
        if next_id > self.next_id {
            self.next_id = next_id;
        }
    }

    pub(crate) fn get(&self, id: ProductId) -> Result<&Product> {
        self.products.get(&id).ok_or(CatalogError::RecordNotFound(id))
    }

    pub(crate) fn put(&mut self, product: Product) -> Result<()> {
        self.observe(product.id)?;
        self.products.insert(product.id, product);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: ProductId) -> Result<Product> {
        self.products
            .remove(&id)
            .ok_or(CatalogError::RecordNotFound(id))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.products.len()
    }
}

/// Products held in an ordered map behind a read/write lock.
///
/// `page` computes the total and the window under one read lock, so the two
/// always agree.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<ProductTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_table(table: ProductTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Run `f` with exclusive access to the table.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&mut ProductTable) -> Result<T>) -> Result<T> {
        f(&mut self.table.write())
    }

    /// Run `f` with shared access to the table.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&ProductTable) -> T) -> T {
        f(&self.table.read())
    }
}

impl RecordStore for MemoryStore {
    fn len(&self) -> usize {
        self.table.read().len()
    }

    fn get(&self, id: ProductId) -> Result<Product> {
        self.table.read().get(id).cloned()
    }

    fn insert(&self, input: ProductInput, now: DateTime<Utc>) -> Result<Product> {
        self.write(|table| {
            let product = Product::from_input(table.allocate()?, input, now)?;
            table.put(product.clone())?;
            Ok(product)
        })
    }

    fn update(&self, id: ProductId, patch: &ProductPatch, now: DateTime<Utc>) -> Result<Product> {
        self.write(|table| {
            let product = table.get(id)?.patched(patch, now)?;
            table.put(product.clone())?;
            Ok(product)
        })
    }

    fn delete(&self, id: ProductId) -> Result<Product> {
        self.write(|table| table.remove(id))
    }

    fn count(&self, criteria: &Criteria, cancel: &Cancellation) -> Result<usize> {
        count_matching(self.table.read().iter(), criteria, cancel)
    }

    fn scan(
        &self,
        criteria: &Criteria,
        sort: &SortTerms,
        offset: usize,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<Vec<Product>> {
        Ok(self.page(criteria, sort, offset, limit, cancel)?.items)
    }

    fn page(
        &self,
        criteria: &Criteria,
        sort: &SortTerms,
        offset: usize,
        limit: usize,
        cancel: &Cancellation,
    ) -> Result<Page> {
        let table = self.table.read();
        select(table.iter(), criteria, sort, offset, limit, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortCompiler;
    use crate::schema::FieldRegistry;

    fn input(title: &str, price: f64) -> ProductInput {
        ProductInput::new(title, "Electronics", price, 3)
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.insert(input("a", 1.0), Utc::now()).unwrap();
        let b = store.insert(input("b", 2.0), Utc::now()).unwrap();
        assert_eq!(a.id, ProductId(1));
        assert_eq!(b.id, ProductId(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = MemoryStore::new();
        let a = store.insert(input("a", 1.0), Utc::now()).unwrap();
        store.delete(a.id).unwrap();
        let b = store.insert(input("b", 1.0), Utc::now()).unwrap();
        assert_eq!(b.id, ProductId(2));
    }

    #[test]
    fn test_missing_records() {
        let store = MemoryStore::new();
        let id = ProductId(42);
        assert!(store.get(id).unwrap_err().is_not_found());
        assert!(store
            .update(id, &ProductPatch::default(), Utc::now())
            .unwrap_err()
            .is_not_found());
        assert!(store.delete(id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_patches_in_place() {
        let store = MemoryStore::new();
        let a = store.insert(input("a", 1.0), Utc::now()).unwrap();
        let patch = ProductPatch {
            price: Some(3.5),
            ..Default::default()
        };
        let updated = store.update(a.id, &patch, Utc::now()).unwrap();
        assert_eq!(updated.price, 3.5);
        assert_eq!(store.get(a.id).unwrap().price, 3.5);
    }

    #[test]
    fn test_page_past_end_keeps_total() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store.insert(input(&format!("p{i}"), 1.0), Utc::now()).unwrap();
        }
        let registry = FieldRegistry::products();
        let sort = SortCompiler::new(&registry).compile(None).unwrap();
        let page = store
            .page(&Criteria::all(), &sort, 10, 5, &Cancellation::new())
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_cancelled_scan() {
        let store = MemoryStore::new();
        store.insert(input("a", 1.0), Utc::now()).unwrap();
        let registry = FieldRegistry::products();
        let sort = SortCompiler::new(&registry).compile(None).unwrap();
        let cancel = Cancellation::new();
        cancel.cancel();
        assert!(matches!(
            store.count(&Criteria::all(), &cancel),
            Err(CatalogError::Cancelled)
        ));
        assert!(matches!(
            store.scan(&Criteria::all(), &sort, 0, 10, &cancel),
            Err(CatalogError::Cancelled)
        ));
    }

    #[test]
    fn test_last_id_has_no_successor() {
        let mut table = ProductTable::default();
        let last = Product::from_input(ProductId(u64::MAX), input("last", 1.0), Utc::now()).unwrap();
        assert!(matches!(table.put(last), Err(CatalogError::Corruption(_))));
        assert_eq!(table.len(), 0);

        table.advance_to(ProductId(u64::MAX));
        assert!(matches!(table.allocate(), Err(CatalogError::Internal(_))));
    }
}
