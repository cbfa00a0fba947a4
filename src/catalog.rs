//! The catalog service: access gate, listing, mutations and broadcast.

use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tracing::info;

use crate::access::{AccessPolicy, Action, Caller};
use crate::error::{CatalogError, Result};
use crate::query::{
    Cancellation, ListRequest, ListResponse, PaginationNormalizer, QueryExecutor,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::schema::FieldRegistry;
use crate::seed::{demo_products, MAX_DEMO_PRODUCTS};
use crate::store::{MemoryStore, RecordStore};
use crate::subscriptions::{BroadcastConfig, Broadcaster, ChangeEvent, SubscriberId, SubscriptionHandle};
use crate::types::{Product, ProductId, ProductInput, ProductPatch, MAX_PRICE, MAX_TITLE_CHARS};

/// Catalog configuration.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    /// Page size when a list call names none.
    /// Default: 20
    pub default_page_size: usize,

    /// Largest accepted page size or limit.
    /// Default: 100
    pub max_page_size: usize,

    pub broadcast: BroadcastConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            broadcast: BroadcastConfig::default(),
        }
    }
}

/// Product catalog over a record store.
///
/// Reads run concurrently. Mutations are serialized so each store write is
/// followed by its publish before the next write starts; subscribers see
/// events in commit order and never before the commit.
pub struct Catalog<S: RecordStore> {
    store: S,
    registry: FieldRegistry,
    normalizer: PaginationNormalizer,
    policy: AccessPolicy,
    broadcaster: Arc<Broadcaster>,
    /// Lock for write operations to pair each commit with its publish.
    write_lock: Mutex<()>,
}

impl Catalog<MemoryStore> {
    /// An empty in-memory catalog with default configuration.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new(), CatalogConfig::default())
    }
}

impl<S: RecordStore> Catalog<S> {
    pub fn new(store: S, config: CatalogConfig) -> Self {
        Self {
            store,
            registry: FieldRegistry::products(),
            normalizer: PaginationNormalizer::new(config.default_page_size, config.max_page_size),
            policy: AccessPolicy::default(),
            broadcaster: Arc::new(Broadcaster::new(config.broadcast)),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Shared handle for a subscription endpoint.
    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        Arc::clone(&self.broadcaster)
    }

    // --- Reads ---

    pub fn list(&self, caller: &Caller, request: &ListRequest) -> Result<ListResponse> {
        self.list_with_cancel(caller, request, &Cancellation::new())
    }

    /// List with a cancellation token. A cancelled call fails with
    /// `Cancelled` and does no further store work.
    pub fn list_with_cancel(
        &self,
        caller: &Caller,
        request: &ListRequest,
        cancel: &Cancellation,
    ) -> Result<ListResponse> {
        self.policy.check(caller, Action::List)?;
        let query = request.compile(&self.registry, &self.normalizer)?;
        let result = QueryExecutor::new(&self.store).execute(
            &query.criteria,
            &query.sort,
            query.pagination,
            cancel,
        )?;
        Ok(ListResponse::from(result))
    }

    pub fn get(&self, caller: &Caller, id: ProductId) -> Result<Product> {
        self.policy.check(caller, Action::Get)?;
        self.store.get(id)
    }

    // --- Mutations ---

    pub fn create(&self, caller: &Caller, input: ProductInput) -> Result<Product> {
        self.policy.check(caller, Action::Create)?;
        validate_input(&input)?;

        let _lock = self.write_lock.lock();
        let product = self.store.insert(input, Utc::now())?;
        let report = self.broadcaster.publish(&ChangeEvent::created(product.clone()));
        info!(
            product_id = %product.id,
            subject = %caller.subject,
            delivered = report.delivered,
            dropped = report.dropped,
            "product created"
        );
        Ok(product)
    }

    pub fn update(&self, caller: &Caller, id: ProductId, patch: ProductPatch) -> Result<Product> {
        self.policy.check(caller, Action::Update)?;
        validate_patch(&patch)?;

        let _lock = self.write_lock.lock();
        let product = self.store.update(id, &patch, Utc::now())?;
        let report = self.broadcaster.publish(&ChangeEvent::updated(product.clone()));
        info!(
            product_id = %product.id,
            subject = %caller.subject,
            delivered = report.delivered,
            dropped = report.dropped,
            "product updated"
        );
        Ok(product)
    }

    /// Delete a product, returning its last state.
    pub fn delete(&self, caller: &Caller, id: ProductId) -> Result<Product> {
        self.policy.check(caller, Action::Delete)?;

        let _lock = self.write_lock.lock();
        let product = self.store.delete(id)?;
        let report = self.broadcaster.publish(&ChangeEvent::deleted(id));
        info!(
            product_id = %id,
            subject = %caller.subject,
            delivered = report.delivered,
            dropped = report.dropped,
            "product deleted"
        );
        Ok(product)
    }

    // --- Subscriptions ---

    /// Subscribe the caller to change events, partitioned by role.
    pub fn subscribe(&self, caller: &Caller) -> Result<SubscriptionHandle> {
        self.policy.check(caller, Action::Subscribe)?;
        Ok(self.broadcaster.subscribe(Some(caller.role)))
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    // --- Lifecycle ---

    /// Load `count` demo products. Skips the access gate and publishes
    /// nothing. Creation times are spread one day apart ending today.
    pub fn seed(&self, count: usize) -> Result<usize> {
        if count > MAX_DEMO_PRODUCTS {
            return Err(CatalogError::InvalidValue {
                field: "count".into(),
                value: count.to_string(),
                reason: format!("at most {MAX_DEMO_PRODUCTS} demo products"),
            });
        }
        let _lock = self.write_lock.lock();
        let start = Utc::now() - Duration::days(count as i64);
        for (n, input) in demo_products(count).into_iter().enumerate() {
            self.store.insert(input, start + Duration::days(n as i64 + 1))?;
        }
        info!(count, "catalog seeded");
        Ok(count)
    }

    /// Disconnect every subscriber.
    pub fn shutdown(&self) {
        self.broadcaster.close();
        info!("catalog shut down");
    }
}

fn payload_error(field: &'static str, reason: impl Into<String>) -> CatalogError {
    CatalogError::InvalidPayload {
        field,
        reason: reason.into(),
    }
}

fn validate_title(title: &str) -> Result<()> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err(payload_error("title", "must not be empty"));
    }
    if len > MAX_TITLE_CHARS {
        return Err(payload_error(
            "title",
            format!("must be at most {MAX_TITLE_CHARS} characters"),
        ));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<()> {
    if category.trim().is_empty() {
        return Err(payload_error("category", "must not be empty"));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(payload_error("price", "must be a non-negative number"));
    }
    if price > MAX_PRICE {
        return Err(payload_error("price", format!("must be at most {MAX_PRICE}")));
    }
    Ok(())
}

fn validate_stock(stock: i64) -> Result<()> {
    if stock < 0 {
        return Err(payload_error("stock", "must not be negative"));
    }
    Ok(())
}

fn validate_input(input: &ProductInput) -> Result<()> {
    validate_title(&input.title)?;
    validate_category(&input.category)?;
    validate_price(input.price)?;
    validate_stock(input.stock)
}

fn validate_patch(patch: &ProductPatch) -> Result<()> {
    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    if let Some(category) = &patch.category {
        validate_category(category)?;
    }
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    if let Some(stock) = patch.stock {
        validate_stock(stock)?;
    }
    Ok(())
}
