//! # Catalog
//!
//! A product listing service: filtered, sorted, paginated queries over a
//! record store, plus live broadcast of every committed change.
//!
//! ## Core Concepts
//!
//! - **Field registry**: the fields a product exposes and the operators each accepts
//! - **Queries**: filters, sort terms and pagination compiled and validated before any store access
//! - **Stores**: `RecordStore` implementations, in memory or journaled to disk
//! - **Broadcast**: bounded per-subscriber queues partitioned by role
//!
//! ## Example
//!
//! ```ignore
//! use catalog::{Caller, Catalog, ListRequest, ProductInput, RawFilter, Role};
//! use serde_json::json;
//!
//! let catalog = Catalog::in_memory();
//! let office = Caller::new("ops", Role::Office);
//!
//! let events = catalog.subscribe(&office)?;
//! catalog.create(&office, ProductInput::new("Desk lamp", "Home", 10.50, 4))?;
//!
//! let page = catalog.list(
//!     &office,
//!     &ListRequest::new()
//!         .filter(RawFilter::new("price", "between", json!([10, 20])))
//!         .sorted_by("price,desc"),
//! )?;
//! ```

pub mod access;
pub mod catalog;
pub mod error;
pub mod query;
pub mod schema;
pub mod seed;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use access::{AccessPolicy, Action, Caller, Role};
pub use catalog::{Catalog, CatalogConfig};
pub use error::{CatalogError, Result};
pub use query::{
    AppliedFilter, AppliedSort, Cancellation, CompiledFilter, Criteria, FilterCompiler,
    ListRequest, ListResponse, PaginationNormalizer, PaginationSpec, QueryExecutor, QueryResult,
    RawFilter, RawSortTerm, SortCompiler, SortTerms,
};
pub use schema::{FieldDescriptor, FieldRegistry, OperatorKind, ValueType};
pub use store::{FileStore, MemoryStore, Page, RecordStore, StoreConfig};
pub use subscriptions::{
    BroadcastConfig, Broadcaster, ChangeEvent, ChangeKind, DropReason, Frame, Notification,
    PublishReport, SubscriberId, SubscriptionHandle,
};
pub use types::{FieldValue, Product, ProductId, ProductInput, ProductPatch, Record};
