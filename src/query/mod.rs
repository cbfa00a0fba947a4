//! Listing queries: filter, sort and pagination compilation plus execution.
//!
//! A list call flows through three pure compilers and then the executor:
//!
//! 1. `FilterCompiler` validates raw `{field, operator, value}` triples
//! 2. `SortCompiler` parses the sort grammar and appends the identity tiebreak
//! 3. `PaginationNormalizer` reduces page/size or limit/offset to one window
//! 4. `QueryExecutor` asks the store for the window and the matching total
//!
//! All validation happens before the store is consulted.

mod executor;
mod filter;
mod pagination;
mod predicate;
mod request;
mod sort;

pub use executor::{Cancellation, QueryExecutor, QueryResult};
pub use filter::{
    coerce, parse_batch_json, parse_timestamp, AppliedFilter, CompiledFilter, FilterCompiler,
    Predicate, RawFilter,
};
pub use pagination::{
    PaginationMode, PaginationNormalizer, PaginationSpec, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use predicate::{Criteria, SearchTerm};
pub use request::{CompiledQuery, ListRequest, ListResponse};
pub use sort::{AppliedSort, RawSortTerm, SortCompiler, SortKey, SortTerms};
