//! List request parsing and response assembly.

use serde::Serialize;
use serde_json::Value;

use crate::error::{CatalogError, Result};
use crate::schema::FieldRegistry;
use crate::types::Product;

use super::executor::QueryResult;
use super::filter::{parse_batch_json, AppliedFilter, FilterCompiler, RawFilter};
use super::pagination::{PaginationNormalizer, PaginationSpec};
use super::predicate::{Criteria, SearchTerm};
use super::sort::{AppliedSort, SortCompiler, SortTerms};

/// Raw list parameters as a caller supplies them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListRequest {
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Sort grammar, e.g. `price,desc;title`.
    pub sort: Option<String>,
    /// Structured filters; compiled before `filter_json`.
    pub filters: Vec<RawFilter>,
    /// JSON filter batch (one object or an array).
    pub filter_json: Option<String>,
    /// Single-triple filter; ignored unless both field and operator are set.
    pub field: Option<String>,
    pub operator: Option<String>,
    pub value: Option<String>,
    /// Free-text search term.
    pub q: Option<String>,
}

/// Validated query ready for execution.
#[derive(Clone, Debug)]
pub struct CompiledQuery {
    pub criteria: Criteria,
    pub sort: SortTerms,
    pub pagination: PaginationSpec,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: usize, size: usize) -> Self {
        self.page = Some(page);
        self.size = Some(size);
        self
    }

    pub fn with_window(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    pub fn sorted_by(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn filter(mut self, filter: RawFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn search(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    /// Build a request from decoded query-string pairs. Unknown keys are
    /// ignored; a repeated key keeps its last value, except `price_in`
    /// which accumulates.
    ///
    /// Besides the generic parameters, the shorthand keys `sort_by`,
    /// `sort_order`, `title_contains`, `title_eq`, `price_from`, `price_to`,
    /// `price_in`, `in_stock`, `created_from` and `created_to` become sort
    /// terms and structured filters. Their values are checked by `compile`.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::default();
        let mut shorthand = Shorthand::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "page" => request.page = Some(parse_count("page", value)?),
                "size" | "page_size" => request.size = Some(parse_count("size", value)?),
                "limit" => request.limit = Some(parse_count("limit", value)?),
                "offset" => request.offset = Some(parse_count("offset", value)?),
                "sort" => request.sort = Some(value.to_string()),
                "filters" => request.filter_json = Some(value.to_string()),
                "field" => request.field = Some(value.to_string()),
                "operator" => request.operator = Some(value.to_string()),
                "value" => request.value = Some(value.to_string()),
                "q" => request.q = Some(value.to_string()),
                "sort_by" => shorthand.sort_by = Some(value.to_string()),
                "sort_order" => shorthand.sort_order = Some(value.to_string()),
                "title_contains" => shorthand.title_contains = Some(value.to_string()),
                "title_eq" => shorthand.title_eq = Some(value.to_string()),
                "price_from" => shorthand.price_from = Some(value.to_string()),
                "price_to" => shorthand.price_to = Some(value.to_string()),
                "price_in" => shorthand.price_in.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|chunk| !chunk.is_empty())
                        .map(String::from),
                ),
                "in_stock" => shorthand.in_stock = Some(value.to_string()),
                "created_from" => shorthand.created_from = Some(value.to_string()),
                "created_to" => shorthand.created_to = Some(value.to_string()),
                _ => {}
            }
        }
        shorthand.apply(&mut request);
        Ok(request)
    }

    /// All raw filters in evaluation order: structured, then batch JSON,
    /// then the single triple.
    pub fn raw_filters(&self) -> Result<Vec<RawFilter>> {
        let mut raw = self.filters.clone();
        if let Some(json) = self.filter_json.as_deref().filter(|s| !s.trim().is_empty()) {
            raw.extend(parse_batch_json(json)?);
        }
        if let (Some(field), Some(operator)) = (&self.field, &self.operator) {
            let value = self.value.clone().map(Value::String).unwrap_or(Value::Null);
            raw.push(RawFilter::new(field.as_str(), operator.as_str(), value));
        }
        Ok(raw)
    }

    /// Validate every parameter. Nothing here touches a store.
    pub fn compile(
        &self,
        registry: &FieldRegistry,
        normalizer: &PaginationNormalizer,
    ) -> Result<CompiledQuery> {
        let filters = FilterCompiler::new(registry).compile(&self.raw_filters()?)?;
        let search = self
            .q
            .as_deref()
            .and_then(|q| SearchTerm::new(registry, q));
        let sort = SortCompiler::new(registry).compile(self.sort.as_deref())?;
        let pagination = normalizer.normalize(self.page, self.size, self.limit, self.offset)?;

        Ok(CompiledQuery {
            criteria: Criteria::new(filters).with_search(search),
            sort,
            pagination,
        })
    }
}

/// Shorthand query keys, collected before they become sort terms and filters.
#[derive(Default)]
struct Shorthand {
    sort_by: Option<String>,
    sort_order: Option<String>,
    title_contains: Option<String>,
    title_eq: Option<String>,
    price_from: Option<String>,
    price_to: Option<String>,
    price_in: Vec<String>,
    in_stock: Option<String>,
    created_from: Option<String>,
    created_to: Option<String>,
}

impl Shorthand {
    fn apply(self, request: &mut ListRequest) {
        // An explicit `sort` wins.
        if request.sort.is_none() && (self.sort_by.is_some() || self.sort_order.is_some()) {
            let by = self.sort_by.as_deref().unwrap_or("id");
            let order = self.sort_order.as_deref().unwrap_or("asc");
            request.sort = Some(format!("{by},{order}"));
        }

        if let Some(text) = self.title_contains {
            request.filters.push(RawFilter::new("title", "contains", text));
        }
        if let Some(text) = self.title_eq {
            request.filters.push(RawFilter::new("title", "eq", text));
        }
        if let Some(filter) = range_filter("price", self.price_from, self.price_to) {
            request.filters.push(filter);
        }
        if !self.price_in.is_empty() {
            let values: Vec<Value> = self.price_in.into_iter().map(Value::String).collect();
            request.filters.push(RawFilter::new("price", "in", values));
        }
        if let Some(flag) = self.in_stock {
            request.filters.push(RawFilter::new("available", "eq", flag));
        }
        if let Some(filter) = range_filter("created_at", self.created_from, self.created_to) {
            request.filters.push(filter);
        }
    }
}

/// `between` with both bounds, otherwise `gte` or `lte` on the one given.
fn range_filter(field: &str, from: Option<String>, to: Option<String>) -> Option<RawFilter> {
    match (from, to) {
        (Some(from), Some(to)) => Some(RawFilter::new(
            field,
            "between",
            vec![Value::String(from), Value::String(to)],
        )),
        (Some(from), None) => Some(RawFilter::new(field, "gte", from)),
        (None, Some(to)) => Some(RawFilter::new(field, "lte", to)),
        (None, None) => None,
    }
}

fn parse_count(parameter: &'static str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| CatalogError::InvalidPaginationParameter {
            parameter,
            value: raw.to_string(),
            reason: "expected a non-negative integer".into(),
        })
}

/// Response envelope for a list call.
#[derive(Clone, Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<Product>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
    pub total_pages: usize,
    pub sort: Vec<AppliedSort>,
    pub filters_applied: Vec<AppliedFilter>,
    pub next_offset: Option<usize>,
    pub prev_offset: Option<usize>,
    pub q: Option<String>,
}

impl From<QueryResult> for ListResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            total_pages: result.pagination.total_pages(result.total),
            page: result.pagination.page,
            size: result.pagination.size,
            items: result.items,
            total: result.total,
            sort: result.applied_sort,
            filters_applied: result.applied_filters,
            next_offset: result.next_offset,
            prev_offset: result.prev_offset,
            q: result.search,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OperatorKind;
    use serde_json::json;

    fn compile(request: &ListRequest) -> Result<CompiledQuery> {
        request.compile(&FieldRegistry::products(), &PaginationNormalizer::default())
    }

    #[test]
    fn test_from_query_pairs() {
        let request = ListRequest::from_query_pairs([
            ("page_size", "5"),
            ("page", "2"),
            ("sort", "price,desc"),
            ("q", "mouse"),
            ("utm_source", "mail"),
        ])
        .unwrap();
        assert_eq!(request.page, Some(2));
        assert_eq!(request.size, Some(5));
        assert_eq!(request.sort.as_deref(), Some("price,desc"));
        assert_eq!(request.q.as_deref(), Some("mouse"));
    }

    #[test]
    fn test_shorthand_keys_become_filters() {
        let request = ListRequest::from_query_pairs([
            ("sort_by", "price"),
            ("sort_order", "desc"),
            ("title_contains", "lamp"),
            ("title_eq", "Desk lamp"),
            ("price_from", "70"),
            ("price_to", "80"),
            ("price_in", "71.8,75"),
            ("price_in", "90"),
            ("in_stock", "true"),
            ("created_from", "2024-01-01"),
        ])
        .unwrap();
        assert_eq!(request.sort.as_deref(), Some("price,desc"));
        assert_eq!(
            request.filters,
            vec![
                RawFilter::new("title", "contains", "lamp"),
                RawFilter::new("title", "eq", "Desk lamp"),
                RawFilter::new("price", "between", json!(["70", "80"])),
                RawFilter::new("price", "in", json!(["71.8", "75", "90"])),
                RawFilter::new("available", "eq", "true"),
                RawFilter::new("created_at", "gte", "2024-01-01"),
            ]
        );

        let query = compile(&request).unwrap();
        assert_eq!(query.criteria.filters.len(), 6);
    }

    #[test]
    fn test_shorthand_ranges_and_sort_defaults() {
        let upper = ListRequest::from_query_pairs([("price_to", "80"), ("sort_order", "desc")])
            .unwrap();
        assert_eq!(upper.sort.as_deref(), Some("id,desc"));
        assert_eq!(upper.filters, vec![RawFilter::new("price", "lte", "80")]);

        let dates = ListRequest::from_query_pairs([
            ("created_from", "2024-01-01"),
            ("created_to", "2024-02-01"),
            ("sort", "title"),
            ("sort_by", "price"),
        ])
        .unwrap();
        assert_eq!(dates.sort.as_deref(), Some("title"));
        assert_eq!(
            dates.filters,
            vec![RawFilter::new("created_at", "between", json!(["2024-01-01", "2024-02-01"]))]
        );
    }

    #[test]
    fn test_shorthand_values_checked_on_compile() {
        let bad_price = ListRequest::from_query_pairs([("price_from", "cheap")]).unwrap();
        assert!(matches!(
            compile(&bad_price),
            Err(CatalogError::InvalidValue { .. })
        ));

        let bad_flag = ListRequest::from_query_pairs([("in_stock", "maybe")]).unwrap();
        assert!(matches!(
            compile(&bad_flag),
            Err(CatalogError::InvalidValue { .. })
        ));

        let bad_order = ListRequest::from_query_pairs([("sort_order", "sideways")]).unwrap();
        assert!(matches!(
            compile(&bad_order),
            Err(CatalogError::InvalidSortDirection { .. })
        ));
    }

    #[test]
    fn test_non_numeric_pagination_rejected() {
        for (key, value) in [("page", "two"), ("limit", "-1"), ("offset", "1.5")] {
            let err = ListRequest::from_query_pairs([(key, value)]).unwrap_err();
            assert!(matches!(err, CatalogError::InvalidPaginationParameter { .. }));
        }
    }

    #[test]
    fn test_filter_sources_are_ordered() {
        let request = ListRequest::new()
            .filter(RawFilter::new("stock", "gt", json!(1)))
            .search("  ");
        let request = ListRequest {
            filter_json: Some(r#"{"field": "title", "operator": "contains", "value": "a"}"#.into()),
            field: Some("price".into()),
            operator: Some("between".into()),
            value: Some("10, 20".into()),
            ..request
        };

        let query = compile(&request).unwrap();
        let ops: Vec<_> = query.criteria.filters.iter().map(|f| f.operator()).collect();
        assert_eq!(
            ops,
            vec![OperatorKind::GreaterThan, OperatorKind::Contains, OperatorKind::Between]
        );
        assert!(query.criteria.search.is_none());
    }

    #[test]
    fn test_partial_triple_ignored() {
        let request = ListRequest {
            field: Some("price".into()),
            ..ListRequest::default()
        };
        assert!(compile(&request).unwrap().criteria.filters.is_empty());
    }

    #[test]
    fn test_triple_without_value_is_null() {
        let request = ListRequest {
            field: Some("description".into()),
            operator: Some("isnull".into()),
            ..ListRequest::default()
        };
        assert_eq!(compile(&request).unwrap().criteria.filters.len(), 1);
    }

    #[test]
    fn test_compile_validates_everything() {
        let bad_sort = ListRequest::new().sorted_by("colour");
        assert!(matches!(
            compile(&bad_sort),
            Err(CatalogError::InvalidSortField { .. })
        ));

        let mixed = ListRequest::new().with_page(1, 10).with_window(10, 0);
        assert!(matches!(
            compile(&mixed),
            Err(CatalogError::MutuallyExclusivePagination)
        ));

        let bad_batch = ListRequest {
            filter_json: Some("[{".into()),
            ..ListRequest::default()
        };
        assert!(matches!(
            compile(&bad_batch),
            Err(CatalogError::MalformedFilterBatch(_))
        ));
    }
}
