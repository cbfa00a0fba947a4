//! Error handling and edge case tests.

use catalog::{
    Action, Caller, Cancellation, Catalog, CatalogError, FileStore, ListRequest, ProductId,
    ProductInput, ProductPatch, RawFilter, Role, StoreConfig,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn seeded() -> Catalog<catalog::MemoryStore> {
    let catalog = Catalog::in_memory();
    catalog.seed(10).unwrap();
    catalog
}

fn office() -> Caller {
    Caller::new("office-1", Role::Office)
}

fn list_err(catalog: &Catalog<catalog::MemoryStore>, request: ListRequest) -> CatalogError {
    catalog.list(&office(), &request).unwrap_err()
}

// --- Filter Validation ---

#[test]
fn test_unknown_field_reported_first() {
    let catalog = seeded();
    // Bad field, bad operator and bad value at once.
    let err = list_err(
        &catalog,
        ListRequest::new().filter(RawFilter::new("colour", "approx", json!({}))),
    );
    assert!(matches!(err, CatalogError::UnknownField { ref field } if field == "colour"));
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
}

#[test]
fn test_operator_reported_before_value() {
    let catalog = seeded();
    let err = list_err(
        &catalog,
        ListRequest::new().filter(RawFilter::new("price", "contains", json!({}))),
    );
    assert!(matches!(err, CatalogError::UnsupportedOperator { .. }));

    let err = list_err(
        &catalog,
        ListRequest::new().filter(RawFilter::new("price", "LIKE", json!("10"))),
    );
    assert!(matches!(
        err,
        CatalogError::UnsupportedOperator { ref operator, .. } if operator == "LIKE"
    ));
}

#[test]
fn test_uncoercible_values() {
    let catalog = seeded();
    for (field, operator, value) in [
        ("price", "gt", json!("cheap")),
        ("stock", "eq", json!(1.5)),
        ("available", "eq", json!("maybe")),
        ("created_at", "gte", json!("yesterday")),
        ("price", "between", json!([1])),
        ("price", "between", json!([1, 2, 3])),
        ("category", "in", json!([])),
    ] {
        let err = list_err(
            &catalog,
            ListRequest::new().filter(RawFilter::new(field, operator, value)),
        );
        assert!(
            matches!(err, CatalogError::InvalidValue { .. }),
            "{field} {operator}: {err:?}"
        );
    }
}

#[test]
fn test_first_invalid_filter_wins() {
    let catalog = seeded();
    let request = ListRequest::new()
        .filter(RawFilter::new("stock", "gt", json!("many")))
        .filter(RawFilter::new("colour", "eq", json!("red")));
    assert!(matches!(
        list_err(&catalog, request),
        CatalogError::InvalidValue { .. }
    ));
}

#[test]
fn test_malformed_batch_json() {
    let catalog = seeded();
    for json in ["{", "42", r#"[{"operator": "eq"}]"#] {
        let request = ListRequest {
            filter_json: Some(json.to_string()),
            ..ListRequest::default()
        };
        assert!(matches!(
            list_err(&catalog, request),
            CatalogError::MalformedFilterBatch(_)
        ));
    }
}

#[test]
fn test_filters_checked_before_pagination() {
    let catalog = seeded();
    let request = ListRequest::new()
        .filter(RawFilter::new("colour", "eq", json!("red")))
        .with_page(1, 10)
        .with_window(10, 0);
    assert!(matches!(
        list_err(&catalog, request),
        CatalogError::UnknownField { .. }
    ));
}

// --- Sort Validation ---

#[test]
fn test_sort_errors() {
    let catalog = seeded();
    assert!(matches!(
        list_err(&catalog, ListRequest::new().sorted_by("price;colour,desc")),
        CatalogError::InvalidSortField { ref field } if field == "colour"
    ));
    assert!(matches!(
        list_err(&catalog, ListRequest::new().sorted_by("price,sideways")),
        CatalogError::InvalidSortDirection { ref direction, .. } if direction == "sideways"
    ));
}

// --- Pagination Validation ---

#[test]
fn test_mixed_pagination_idioms() {
    let catalog = seeded();
    let request = ListRequest {
        page: Some(1),
        offset: Some(0),
        ..ListRequest::default()
    };
    assert!(matches!(
        list_err(&catalog, request),
        CatalogError::MutuallyExclusivePagination
    ));
}

#[test]
fn test_offset_without_limit() {
    let catalog = seeded();
    let request = ListRequest {
        offset: Some(5),
        ..ListRequest::default()
    };
    assert!(matches!(
        list_err(&catalog, request),
        CatalogError::MissingRequiredPaginationParameter { parameter: "limit" }
    ));
}

#[test]
fn test_out_of_range_sizes() {
    let catalog = seeded();
    for request in [
        ListRequest::new().with_page(0, 10),
        ListRequest::new().with_page(1, 0),
        ListRequest::new().with_page(1, 101),
        ListRequest::new().with_window(0, 0),
        ListRequest::new().with_window(500, 0),
    ] {
        assert!(matches!(
            list_err(&catalog, request),
            CatalogError::InvalidPaginationParameter { .. }
        ));
    }
}

#[test]
fn test_page_overflow_rejected() {
    let catalog = seeded();
    let err = list_err(&catalog, ListRequest::new().with_page(usize::MAX, 100));
    assert!(err.is_validation());
}

// --- Access And Outcomes ---

#[test]
fn test_forbidden_roles() {
    let catalog = seeded();
    let promoter = Caller::new("promo-7", Role::Promoter);

    let err = catalog
        .create(&promoter, ProductInput::new("Lamp", "Home", 1.0, 1))
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Forbidden {
            role: Role::Promoter,
            action: Action::Create
        }
    ));
    assert_eq!(err.error_code(), "AUTH_FORBIDDEN");

    let err = catalog
        .update(&promoter, ProductId(1), ProductPatch::default())
        .unwrap_err();
    assert!(matches!(err, CatalogError::Forbidden { .. }));

    // Reading stays open to every role.
    assert!(catalog.list(&promoter, &ListRequest::new()).is_ok());
}

#[test]
fn test_missing_product() {
    let catalog = seeded();
    let admin = Caller::admin();

    let err = catalog.get(&admin, ProductId(404)).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.error_code(), "PRODUCT_NOT_FOUND");
    assert!(err.public_message().contains("404"));

    assert!(catalog
        .update(&admin, ProductId(404), ProductPatch::default())
        .unwrap_err()
        .is_not_found());
    assert!(catalog.delete(&admin, ProductId(404)).unwrap_err().is_not_found());
}

#[test]
fn test_cancelled_list() {
    let catalog = seeded();
    let cancel = Cancellation::new();
    cancel.cancel();

    let err = catalog
        .list_with_cancel(&office(), &ListRequest::new(), &cancel)
        .unwrap_err();
    assert!(matches!(err, CatalogError::Cancelled));
    assert_eq!(err.error_code(), "REQUEST_CANCELLED");
    assert!(!err.is_validation());
}

#[test]
fn test_invalid_patch_leaves_product_unchanged() {
    let catalog = seeded();
    let patch = ProductPatch {
        title: Some("Renamed".into()),
        price: Some(-5.0),
        ..Default::default()
    };
    let err = catalog.update(&office(), ProductId(1), patch).unwrap_err();
    assert!(matches!(err, CatalogError::InvalidPayload { field: "price", .. }));
    assert_eq!(catalog.get(&office(), ProductId(1)).unwrap().title, "Product 1");
}

// --- Storage Errors ---

#[test]
fn test_store_not_initialized() {
    let dir = TempDir::new().unwrap();
    let result = FileStore::open(StoreConfig {
        path: dir.path().join("missing"),
        create_if_missing: false,
        ..Default::default()
    });
    assert!(matches!(result, Err(CatalogError::NotInitialized)));
}

#[test]
fn test_store_corruption_is_internal() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        path: dir.path().join("catalog"),
        ..Default::default()
    };
    {
        let store = FileStore::create(config.clone()).unwrap();
        let catalog = Catalog::new(store, Default::default());
        catalog.seed(3).unwrap();
    }

    fs::write(dir.path().join("catalog").join("MANIFEST"), b"garbage").unwrap();
    let err = FileStore::open(config).err().unwrap();
    assert!(matches!(err, CatalogError::InvalidFormat(_)));
    assert_eq!(err.public_message(), "internal error");
}
