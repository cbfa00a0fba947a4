//! Deterministic demo products.

use crate::types::ProductInput;

/// Number of products a fresh demo catalog starts with.
pub const DEMO_PRODUCT_COUNT: usize = 25;

/// Most products one seeding may create.
pub const MAX_DEMO_PRODUCTS: usize = 1_000_000;

/// Build `count` demo products numbered from 1.
///
/// Odd numbers are Electronics, even ones Accessories. Every third product is
/// unavailable and every fifth has no description.
pub fn demo_products(count: usize) -> Vec<ProductInput> {
    (1..=count as i64)
        .map(|n| {
            let category = if n % 2 == 1 { "Electronics" } else { "Accessories" };
            let mut input = ProductInput::new(
                format!("Product {n}"),
                category,
                59.0 + n as f64 * 3.2,
                (120 - n * 2).max(0),
            );
            if n % 3 == 0 {
                input = input.unavailable();
            }
            if n % 5 != 0 {
                input = input.with_description(format!("SKU {n}"));
            }
            input
        })
        .collect()
}
