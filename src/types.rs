//! Core types for the catalog.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{CatalogError, Result};

/// Unique identifier for a product.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

impl fmt::Debug for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProductId({})", self.0)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ProductId {
    /// The following id; `None` at the end of the id space.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(ProductId)
    }
}

/// A typed attribute value read from a record or coerced from a filter operand.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Natural ordering between two values of compatible types.
    ///
    /// Integers and reals compare numerically with each other. Returns `None`
    /// for mismatched types, NaN, or when either side is null.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        use FieldValue::*;
        match (self, other) {
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Integer(a), Real(b)) => (*a as f64).partial_cmp(b),
            (Real(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Real(a), Real(b)) => a.partial_cmp(b),
            (Text(a), Text(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls first, strings case-insensitive.
    pub fn sort_cmp(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Less,
            (_, FieldValue::Null) => Ordering::Greater,
            (FieldValue::Text(a), FieldValue::Text(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            (FieldValue::Real(a), FieldValue::Real(b)) => a.total_cmp(b),
            _ => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// JSON rendering used in response envelopes and event payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Integer(v) => serde_json::Value::from(*v),
            FieldValue::Real(v) => serde_json::Value::from(*v),
            FieldValue::Text(v) => serde_json::Value::from(v.as_str()),
            FieldValue::Boolean(v) => serde_json::Value::from(*v),
            FieldValue::Timestamp(v) => {
                serde_json::Value::from(v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(v) => write!(f, "{v}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// A record that can be filtered and ordered by field name.
pub trait Record {
    /// Name of the stable unique key used as the sort tiebreak.
    fn identity_field() -> &'static str;

    /// Value of the identity field.
    fn identity(&self) -> FieldValue {
        self.value_of(Self::identity_field())
    }

    /// Value of a named field; unknown names read as null.
    fn value_of(&self, field: &str) -> FieldValue;
}

/// A catalogued product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier (assigned by store).
    pub id: ProductId,
    pub title: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
    pub available: bool,
    pub description: Option<String>,
    /// When the product was created (assigned by store).
    pub created_at: DateTime<Utc>,
    /// Last modification time (assigned by store).
    pub updated_at: DateTime<Utc>,
}

impl Record for Product {
    fn identity_field() -> &'static str {
        "id"
    }

    fn value_of(&self, field: &str) -> FieldValue {
        match field {
            "id" => FieldValue::Integer(self.id.0 as i64),
            "title" => FieldValue::Text(self.title.clone()),
            "category" => FieldValue::Text(self.category.clone()),
            "price" => FieldValue::Real(self.price),
            "stock" => FieldValue::Integer(self.stock),
            "available" => FieldValue::Boolean(self.available),
            "description" => self
                .description
                .clone()
                .map(FieldValue::Text)
                .unwrap_or(FieldValue::Null),
            "created_at" => FieldValue::Timestamp(self.created_at),
            "updated_at" => FieldValue::Timestamp(self.updated_at),
            _ => FieldValue::Null,
        }
    }
}

impl Product {
    /// Build a stored product from validated input.
    pub fn from_input(id: ProductId, input: ProductInput, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id,
            title: input.title,
            category: input.category,
            price: round_price(input.price)?,
            stock: input.stock,
            available: input.available,
            description: input.description,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a patch, touching `updated_at`.
    pub fn patched(&self, patch: &ProductPatch, now: DateTime<Utc>) -> Result<Self> {
        let mut next = self.clone();
        if let Some(ref title) = patch.title {
            next.title = title.clone();
        }
        if let Some(ref category) = patch.category {
            next.category = category.clone();
        }
        if let Some(price) = patch.price {
            next.price = round_price(price)?;
        }
        if let Some(stock) = patch.stock {
            next.stock = stock;
        }
        if let Some(available) = patch.available {
            next.available = available;
        }
        if let Some(ref description) = patch.description {
            next.description = description.clone();
        }
        next.updated_at = now;
        Ok(next)
    }
}

/// Largest accepted price: ten digits, two of them after the point.
pub const MAX_PRICE: f64 = 99_999_999.99;

/// Prices are kept to cents.
fn round_price(price: f64) -> Result<f64> {
    let rounded = (price * 100.0).round() / 100.0;
    if !rounded.is_finite() || !(0.0..=MAX_PRICE).contains(&rounded) {
        return Err(CatalogError::InvalidPayload {
            field: "price",
            reason: format!("must be between 0 and {MAX_PRICE}"),
        });
    }
    Ok(rounded)
}

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 120;

/// Input for creating a new product (before id/timestamps assigned).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductInput {
    pub title: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_available() -> bool {
    true
}

impl ProductInput {
    pub fn new(title: impl Into<String>, category: impl Into<String>, price: f64, stock: i64) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            price,
            stock,
            available: true,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

/// Partial update. `description: Some(None)` clears the description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub description: Option<Option<String>>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.available.is_none()
            && self.description.is_none()
    }
}
