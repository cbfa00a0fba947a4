//! Error types for catalog operations.

use crate::access::{Action, Role};
use crate::types::ProductId;
use thiserror::Error;

/// Main error type for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    // --- Request validation ---
    #[error("Unknown field: {field}")]
    UnknownField { field: String },

    #[error("Operator {operator} is not supported for field {field}")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Invalid value {value:?} for field {field}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid sort field: {field}")]
    InvalidSortField { field: String },

    #[error("Invalid sort direction {direction:?} for field {field} (expected asc or desc)")]
    InvalidSortDirection { field: String, direction: String },

    #[error("page/size and limit/offset cannot be combined")]
    MutuallyExclusivePagination,

    #[error("Missing required pagination parameter: {parameter}")]
    MissingRequiredPaginationParameter { parameter: &'static str },

    #[error("Invalid pagination parameter {parameter}={value}: {reason}")]
    InvalidPaginationParameter {
        parameter: &'static str,
        value: String,
        reason: String,
    },

    #[error("Malformed filter batch: {0}")]
    MalformedFilterBatch(String),

    #[error("Invalid payload field {field}: {reason}")]
    InvalidPayload { field: &'static str, reason: String },

    // --- Outcomes ---
    #[error("Product not found: {0}")]
    RecordNotFound(ProductId),

    #[error("Role {role} may not {action}")]
    Forbidden { role: Role, action: Action },

    #[error("Query cancelled")]
    Cancelled,

    // --- Storage ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// True for errors caused by a malformed request. These are raised
    /// before any store access and are never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CatalogError::UnknownField { .. }
                | CatalogError::UnsupportedOperator { .. }
                | CatalogError::InvalidValue { .. }
                | CatalogError::InvalidSortField { .. }
                | CatalogError::InvalidSortDirection { .. }
                | CatalogError::MutuallyExclusivePagination
                | CatalogError::MissingRequiredPaginationParameter { .. }
                | CatalogError::InvalidPaginationParameter { .. }
                | CatalogError::MalformedFilterBatch(_)
                | CatalogError::InvalidPayload { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::RecordNotFound(_))
    }

    /// Stable code for the outward error envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            e if e.is_validation() => "VALIDATION_ERROR",
            CatalogError::RecordNotFound(_) => "PRODUCT_NOT_FOUND",
            CatalogError::Forbidden { .. } => "AUTH_FORBIDDEN",
            CatalogError::Cancelled => "REQUEST_CANCELLED",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand to a caller. Storage and internal failures are
    /// collapsed to a generic message.
    pub fn public_message(&self) -> String {
        match self.error_code() {
            "INTERNAL_ERROR" => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CatalogError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        CatalogError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for CatalogError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        CatalogError::Deserialization(e.to_string())
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
