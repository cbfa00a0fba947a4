//! Field descriptors and the registry that holds them.

use crate::error::{CatalogError, Result};
use serde::{Serialize, Serializer};
use std::fmt;

/// Declared type of a field; drives operand coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Real,
    String,
    Boolean,
    Timestamp,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "integer",
            ValueType::Real => "real",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Number of operands an operator takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// No operand; a supplied value is ignored.
    Nullary,
    Unary,
    /// Exactly two operands (`between`).
    Binary,
    /// A non-empty list (`in`).
    Variadic,
}

/// Comparison operators a filter may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Between,
    InSet,
    Contains,
    StartsWith,
    EndsWith,
    IsTrue,
    IsFalse,
    IsNull,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 14] = [
        OperatorKind::Equals,
        OperatorKind::NotEquals,
        OperatorKind::GreaterThan,
        OperatorKind::GreaterOrEqual,
        OperatorKind::LessThan,
        OperatorKind::LessOrEqual,
        OperatorKind::Between,
        OperatorKind::InSet,
        OperatorKind::Contains,
        OperatorKind::StartsWith,
        OperatorKind::EndsWith,
        OperatorKind::IsTrue,
        OperatorKind::IsFalse,
        OperatorKind::IsNull,
    ];

    /// Wire token for the operator.
    pub fn token(&self) -> &'static str {
        match self {
            OperatorKind::Equals => "eq",
            OperatorKind::NotEquals => "neq",
            OperatorKind::GreaterThan => "gt",
            OperatorKind::GreaterOrEqual => "gte",
            OperatorKind::LessThan => "lt",
            OperatorKind::LessOrEqual => "lte",
            OperatorKind::Between => "between",
            OperatorKind::InSet => "in",
            OperatorKind::Contains => "contains",
            OperatorKind::StartsWith => "startswith",
            OperatorKind::EndsWith => "endswith",
            OperatorKind::IsTrue => "istrue",
            OperatorKind::IsFalse => "isfalse",
            OperatorKind::IsNull => "isnull",
        }
    }

    /// Parse a wire token, ignoring case and surrounding whitespace.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|op| op.token() == token)
    }

    pub fn arity(&self) -> Arity {
        match self {
            OperatorKind::IsTrue | OperatorKind::IsFalse | OperatorKind::IsNull => Arity::Nullary,
            OperatorKind::Between => Arity::Binary,
            OperatorKind::InSet => Arity::Variadic,
            _ => Arity::Unary,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl Serialize for OperatorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

/// Describes one attribute of a record kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub value_type: ValueType,
    /// Operators legal against this field.
    pub operators: &'static [OperatorKind],
    /// Whether the field may hold null.
    pub nullable: bool,
    /// Whether free-text search looks at this field.
    pub searchable: bool,
}

impl FieldDescriptor {
    pub const fn new(
        name: &'static str,
        value_type: ValueType,
        operators: &'static [OperatorKind],
    ) -> Self {
        Self {
            name,
            value_type,
            operators,
            nullable: false,
            searchable: false,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn searchable(self) -> Self {
        Self {
            searchable: true,
            ..self
        }
    }

    pub fn allows(&self, operator: OperatorKind) -> bool {
        self.operators.contains(&operator)
    }
}

use OperatorKind::*;

const ORDERED_OPS: &[OperatorKind] = &[
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Between,
    InSet,
];

const TEMPORAL_OPS: &[OperatorKind] = &[
    Equals,
    NotEquals,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Between,
];

const TEXT_OPS: &[OperatorKind] = &[Equals, NotEquals, Contains, StartsWith, EndsWith, InSet];

const NULLABLE_TEXT_OPS: &[OperatorKind] =
    &[Equals, NotEquals, Contains, StartsWith, EndsWith, IsNull];

const FLAG_OPS: &[OperatorKind] = &[Equals, NotEquals, IsTrue, IsFalse];

const PRODUCT_FIELDS: [FieldDescriptor; 9] = [
    FieldDescriptor::new("id", ValueType::Integer, ORDERED_OPS),
    FieldDescriptor::new("title", ValueType::String, TEXT_OPS).searchable(),
    FieldDescriptor::new("category", ValueType::String, TEXT_OPS).searchable(),
    FieldDescriptor::new("price", ValueType::Real, ORDERED_OPS),
    FieldDescriptor::new("stock", ValueType::Integer, ORDERED_OPS),
    FieldDescriptor::new("available", ValueType::Boolean, FLAG_OPS),
    FieldDescriptor::new("description", ValueType::String, NULLABLE_TEXT_OPS)
        .nullable()
        .searchable(),
    FieldDescriptor::new("created_at", ValueType::Timestamp, TEMPORAL_OPS),
    FieldDescriptor::new("updated_at", ValueType::Timestamp, TEMPORAL_OPS),
];

/// Immutable lookup table of field descriptors for one record kind.
#[derive(Clone, Debug)]
pub struct FieldRegistry {
    fields: Vec<FieldDescriptor>,
    /// Index into `fields` of the stable unique key.
    identity: usize,
}

impl FieldRegistry {
    /// Build a registry. The identity field must be one of `fields`.
    pub fn new(fields: Vec<FieldDescriptor>, identity: &str) -> Result<Self> {
        let identity = fields
            .iter()
            .position(|f| f.name == identity)
            .ok_or_else(|| CatalogError::UnknownField {
                field: identity.to_string(),
            })?;
        Ok(Self { fields, identity })
    }

    /// The product registry.
    pub fn products() -> Self {
        Self {
            fields: PRODUCT_FIELDS.to_vec(),
            identity: 0,
        }
    }

    /// Look up a field by name.
    pub fn describe(&self, name: &str) -> Result<&FieldDescriptor> {
        self.get(name).ok_or_else(|| CatalogError::UnknownField {
            field: name.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The identity field (sort tiebreak).
    pub fn identity(&self) -> &FieldDescriptor {
        &self.fields[self.identity]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Fields consulted by free-text search.
    pub fn searchable(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.searchable)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::products()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_and_unknown() {
        let registry = FieldRegistry::products();
        let price = registry.describe("price").unwrap();
        assert_eq!(price.value_type, ValueType::Real);
        assert!(price.allows(OperatorKind::Between));
        assert!(!price.allows(OperatorKind::Contains));

        let err = registry.describe("colour").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownField { ref field } if field == "colour"));
    }

    #[test]
    fn test_identity_is_id() {
        let registry = FieldRegistry::products();
        assert_eq!(registry.identity().name, "id");
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn test_only_description_is_nullable() {
        let registry = FieldRegistry::products();
        let nullable: Vec<_> = registry.iter().filter(|f| f.nullable).map(|f| f.name).collect();
        assert_eq!(nullable, vec!["description"]);
        assert!(registry.describe("description").unwrap().allows(OperatorKind::IsNull));
    }

    #[test]
    fn test_searchable_fields() {
        let registry = FieldRegistry::products();
        let names: Vec<_> = registry.searchable().map(|f| f.name).collect();
        assert_eq!(names, vec!["title", "category", "description"]);
    }

    #[test]
    fn test_operator_tokens_round_trip() {
        for op in OperatorKind::ALL {
            assert_eq!(OperatorKind::parse(op.token()), Some(op));
        }
        assert_eq!(OperatorKind::parse(" StartsWith "), Some(OperatorKind::StartsWith));
        assert_eq!(OperatorKind::parse("like"), None);
    }

    #[test]
    fn test_operator_arity() {
        assert_eq!(OperatorKind::IsNull.arity(), Arity::Nullary);
        assert_eq!(OperatorKind::Between.arity(), Arity::Binary);
        assert_eq!(OperatorKind::InSet.arity(), Arity::Variadic);
        assert_eq!(OperatorKind::Contains.arity(), Arity::Unary);
    }

    #[test]
    fn test_custom_registry_requires_identity() {
        let fields = vec![FieldDescriptor::new("sku", ValueType::String, TEXT_OPS)];
        assert!(FieldRegistry::new(fields.clone(), "sku").is_ok());
        assert!(FieldRegistry::new(fields, "id").is_err());
    }
}
