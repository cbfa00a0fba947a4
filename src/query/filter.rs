//! Filter compilation: raw `{field, operator, value}` triples to typed predicates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CatalogError, Result};
use crate::schema::{Arity, FieldDescriptor, FieldRegistry, OperatorKind, ValueType};
use crate::types::FieldValue;

/// A filter as supplied by the caller, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawFilter {
    pub field: String,
    pub operator: String,
    /// Operand(s). Ignored by `istrue`, `isfalse` and `isnull`.
    #[serde(default)]
    pub value: Value,
}

impl RawFilter {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// A filter without an operand (`istrue`, `isfalse`, `isnull`).
    pub fn flag(field: impl Into<String>, operator: impl Into<String>) -> Self {
        Self::new(field, operator, Value::Null)
    }

    /// A filter against a typed timestamp.
    pub fn timestamp(field: impl Into<String>, operator: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(field, operator, at.to_rfc3339())
    }
}

/// A validated predicate with operands coerced to the field's type.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Equals(FieldValue),
    NotEquals(FieldValue),
    GreaterThan(FieldValue),
    GreaterOrEqual(FieldValue),
    LessThan(FieldValue),
    LessOrEqual(FieldValue),
    /// Inclusive range. `lo > hi` is legal and matches nothing.
    Between(FieldValue, FieldValue),
    InSet(Vec<FieldValue>),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    IsTrue,
    IsFalse,
    IsNull,
}

impl Predicate {
    pub fn operator(&self) -> OperatorKind {
        match self {
            Predicate::Equals(_) => OperatorKind::Equals,
            Predicate::NotEquals(_) => OperatorKind::NotEquals,
            Predicate::GreaterThan(_) => OperatorKind::GreaterThan,
            Predicate::GreaterOrEqual(_) => OperatorKind::GreaterOrEqual,
            Predicate::LessThan(_) => OperatorKind::LessThan,
            Predicate::LessOrEqual(_) => OperatorKind::LessOrEqual,
            Predicate::Between(_, _) => OperatorKind::Between,
            Predicate::InSet(_) => OperatorKind::InSet,
            Predicate::Contains(_) => OperatorKind::Contains,
            Predicate::StartsWith(_) => OperatorKind::StartsWith,
            Predicate::EndsWith(_) => OperatorKind::EndsWith,
            Predicate::IsTrue => OperatorKind::IsTrue,
            Predicate::IsFalse => OperatorKind::IsFalse,
            Predicate::IsNull => OperatorKind::IsNull,
        }
    }

    /// Operand rendering for the `filters_applied` echo.
    pub fn operand_json(&self) -> Value {
        match self {
            Predicate::Equals(v)
            | Predicate::NotEquals(v)
            | Predicate::GreaterThan(v)
            | Predicate::GreaterOrEqual(v)
            | Predicate::LessThan(v)
            | Predicate::LessOrEqual(v) => v.to_json(),
            Predicate::Between(lo, hi) => Value::Array(vec![lo.to_json(), hi.to_json()]),
            Predicate::InSet(values) => Value::Array(values.iter().map(FieldValue::to_json).collect()),
            Predicate::Contains(s) | Predicate::StartsWith(s) | Predicate::EndsWith(s) => {
                Value::from(s.as_str())
            }
            Predicate::IsTrue => Value::Bool(true),
            Predicate::IsFalse => Value::Bool(false),
            Predicate::IsNull => Value::Null,
        }
    }
}

/// A predicate bound to the field it tests.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledFilter {
    pub field: FieldDescriptor,
    pub predicate: Predicate,
}

impl CompiledFilter {
    pub fn operator(&self) -> OperatorKind {
        self.predicate.operator()
    }

    pub fn applied(&self) -> AppliedFilter {
        AppliedFilter {
            field: self.field.name.to_string(),
            operator: self.operator(),
            value: self.predicate.operand_json(),
        }
    }
}

/// Echo of a compiled filter in the list response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppliedFilter {
    pub field: String,
    pub operator: OperatorKind,
    pub value: Value,
}

/// Turns raw filters into compiled predicates against a field registry.
pub struct FilterCompiler<'a> {
    registry: &'a FieldRegistry,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(registry: &'a FieldRegistry) -> Self {
        Self { registry }
    }

    /// Compile a batch, failing on the first invalid entry.
    pub fn compile(&self, raw: &[RawFilter]) -> Result<Vec<CompiledFilter>> {
        raw.iter().map(|filter| self.compile_one(filter)).collect()
    }

    /// Compile a single filter. Checks run in order: field, operator, value.
    pub fn compile_one(&self, raw: &RawFilter) -> Result<CompiledFilter> {
        let field = *self.registry.describe(raw.field.trim())?;

        let operator = OperatorKind::parse(&raw.operator)
            .filter(|op| field.allows(*op))
            .ok_or_else(|| CatalogError::UnsupportedOperator {
                field: field.name.to_string(),
                operator: raw.operator.clone(),
            })?;

        let predicate = match operator.arity() {
            Arity::Nullary => match operator {
                OperatorKind::IsTrue => Predicate::IsTrue,
                OperatorKind::IsFalse => Predicate::IsFalse,
                _ => Predicate::IsNull,
            },
            Arity::Binary => {
                let items = operand_list(&raw.value);
                match items.as_deref() {
                    Some([lo, hi]) => Predicate::Between(coerce(&field, lo)?, coerce(&field, hi)?),
                    _ => {
                        return Err(invalid(&field, &raw.value, "between expects exactly two values"))
                    }
                }
            }
            Arity::Variadic => {
                let items = operand_list(&raw.value)
                    .filter(|items| !items.is_empty())
                    .ok_or_else(|| invalid(&field, &raw.value, "in expects a non-empty list"))?;
                let values = items
                    .iter()
                    .map(|item| coerce(&field, item))
                    .collect::<Result<Vec<_>>>()?;
                Predicate::InSet(values)
            }
            Arity::Unary => {
                let value = coerce(&field, &raw.value)?;
                match operator {
                    OperatorKind::Equals => Predicate::Equals(value),
                    OperatorKind::NotEquals => Predicate::NotEquals(value),
                    OperatorKind::GreaterThan => Predicate::GreaterThan(value),
                    OperatorKind::GreaterOrEqual => Predicate::GreaterOrEqual(value),
                    OperatorKind::LessThan => Predicate::LessThan(value),
                    OperatorKind::LessOrEqual => Predicate::LessOrEqual(value),
                    OperatorKind::Contains => Predicate::Contains(text_operand(&field, value)?),
                    OperatorKind::StartsWith => Predicate::StartsWith(text_operand(&field, value)?),
                    OperatorKind::EndsWith => Predicate::EndsWith(text_operand(&field, value)?),
                    other => {
                        return Err(CatalogError::Internal(format!(
                            "operator {other} has no unary form"
                        )))
                    }
                }
            }
        };

        Ok(CompiledFilter { field, predicate })
    }

    /// Compile a JSON batch: one filter object or an array of them.
    pub fn compile_batch_json(&self, json: &str) -> Result<Vec<CompiledFilter>> {
        self.compile(&parse_batch_json(json)?)
    }
}

/// Parse a JSON filter batch without validating it against a registry.
pub fn parse_batch_json(json: &str) -> Result<Vec<RawFilter>> {
    let parsed: Value = serde_json::from_str(json)
        .map_err(|e| CatalogError::MalformedFilterBatch(format!("invalid JSON: {e}")))?;

    let items = match parsed {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(CatalogError::MalformedFilterBatch(format!(
                "expected an object or array, got {other}"
            )))
        }
    };

    items
        .into_iter()
        .map(|item| {
            let rendered = item.to_string();
            serde_json::from_value::<RawFilter>(item).map_err(|e| {
                CatalogError::MalformedFilterBatch(format!(
                    "each filter needs field and operator ({e}): {rendered}"
                ))
            })
        })
        .collect()
}

/// Accept a list operand as a JSON array or a comma-separated string.
fn operand_list(raw: &Value) -> Option<Vec<Value>> {
    match raw {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|chunk| !chunk.is_empty())
                .map(|chunk| Value::String(chunk.to_string()))
                .collect(),
        ),
        _ => None,
    }
}

fn text_operand(field: &FieldDescriptor, value: FieldValue) -> Result<String> {
    match value {
        FieldValue::Text(s) => Ok(s),
        other => Err(CatalogError::InvalidValue {
            field: field.name.to_string(),
            value: other.to_string(),
            reason: "expected text".into(),
        }),
    }
}

fn invalid(field: &FieldDescriptor, raw: &Value, reason: &str) -> CatalogError {
    CatalogError::InvalidValue {
        field: field.name.to_string(),
        value: render(raw),
        reason: reason.to_string(),
    }
}

fn render(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce a raw operand to the field's declared type.
pub fn coerce(field: &FieldDescriptor, raw: &Value) -> Result<FieldValue> {
    let coerced = match field.value_type {
        ValueType::Boolean => coerce_bool(raw).map(FieldValue::Boolean),
        ValueType::Timestamp => match raw {
            Value::String(s) => parse_timestamp(s).map(FieldValue::Timestamp),
            _ => None,
        },
        ValueType::Integer => coerce_integer(raw).map(FieldValue::Integer),
        ValueType::Real => coerce_real(raw).map(FieldValue::Real),
        ValueType::String => match raw {
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            _ => None,
        },
    };

    coerced.ok_or_else(|| {
        invalid(
            field,
            raw,
            &format!("cannot be read as {}", field.value_type),
        )
    })
}

fn coerce_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_real(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

/// Parse an ISO-8601 timestamp. Offsets are honoured; naive values and bare
/// dates are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
