//! Sort compilation.
//!
//! Grammar: `field[,asc|desc][;field[,asc|desc]]...`, direction defaults to
//! ascending. The identity field is appended as a final ascending key unless
//! the caller already sorts by it, so every ordering is total.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::schema::{FieldDescriptor, FieldRegistry};
use crate::types::Record;

/// One structured sort term as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSortTerm {
    pub field: String,
    #[serde(default)]
    pub direction: Option<String>,
}

impl RawSortTerm {
    pub fn new(field: impl Into<String>, direction: Option<&str>) -> Self {
        Self {
            field: field.into(),
            direction: direction.map(str::to_string),
        }
    }
}

/// One compiled sort key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SortKey {
    pub field: FieldDescriptor,
    pub descending: bool,
}

impl SortKey {
    pub fn order(&self) -> &'static str {
        if self.descending {
            "desc"
        } else {
            "asc"
        }
    }
}

/// Echo of one sort key in the list response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedSort {
    pub by: String,
    pub order: &'static str,
}

/// Ordered sort keys ending in the identity tiebreak.
#[derive(Clone, Debug, PartialEq)]
pub struct SortTerms(Vec<SortKey>);

impl SortTerms {
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Compare two records key by key.
    pub fn compare<R: Record>(&self, a: &R, b: &R) -> Ordering {
        for key in &self.0 {
            let ord = a
                .value_of(key.field.name)
                .sort_cmp(&b.value_of(key.field.name));
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn applied(&self) -> Vec<AppliedSort> {
        self.0
            .iter()
            .map(|key| AppliedSort {
                by: key.field.name.to_string(),
                order: key.order(),
            })
            .collect()
    }

    /// Canonical text form, e.g. `price,desc;id,asc`.
    pub fn to_spec(&self) -> String {
        self.0
            .iter()
            .map(|key| format!("{},{}", key.field.name, key.order()))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Turns sort specifications into `SortTerms` against a field registry.
pub struct SortCompiler<'a> {
    registry: &'a FieldRegistry,
}

impl<'a> SortCompiler<'a> {
    pub fn new(registry: &'a FieldRegistry) -> Self {
        Self { registry }
    }

    /// Compile the text grammar. `None` or blank sorts by identity.
    pub fn compile(&self, raw: Option<&str>) -> Result<SortTerms> {
        let mut terms = Vec::new();
        for segment in raw.unwrap_or_default().split(';').map(str::trim) {
            if segment.is_empty() {
                continue;
            }
            let parts: Vec<&str> = segment
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            let Some((field, rest)) = parts.split_first() else {
                continue;
            };
            let direction = match rest {
                [] => None,
                [direction] => Some(direction.to_string()),
                _ => {
                    self.registry
                        .get(field)
                        .ok_or_else(|| CatalogError::InvalidSortField {
                            field: field.to_string(),
                        })?;
                    return Err(CatalogError::InvalidSortDirection {
                        field: field.to_string(),
                        direction: rest.join(","),
                    });
                }
            };
            terms.push(RawSortTerm {
                field: field.to_string(),
                direction,
            });
        }
        self.compile_terms(&terms)
    }

    /// Compile structured terms. An empty list sorts by identity.
    pub fn compile_terms(&self, raw: &[RawSortTerm]) -> Result<SortTerms> {
        let mut keys: Vec<SortKey> = Vec::with_capacity(raw.len() + 1);

        for term in raw {
            let name = term.field.trim();
            let field = *self
                .registry
                .get(name)
                .ok_or_else(|| CatalogError::InvalidSortField {
                    field: name.to_string(),
                })?;
            let descending = match term.direction.as_deref().map(str::trim) {
                None | Some("") => false,
                Some(d) if d.eq_ignore_ascii_case("asc") => false,
                Some(d) if d.eq_ignore_ascii_case("desc") => true,
                Some(d) => {
                    return Err(CatalogError::InvalidSortDirection {
                        field: name.to_string(),
                        direction: d.to_string(),
                    })
                }
            };
            if keys.iter().any(|k| k.field.name == field.name) {
                continue;
            }
            keys.push(SortKey { field, descending });
        }

        let identity = *self.registry.identity();
        if !keys.iter().any(|k| k.field.name == identity.name) {
            keys.push(SortKey {
                field: identity,
                descending: false,
            });
        }

        Ok(SortTerms(keys))
    }
}
