//! Pagination normalization.
//!
//! Callers page either with `page`/`size` or with `limit`/`offset`. Both idioms
//! normalize to one canonical `(offset, limit)` window; mixing them is an error.

use serde::Serialize;

use crate::error::{CatalogError, Result};

/// Default page size when the caller supplies none.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size or limit accepted.
pub const MAX_PAGE_SIZE: usize = 100;

/// Which idiom drove the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    Page,
    Offset,
}

/// Canonical pagination window plus page metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PaginationSpec {
    pub offset: usize,
    pub limit: usize,
    /// 1-based page number; derived as `offset / limit + 1` in offset mode.
    pub page: usize,
    pub size: usize,
    pub mode: PaginationMode,
}

impl PaginationSpec {
    /// Offset of the following window, absent on the last page.
    pub fn next_offset(&self, total: usize) -> Option<usize> {
        let next = self.offset.saturating_add(self.limit);
        (next < total).then_some(next)
    }

    /// Offset of the preceding window, absent on the first.
    pub fn prev_offset(&self) -> Option<usize> {
        (self.offset > 0).then(|| self.offset.saturating_sub(self.limit))
    }

    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.size)
    }
}

/// Reconciles the two pagination idioms.
#[derive(Clone, Copy, Debug)]
pub struct PaginationNormalizer {
    default_size: usize,
    max_size: usize,
}

impl Default for PaginationNormalizer {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

impl PaginationNormalizer {
    pub fn new(default_size: usize, max_size: usize) -> Self {
        Self {
            default_size: default_size.clamp(1, max_size.max(1)),
            max_size: max_size.max(1),
        }
    }

    /// Normalize raw parameters. Offset mode is selected when `limit` or
    /// `offset` is present; it requires `limit` and defaults `offset` to 0.
    pub fn normalize(
        &self,
        page: Option<usize>,
        size: Option<usize>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<PaginationSpec> {
        let offset_mode = limit.is_some() || offset.is_some();
        if offset_mode && (page.is_some() || size.is_some()) {
            return Err(CatalogError::MutuallyExclusivePagination);
        }

        if offset_mode {
            let limit = limit.ok_or(CatalogError::MissingRequiredPaginationParameter {
                parameter: "limit",
            })?;
            let limit = self.check_size("limit", limit)?;
            let offset = offset.unwrap_or(0);
            return Ok(PaginationSpec {
                offset,
                limit,
                page: offset / limit + 1,
                size: limit,
                mode: PaginationMode::Offset,
            });
        }

        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(CatalogError::InvalidPaginationParameter {
                parameter: "page",
                value: page.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        let size = self.check_size("size", size.unwrap_or(self.default_size))?;
        let offset = (page - 1)
            .checked_mul(size)
            .ok_or_else(|| CatalogError::InvalidPaginationParameter {
                parameter: "page",
                value: page.to_string(),
                reason: "too large".into(),
            })?;

        Ok(PaginationSpec {
            offset,
            limit: size,
            page,
            size,
            mode: PaginationMode::Page,
        })
    }

    fn check_size(&self, parameter: &'static str, value: usize) -> Result<usize> {
        if value == 0 {
            return Err(CatalogError::InvalidPaginationParameter {
                parameter,
                value: value.to_string(),
                reason: "must be greater than zero".into(),
            });
        }
        if value > self.max_size {
            return Err(CatalogError::InvalidPaginationParameter {
                parameter,
                value: value.to_string(),
                reason: format!("must not exceed {}", self.max_size),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(
        page: Option<usize>,
        size: Option<usize>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<PaginationSpec> {
        PaginationNormalizer::default().normalize(page, size, limit, offset)
    }

    #[test]
    fn test_page_mode() {
        let spec = normalize(Some(1), Some(2), None, None).unwrap();
        assert_eq!((spec.offset, spec.limit), (0, 2));
        assert_eq!(spec.mode, PaginationMode::Page);

        let spec = normalize(Some(3), Some(10), None, None).unwrap();
        assert_eq!((spec.offset, spec.limit, spec.page), (20, 10, 3));
    }

    #[test]
    fn test_page_mode_defaults() {
        let spec = normalize(None, None, None, None).unwrap();
        assert_eq!((spec.offset, spec.limit, spec.page, spec.size), (0, 20, 1, 20));
    }

    #[test]
    fn test_offset_mode_derives_page() {
        let spec = normalize(None, None, Some(1), Some(1)).unwrap();
        assert_eq!((spec.page, spec.size, spec.offset), (2, 1, 1));
        assert_eq!(spec.prev_offset(), Some(0));
        assert_eq!(spec.mode, PaginationMode::Offset);

        let spec = normalize(None, None, Some(10), None).unwrap();
        assert_eq!(spec.offset, 0);
    }

    #[test]
    fn test_offset_requires_limit() {
        let err = normalize(None, None, None, Some(5)).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MissingRequiredPaginationParameter { parameter: "limit" }
        ));
    }

    #[test]
    fn test_mixing_idioms_rejected() {
        for (page, size, limit, offset) in [
            (Some(1), None, Some(5), None),
            (None, Some(5), None, Some(0)),
            (Some(2), Some(5), Some(5), Some(5)),
        ] {
            assert!(matches!(
                normalize(page, size, limit, offset),
                Err(CatalogError::MutuallyExclusivePagination)
            ));
        }
    }

    #[test]
    fn test_bounds() {
        assert!(normalize(Some(0), None, None, None).is_err());
        assert!(normalize(None, Some(0), None, None).is_err());
        assert!(normalize(None, None, Some(0), None).is_err());
        assert!(normalize(None, Some(101), None, None).is_err());
        assert!(normalize(None, Some(100), None, None).is_ok());
        assert!(normalize(Some(usize::MAX), Some(2), None, None).is_err());
    }

    #[test]
    fn test_cursors() {
        let at = |offset| PaginationSpec {
            offset,
            limit: 2,
            page: offset / 2 + 1,
            size: 2,
            mode: PaginationMode::Offset,
        };
        assert_eq!((at(0).next_offset(5), at(0).prev_offset()), (Some(2), None));
        assert_eq!((at(2).next_offset(5), at(2).prev_offset()), (Some(4), Some(0)));
        assert_eq!((at(4).next_offset(5), at(4).prev_offset()), (None, Some(2)));
        assert_eq!(at(1).prev_offset(), Some(0));
        assert_eq!(at(0).total_pages(5), 3);
        assert_eq!(at(0).total_pages(0), 0);
    }
}
