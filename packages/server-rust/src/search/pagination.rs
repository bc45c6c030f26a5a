//! `page`/`limit` handling for list endpoints.

use apikit_core::{QueryBuilder, Record, RequestInput};

use crate::config::PaginationConfig;
use crate::storage::RecordStore;

pub const PAGE_PARAM: &str = "page";
pub const LIMIT_PARAM: &str = "limit";

/// Requested page, 1-based, with a clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Reads `page` (default 1, at least 1) and `limit` (default and upper
    /// bound from `config`, at least 1).
    #[must_use]
    pub fn from_input(input: &RequestInput, config: &PaginationConfig) -> Self {
        let default_limit = i64::try_from(config.default_limit).unwrap_or(i64::MAX);
        let max_limit = config.max_limit.max(1);
        let page = u64::try_from(input.integer(PAGE_PARAM, 1)).unwrap_or(0).max(1);
        let limit = u64::try_from(input.integer(LIMIT_PARAM, default_limit))
            .unwrap_or(0)
            .clamp(1, max_limit);
        Self { page, limit }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages for `total` rows; 1 when there are none.
    #[must_use]
    pub fn last_page(&self, total: u64) -> u64 {
        if total == 0 {
            1
        } else {
            total.div_ceil(self.limit)
        }
    }

    pub fn apply(&self, query: &mut QueryBuilder) {
        query
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(usize::MAX));
    }
}

/// One page of records plus paging metadata.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Record>,
    pub total: u64,
    pub current_page: u64,
    pub last_page: u64,
}

/// Counts the query's matches, then fetches the requested page.
///
/// # Errors
///
/// Propagates record store failures.
pub fn paginate(
    store: &dyn RecordStore,
    query: &QueryBuilder,
    pagination: Pagination,
) -> anyhow::Result<Page> {
    let total = store.count(&query.without_paging())?;
    let mut paged = query.clone();
    pagination.apply(&mut paged);
    let records = store.fetch(&paged)?;
    Ok(Page {
        records,
        total,
        current_page: pagination.page,
        last_page: pagination.last_page(total),
    })
}
