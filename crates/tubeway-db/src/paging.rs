//! Pagination Engine: 1-based page/limit windows and the empty vs exhausted
//! distinction.

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    limit: u64,
}

/// What a page of results means to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome<T> {
    Rows(Vec<T>),
    /// First page had nothing: no data exists for this query.
    Empty,
    /// A later page had nothing: the caller paged past the end.
    Exhausted,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Zero falls back to the default; `limit` is capped at [`MAX_LIMIT`].
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: if page == 0 { DEFAULT_PAGE } else { page },
            limit: if limit == 0 { DEFAULT_LIMIT } else { limit.min(MAX_LIMIT) },
        }
    }

    /// Parse raw query-string values. Anything that is not a positive integer
    /// falls back to the default instead of failing the request.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        let positive = |raw: Option<&str>| raw.and_then(|s| s.trim().parse::<u64>().ok()).unwrap_or(0);
        Self::new(positive(page), positive(limit))
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Cut this page out of an already materialized list.
    pub fn window<T>(&self, rows: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip()).unwrap_or(usize::MAX);
        rows.into_iter().skip(skip).take(self.limit as usize).collect()
    }

    pub fn outcome<T>(&self, rows: Vec<T>) -> PageOutcome<T> {
        match (rows.is_empty(), self.page) {
            (false, _) => PageOutcome::Rows(rows),
            (true, 1) => PageOutcome::Empty,
            (true, _) => PageOutcome::Exhausted,
        }
    }
}
