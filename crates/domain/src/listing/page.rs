use serde::Serialize;

/// Link to a neighbouring page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub page: usize,
    pub limit: usize,
}

/// Links to the neighbouring pages, each present only when that page exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageLink>,
}

impl Pagination {
    /// Computes the links for 1-indexed `page` of size `limit` over `total`
    /// matching records.
    pub fn compute(page: usize, limit: usize, total: u64) -> Self {
        let start = (page.saturating_sub(1)).saturating_mul(limit);
        let end = page.saturating_mul(limit);

        Self {
            next: ((end as u64) < total).then(|| PageLink {
                page: page + 1,
                limit,
            }),
            prev: (start > 0).then(|| PageLink {
                page: page - 1,
                limit,
            }),
        }
    }
}

/// One page of an admin listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPage {
    /// Number of records on this page.
    pub count: usize,
    pub pagination: Pagination,
    /// Records after projection.
    pub data: Vec<serde_json::Value>,
}
