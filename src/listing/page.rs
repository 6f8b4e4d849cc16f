use serde::Deserialize;
use serde_json::Value;

/// Pagination metadata returned with every search page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Paging {
    pub total_records: u64,
    pub records_per_page: u32,
    #[serde(default)]
    pub current_page: Option<u32>,
}

impl Paging {
    /// Number of pages the remote result set spans
    ///
    /// Returns `None` when the service reports a page size of zero.
    pub fn page_count(&self) -> Option<u32> {
        page_count(self.total_records, self.records_per_page)
    }
}

/// One page of listing search results
#[derive(Debug, Clone, Deserialize)]
pub struct ListingPage {
    #[serde(rename = "Results", default)]
    pub results: Vec<Value>,

    #[serde(rename = "Paging")]
    pub paging: Paging,
}

/// `ceil(total_records / records_per_page)`, or `None` for a zero page size
pub fn page_count(total_records: u64, records_per_page: u32) -> Option<u32> {
    if records_per_page == 0 {
        return None;
    }
    let pages = total_records.div_ceil(u64::from(records_per_page));
    Some(u32::try_from(pages).unwrap_or(u32::MAX))
}

/// Page to request next when `stored` records are already checkpointed
///
/// Computed as `ceil(stored / records_per_page) + 1`. A partially stored
/// page counts as complete, so its remainder is not refetched.
pub fn resume_page(stored: usize, records_per_page: u32) -> u32 {
    page_count(stored as u64, records_per_page.max(1))
        .unwrap_or(0)
        .saturating_add(1)
}
