//! Listing data model
//!
//! This module provides the types that flow through a harvest.
//!
//! # Components
//!
//! - `BoundingBox`: the lat/long rectangle a harvest searches
//! - `ListingPage`: one page of search results plus pagination metadata
//! - `ListingRecord`: a single listing as a flattened, ordered field map
//! - `ListingSet`: the accumulated records for one (city, building type) pair

mod bbox;
mod page;
mod record;
mod set;

// Re-export main types
pub use bbox::BoundingBox;
pub use page::{page_count, resume_page, ListingPage, Paging};
pub use record::ListingRecord;
pub use set::ListingSet;

/// Building type codes understood by the listings service
///
/// Codes are passed through to the service unvalidated; these constants
/// only name the ones the application uses.
pub struct BuildingType;

impl BuildingType {
    pub const HOUSE: u32 = 1;
    pub const APARTMENT: u32 = 17;

    /// Human-readable label for a building type code
    pub fn label(code: u32) -> &'static str {
        match code {
            Self::HOUSE => "house",
            Self::APARTMENT => "apartment",
            _ => "other",
        }
    }
}
