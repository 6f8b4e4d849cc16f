//! Output module for exporting listings and reporting on them
//!
//! This module handles:
//! - Exporting stored listings as a JSON array
//! - Printing a short table of stored listings
//! - Rent statistics by posting month and as a distribution

pub mod stats;

pub use stats::{
    compute_rent_statistics, load_rent_statistics, print_rent_statistics, rent_by_month,
    rent_distribution, MonthlyRent, RentBin, RentStatistics,
};

use crate::listing::ListingRecord;
use crate::storage::{Storage, StoredListing};
use serde_json::Value;
use std::io::Write;

/// Flattened column with the street address
const ADDRESS_FIELD: &str = "Property.Address.AddressText";

/// Writes every stored listing to `writer` as a pretty-printed JSON array
///
/// Records are written exactly as stored, in insertion order.
///
/// # Returns
///
/// The number of listings written
pub fn export_json<W: Write>(storage: &dyn Storage, mut writer: W) -> crate::Result<usize> {
    let records: Vec<ListingRecord> = storage
        .all_listings()?
        .into_iter()
        .map(|listing| listing.record)
        .collect();

    serde_json::to_writer_pretty(&mut writer, &records)?;
    writeln!(writer)?;
    writer.flush()?;

    tracing::debug!("Exported {} listings as JSON", records.len());
    Ok(records.len())
}

/// Prints stored listings as a compact table
pub fn print_listings(listings: &[StoredListing]) {
    if listings.is_empty() {
        println!("No listings stored.");
        return;
    }

    println!("{:<12} {:<20} {:>10}  Address", "Id", "City", "Rent");
    for listing in listings {
        let rent = stats::rent_of(&listing.record)
            .map(|rent| format!("{:.0}", rent))
            .unwrap_or_else(|| "-".to_string());
        let address = match listing.record.get(ADDRESS_FIELD) {
            Some(Value::String(address)) => address.replace('|', ", "),
            _ => "-".to_string(),
        };

        println!(
            "{:<12} {:<20} {:>10}  {}",
            listing.listing_id.as_deref().unwrap_or("-"),
            listing.city,
            rent,
            address
        );
    }
}
