//! Rent statistics from stored listings
//!
//! This module provides functionality for extracting rent figures from
//! harvested records and summarizing them by posting month and as a
//! price distribution.

use crate::listing::ListingRecord;
use crate::storage::{RunRecord, Storage};
use crate::RentalError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Flattened column holding the monthly rent as a plain number
pub const RENT_FIELD: &str = "Property.LeaseRentUnformattedValue";

/// Column holding the posting time in .NET ticks
pub const POSTED_FIELD: &str = "InsertedDateUTC";

/// Ticks (100ns units) per second
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Number of histogram bins used for the rent distribution
pub const DEFAULT_BINS: usize = 10;

/// Average rent of listings posted in one calendar month
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRent {
    /// `YYYY-MM`
    pub month: String,
    pub average: f64,
    pub count: usize,
}

/// One equal-width bucket of the rent distribution
#[derive(Debug, Clone, PartialEq)]
pub struct RentBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Rent summary over a set of listings
#[derive(Debug, Clone)]
pub struct RentStatistics {
    /// Listings considered
    pub total_listings: usize,

    /// Listings with a readable rent
    pub priced_listings: usize,

    pub min_rent: Option<f64>,
    pub max_rent: Option<f64>,
    pub mean_rent: Option<f64>,
    pub median_rent: Option<f64>,

    /// Monthly averages, oldest month first
    pub by_month: Vec<MonthlyRent>,

    pub distribution: Vec<RentBin>,

    /// Listings per (city, building type) in the store
    pub harvests: Vec<(String, u32, u64)>,

    /// Harvest runs, newest first
    pub runs: Vec<RunRecord>,
}

/// Reads a record's monthly rent
///
/// Accepts a JSON number or a numeric string; thousands separators and a
/// leading `$` are tolerated.
pub fn rent_of(record: &ListingRecord) -> Option<f64> {
    let rent = match record.get(RENT_FIELD)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .ok()?,
        _ => return None,
    };

    rent.is_finite().then_some(rent)
}

/// Reads a record's posting time
pub fn posted_at(record: &ListingRecord) -> Option<DateTime<Utc>> {
    let ticks = match record.get(POSTED_FIELD)? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    ticks_to_datetime(ticks)
}

/// Converts .NET ticks to a UTC timestamp
pub fn ticks_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    let since_epoch = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_epoch.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Average rent per posting month, oldest first
///
/// Records missing either a rent or a posting time are skipped.
pub fn rent_by_month<'a, I>(records: I) -> Vec<MonthlyRent>
where
    I: IntoIterator<Item = &'a ListingRecord>,
{
    let mut months: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for record in records {
        if let (Some(rent), Some(posted)) = (rent_of(record), posted_at(record)) {
            let entry = months
                .entry(posted.format("%Y-%m").to_string())
                .or_insert((0.0, 0));
            entry.0 += rent;
            entry.1 += 1;
        }
    }

    months
        .into_iter()
        .map(|(month, (sum, count))| MonthlyRent {
            month,
            average: sum / count as f64,
            count,
        })
        .collect()
}

/// Equal-width histogram of rents
///
/// The last bin includes its upper edge. When every rent is identical the
/// range is widened by 0.5 on each side so the bins have non-zero width.
pub fn rent_distribution(rents: &[f64], bins: usize) -> Vec<RentBin> {
    if rents.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut lower = rents.iter().copied().fold(f64::INFINITY, f64::min);
    let mut upper = rents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lower == upper {
        lower -= 0.5;
        upper += 0.5;
    }

    let width = (upper - lower) / bins as f64;
    let mut counts = vec![0usize; bins];
    for rent in rents {
        let index = (((rent - lower) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| RentBin {
            lower: lower + width * i as f64,
            upper: if i + 1 == bins {
                upper
            } else {
                lower + width * (i + 1) as f64
            },
            count,
        })
        .collect()
}

/// Computes rent statistics over a set of records
pub fn compute_rent_statistics(records: &[ListingRecord]) -> RentStatistics {
    let mut rents: Vec<f64> = records.iter().filter_map(rent_of).collect();
    rents.sort_by(|a, b| a.total_cmp(b));

    let mean_rent = if rents.is_empty() {
        None
    } else {
        Some(rents.iter().sum::<f64>() / rents.len() as f64)
    };

    let median_rent = match rents.len() {
        0 => None,
        n if n % 2 == 1 => Some(rents[n / 2]),
        n => Some((rents[n / 2 - 1] + rents[n / 2]) / 2.0),
    };

    RentStatistics {
        total_listings: records.len(),
        priced_listings: rents.len(),
        min_rent: rents.first().copied(),
        max_rent: rents.last().copied(),
        mean_rent,
        median_rent,
        by_month: rent_by_month(records),
        distribution: rent_distribution(&rents, DEFAULT_BINS),
        harvests: Vec::new(),
        runs: Vec::new(),
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_rent_statistics(storage: &dyn Storage) -> Result<RentStatistics, RentalError> {
    let records: Vec<ListingRecord> = storage
        .all_listings()?
        .into_iter()
        .map(|listing| listing.record)
        .collect();

    let mut stats = compute_rent_statistics(&records);
    stats.harvests = storage.count_listings_by_harvest()?;
    stats.runs = storage.list_runs()?;
    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_rent_statistics(stats: &RentStatistics) {
    println!("=== Rental Statistics ===\n");

    println!("Overview:");
    println!("  Stored listings: {}", stats.total_listings);
    println!("  Listings with rent: {}", stats.priced_listings);
    if let (Some(min), Some(max), Some(mean), Some(median)) = (
        stats.min_rent,
        stats.max_rent,
        stats.mean_rent,
        stats.median_rent,
    ) {
        println!("  Rent range: {:.0} - {:.0}", min, max);
        println!("  Mean rent: {:.2}", mean);
        println!("  Median rent: {:.2}", median);
    }
    println!();

    if !stats.harvests.is_empty() {
        println!("Listings by Harvest:");
        for (city, building_type, count) in &stats.harvests {
            println!(
                "  {} / {} ({}): {}",
                city,
                building_type,
                crate::listing::BuildingType::label(*building_type),
                count
            );
        }
        println!();
    }

    if !stats.by_month.is_empty() {
        println!("Average Rent by Posting Month:");
        for month in &stats.by_month {
            println!(
                "  {}: {:.2} ({} listings)",
                month.month, month.average, month.count
            );
        }
        println!();
    }

    if !stats.distribution.is_empty() {
        println!("Rent Distribution:");
        let widest = stats
            .distribution
            .iter()
            .map(|bin| bin.count)
            .max()
            .unwrap_or(0)
            .max(1);
        for bin in &stats.distribution {
            let bar = "#".repeat(bin.count * 40 / widest);
            println!(
                "  {:>8.0} - {:>8.0} | {:>5} {}",
                bin.lower, bin.upper, bin.count, bar
            );
        }
        println!();
    }

    if !stats.runs.is_empty() {
        println!("Harvest Runs ({}):", stats.runs.len());
        for run in &stats.runs {
            println!(
                "  #{} {} / {} started {} [{}] {} records",
                run.id,
                run.city,
                run.building_type,
                run.started_at,
                run.status.to_db_string(),
                run.records
            );
        }
    }
}
