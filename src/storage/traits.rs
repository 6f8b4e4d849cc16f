//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::listing::ListingRecord;
use crate::storage::{ReplaceScope, RunRecord, StoredListing};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for document store implementations
///
/// The store holds published listings (one JSON document per listing) and a
/// log of harvest runs.
pub trait Storage {
    // ===== Run Management =====

    /// Records the start of a harvest run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, city: &str, building_type: u32, config_hash: &str)
        -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Lists all runs, newest first
    fn list_runs(&self) -> StorageResult<Vec<RunRecord>>;

    /// Marks a run as completed with its final record count
    fn complete_run(&mut self, run_id: i64, records: u64) -> StorageResult<()>;

    /// Marks a run as failed
    fn fail_run(&mut self, run_id: i64) -> StorageResult<()>;

    /// Marks runs of this (city, building type) still recorded as running as failed
    ///
    /// A killed process never finishes its run row; call this before starting
    /// a new run for the same harvest.
    ///
    /// # Returns
    ///
    /// The number of runs updated
    fn abandon_stale_runs(&mut self, city: &str, building_type: u32) -> StorageResult<usize>;

    // ===== Listings =====

    /// Replaces stored listings with the given records in one transaction
    ///
    /// `scope` decides what is removed first: every stored listing, or only
    /// those from the same (city, building type) harvest.
    ///
    /// # Returns
    ///
    /// The number of records inserted
    fn replace_listings(
        &mut self,
        scope: ReplaceScope,
        city: &str,
        building_type: u32,
        records: &[ListingRecord],
    ) -> StorageResult<usize>;

    /// Gets the first `limit` stored listings in insertion order
    fn list_listings(&self, limit: usize) -> StorageResult<Vec<StoredListing>>;

    /// Gets every stored listing in insertion order
    fn all_listings(&self) -> StorageResult<Vec<StoredListing>>;

    /// Counts stored listings
    fn count_listings(&self) -> StorageResult<u64>;

    /// Counts stored listings per (city, building type)
    fn count_listings_by_harvest(&self) -> StorageResult<Vec<(String, u32, u64)>>;
}
