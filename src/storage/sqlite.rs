//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::listing::ListingRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ReplaceScope, RunRecord, RunStatus, StoredListing};
use crate::RentalError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const LISTING_COLUMNS: &str = "id, listing_id, city, building_type, record, stored_at";
const RUN_COLUMNS: &str =
    "id, city, building_type, started_at, finished_at, config_hash, status, records";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(RentalError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, RentalError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, RentalError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_listings(&self, sql: &str, limit: i64) -> StorageResult<Vec<StoredListing>> {
        let mut stmt = self.conn.prepare(sql)?;
        let listings = stmt
            .query_map(params![limit], listing_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus, records: u64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, records = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, records as i64, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<StoredListing> {
    let raw: String = row.get(4)?;
    let record: ListingRecord = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(StoredListing {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        city: row.get(2)?,
        building_type: row.get(3)?,
        record,
        stored_at: row.get(5)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        city: row.get(1)?,
        building_type: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Failed),
        records: row.get::<_, i64>(7)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        city: &str,
        building_type: u32,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (city, building_type, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                city,
                building_type,
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC LIMIT 1"),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn list_runs(&self) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC"))?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    fn complete_run(&mut self, run_id: i64, records: u64) -> StorageResult<()> {
        self.finish_run(run_id, RunStatus::Completed, records)
    }

    fn fail_run(&mut self, run_id: i64) -> StorageResult<()> {
        let records = self.get_run(run_id)?.records;
        self.finish_run(run_id, RunStatus::Failed, records)
    }

    fn abandon_stale_runs(&mut self, city: &str, building_type: u32) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2
             WHERE status = ?3 AND city = ?4 AND building_type = ?5",
            params![
                RunStatus::Failed.to_db_string(),
                now,
                RunStatus::Running.to_db_string(),
                city,
                building_type
            ],
        )?;
        Ok(updated)
    }

    // ===== Listings =====

    fn replace_listings(
        &mut self,
        scope: ReplaceScope,
        city: &str,
        building_type: u32,
        records: &[ListingRecord],
    ) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        match scope {
            ReplaceScope::Everything => {
                tx.execute("DELETE FROM properties", [])?;
            }
            ReplaceScope::SameHarvest => {
                tx.execute(
                    "DELETE FROM properties WHERE city = ?1 AND building_type = ?2",
                    params![city, building_type],
                )?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO properties (listing_id, city, building_type, record, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for record in records {
                let document = serde_json::to_string(record)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                stmt.execute(params![record.id(), city, building_type, document, now])?;
            }
        }

        tx.commit()?;
        Ok(records.len())
    }

    fn list_listings(&self, limit: usize) -> StorageResult<Vec<StoredListing>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_listings(
            &format!("SELECT {LISTING_COLUMNS} FROM properties ORDER BY id ASC LIMIT ?1"),
            limit,
        )
    }

    fn all_listings(&self) -> StorageResult<Vec<StoredListing>> {
        // SQLite treats a negative LIMIT as no limit
        self.query_listings(
            &format!("SELECT {LISTING_COLUMNS} FROM properties ORDER BY id ASC LIMIT ?1"),
            -1,
        )
    }

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_listings_by_harvest(&self) -> StorageResult<Vec<(String, u32, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT city, building_type, COUNT(*) FROM properties
             GROUP BY city, building_type ORDER BY city, building_type",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, i64>(2)? as u64,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}
