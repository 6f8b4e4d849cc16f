//! Rental-Harvest: a patient listings harvester
//!
//! This crate resolves a city to a bounding box, pages through a rental
//! listings API at a pace the remote service tolerates, checkpoints after every
//! page so interrupted runs resume, and keeps harvested listings in a local
//! document store for export and rent statistics.

pub mod api;
pub mod config;
pub mod harvest;
pub mod listing;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Rental-Harvest operations
#[derive(Debug, Error)]
pub enum RentalError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Harvest error: {0}")]
    Harvest(#[from] HarvestError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised by the geocoding and listings clients
///
/// Every variant except `NoBoundaryFound` is a request error in the sense
/// that the remote call did not produce a usable response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("Rate limited (HTTP 403) by {url}")]
    RateLimited { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("No administrative boundary found for '{place}'")]
    NoBoundaryFound { place: String },
}

impl ApiError {
    /// HTTP status carried by this error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(403),
            Self::Status { status, .. } => Some(*status),
            Self::Request { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the remote service asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(403)
    }
}

/// Errors reading or writing a harvest checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint line {line} is not valid JSON: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("Checkpoint line {line} is not a JSON object")]
    NotAnObject { line: usize },

    #[error("Failed to encode checkpoint record: {0}")]
    Encode(serde_json::Error),
}

/// Errors that end a harvest early
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Failed to persist checkpoint {path}: {source}")]
    Checkpoint {
        path: String,
        source: CheckpointError,
    },

    #[error("Giving up on page {page} after {attempts} attempts: {source}")]
    RetriesExhausted {
        page: u32,
        attempts: u32,
        source: ApiError,
    },
}

/// Result type alias for Rental-Harvest operations
pub type Result<T> = std::result::Result<T, RentalError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{Harvester, RetryPolicy};
pub use listing::{BoundingBox, BuildingType, ListingPage, ListingRecord, ListingSet};
