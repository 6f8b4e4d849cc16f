//! Configuration module for Rental-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use rental_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Page size: {}", config.harvest.records_per_page);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, GeocoderConfig, HarvestConfig, ListingsConfig, OutputConfig, RetryConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
