//! Harvest module for collecting listings page by page
//!
//! This module contains the core harvesting logic, including:
//! - The checkpointed, resumable page loop
//! - Randomized pacing between pages and backoff after failures
//! - Checkpoint file reading and writing

mod checkpoint;
mod harvester;
mod policy;

pub use checkpoint::{checkpoint_path, load_checkpoint, save_checkpoint};
pub use harvester::{HarvestReport, HarvestSettings, Harvester};
pub use policy::{DelayRange, RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};

use crate::api::GeocodingClient;
use crate::config::Config;
use crate::listing::BoundingBox;
use crate::RentalError;
use std::path::{Path, PathBuf};

/// Where a harvest should search
#[derive(Debug, Clone, Copy)]
pub enum Area {
    /// Resolve the city through the geocoding service
    Geocode,
    /// Use a known bounding box and skip geocoding
    Fixed(BoundingBox),
}

/// Runs a complete harvest for a city
///
/// This is the main entry point for a harvest. It will:
/// 1. Resolve the city to a bounding box (unless one is given)
/// 2. Build the listings client and harvester from configuration
/// 3. Resume from the checkpoint and fetch every remaining page
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `city` - City name, e.g. `"Ottawa, ON"`
/// * `building_type` - Building type code (1 = house, 17 = apartment)
/// * `area` - Whether to geocode the city or use a fixed box
/// * `checkpoint` - Override for the checkpoint location
///
/// # Example
///
/// ```no_run
/// use rental_harvest::config::load_config;
/// use rental_harvest::harvest::{harvest_city, Area};
/// use rental_harvest::BuildingType;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = harvest_city(&config, "Ottawa, ON", BuildingType::APARTMENT, Area::Geocode, None).await?;
/// println!("{} listings", report.listings.len());
/// # Ok(())
/// # }
/// ```
pub async fn harvest_city(
    config: &Config,
    city: &str,
    building_type: u32,
    area: Area,
    checkpoint: Option<&Path>,
) -> Result<HarvestReport, RentalError> {
    let bbox = match area {
        Area::Fixed(bbox) => bbox,
        Area::Geocode => {
            let geocoder = GeocodingClient::new(&config.geocoder, &config.user_agent)?;
            let bbox = geocoder.resolve(city).await?;
            tracing::info!("Resolved {} to bounding box {}", city, bbox);
            bbox
        }
    };

    let checkpoint = resolve_checkpoint(config, city, building_type, checkpoint);
    let harvester = Harvester::from_config(config)?;

    Ok(harvester
        .harvest(city, &bbox, building_type, &checkpoint)
        .await?)
}

/// Checkpoint path for a harvest: the override if given, else the configured directory
pub fn resolve_checkpoint(
    config: &Config,
    city: &str,
    building_type: u32,
    checkpoint: Option<&Path>,
) -> PathBuf {
    match checkpoint {
        Some(path) => path.to_path_buf(),
        None => checkpoint_path(
            Path::new(&config.harvest.checkpoint_dir),
            city,
            building_type,
        ),
    }
}
