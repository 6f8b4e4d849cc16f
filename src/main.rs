//! Rental-Harvest main entry point
//!
//! This is the command-line interface for the Rental-Harvest listings harvester.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rental_harvest::config::{load_config_with_hash, Config};
use rental_harvest::harvest::{harvest_city, load_checkpoint, resolve_checkpoint, Area};
use rental_harvest::output::{export_json, load_rent_statistics, print_listings, print_rent_statistics};
use rental_harvest::storage::{open_storage, ReplaceScope, Storage};
use rental_harvest::{api::ListingClient, BoundingBox, BuildingType, RentalError};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Rental-Harvest: a patient rental listings harvester
///
/// Rental-Harvest resolves a city to a bounding box, pages through the
/// listings service slowly enough not to be blocked, checkpoints after every
/// page, and keeps the results in a local store for export and statistics.
#[derive(Parser, Debug)]
#[command(name = "rental-harvest")]
#[command(version)]
#[command(about = "A patient rental listings harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest every listing page for a city, resuming from its checkpoint
    Harvest {
        /// City to search, e.g. "Ottawa, ON"
        #[arg(long)]
        city: String,

        /// Building type code (1 = house, 17 = apartment)
        #[arg(long, default_value_t = BuildingType::APARTMENT)]
        building_type: u32,

        /// Skip geocoding and search this box: latMin,latMax,lonMin,lonMax
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Option<BoundingBox>,

        /// Checkpoint file (defaults to <checkpoint-dir>/<city>_<type>.jsonl)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Delete the checkpoint and start from page 1
        #[arg(long)]
        fresh: bool,

        /// Replace this city's stored listings with the harvest result
        #[arg(long)]
        publish: bool,
    },

    /// Validate config and show what a harvest would use
    Check,

    /// Replace all stored listings with the contents of a checkpoint file
    Import {
        /// Checkpoint file to load
        #[arg(value_name = "CHECKPOINT")]
        checkpoint: PathBuf,

        /// City label for the imported listings (defaults to the file name)
        #[arg(long)]
        city: Option<String>,

        /// Building type code of the imported listings
        #[arg(long, default_value_t = BuildingType::APARTMENT)]
        building_type: u32,
    },

    /// Show the first stored listings
    List {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Write every stored listing to stdout as JSON
    Dump,

    /// Fetch the detail document of one property
    Details {
        #[arg(value_name = "PROPERTY_ID")]
        property_id: String,

        #[arg(value_name = "REFERENCE_NUMBER")]
        reference_number: String,
    },

    /// Show harvest runs and rent statistics from the database
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Harvest {
            city,
            building_type,
            bbox,
            checkpoint,
            fresh,
            publish,
        } => {
            let options = HarvestOptions {
                city,
                building_type,
                bbox,
                checkpoint,
                fresh,
                publish,
            };
            handle_harvest(&config, &config_hash, options).await
        }
        Command::Check => handle_check(&config, &config_hash),
        Command::Import {
            checkpoint,
            city,
            building_type,
        } => handle_import(&config, &checkpoint, city, building_type),
        Command::List { limit } => handle_list(&config, limit),
        Command::Dump => handle_dump(&config),
        Command::Details {
            property_id,
            reference_number,
        } => handle_details(&config, &property_id, &reference_number).await,
        Command::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rental_harvest=info,warn"),
            1 => EnvFilter::new("rental_harvest=debug,info"),
            2 => EnvFilter::new("rental_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Parses `latMin,latMax,lonMin,lonMax`
fn parse_bbox(value: &str) -> Result<BoundingBox, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    BoundingBox::from_bounds(&parts)
        .ok_or_else(|| format!("expected four numbers latMin,latMax,lonMin,lonMax, got '{value}'"))
}

struct HarvestOptions {
    city: String,
    building_type: u32,
    bbox: Option<BoundingBox>,
    checkpoint: Option<PathBuf>,
    fresh: bool,
    publish: bool,
}

/// Handles the harvest command
async fn handle_harvest(
    config: &Config,
    config_hash: &str,
    options: HarvestOptions,
) -> anyhow::Result<()> {
    let checkpoint = resolve_checkpoint(
        config,
        &options.city,
        options.building_type,
        options.checkpoint.as_deref(),
    );

    if options.fresh && checkpoint.exists() {
        tracing::info!("Starting fresh harvest (removing {})", checkpoint.display());
        std::fs::remove_file(&checkpoint)
            .with_context(|| format!("Failed to remove checkpoint {}", checkpoint.display()))?;
    }

    let area = match options.bbox {
        Some(bbox) => Area::Fixed(bbox),
        None => Area::Geocode,
    };

    let mut storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
    let abandoned = storage.abandon_stale_runs(&options.city, options.building_type)?;
    if abandoned > 0 {
        tracing::warn!(
            "Marked {} interrupted run(s) for {} as failed",
            abandoned,
            options.city
        );
    }
    let run_id = storage.create_run(&options.city, options.building_type, config_hash)?;

    tracing::info!(
        "Starting harvest run #{} for {} ({}), checkpoint {}",
        run_id,
        options.city,
        BuildingType::label(options.building_type),
        checkpoint.display()
    );

    let report = match harvest_city(
        config,
        &options.city,
        options.building_type,
        area,
        Some(&checkpoint),
    )
    .await
    {
        Ok(report) => report,
        Err(e) => return Err(record_failed_run(&mut storage, run_id, &options.city, e)),
    };

    storage.complete_run(run_id, report.listings.len() as u64)?;

    println!("=== Harvest Complete ===\n");
    println!("  City: {}", options.city);
    println!(
        "  Building type: {} ({})",
        options.building_type,
        BuildingType::label(options.building_type)
    );
    println!("  Started at page: {}", report.start_page);
    println!("  Resumed records: {}", report.resumed_records);
    println!("  Pages fetched: {}", report.pages_fetched);
    println!("  Failed requests: {}", report.failed_requests);
    println!("  Total listings: {}", report.listings.len());
    println!("  Checkpoint: {}", checkpoint.display());

    if options.publish {
        let stored = storage.replace_listings(
            ReplaceScope::SameHarvest,
            &options.city,
            options.building_type,
            report.listings.records(),
        )?;
        println!(
            "\n✓ Published {} listings to {}",
            stored, config.output.database_path
        );
    }

    Ok(())
}

/// Marks a run failed and returns the harvest error for the caller
///
/// A storage failure while marking the run is logged; the harvest error is
/// what gets reported.
fn record_failed_run<S: Storage>(
    storage: &mut S,
    run_id: i64,
    city: &str,
    error: RentalError,
) -> anyhow::Error {
    tracing::error!("Harvest failed: {}", error);

    if let Err(e) = storage.fail_run(run_id) {
        tracing::error!("Failed to mark run #{} as failed: {}", run_id, e);
    }

    anyhow::Error::new(error).context(format!("Harvest of {} failed", city))
}

/// Handles the check command: validates config and shows what a harvest would use
fn handle_check(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    println!("=== Rental-Harvest Configuration ===\n");

    println!("Harvest:");
    println!("  Records per page: {}", config.harvest.records_per_page);
    println!("  Application ID: {}", config.harvest.application_id);
    println!(
        "  Page delay: {}s - {}s",
        config.harvest.page_delay_min_secs, config.harvest.page_delay_max_secs
    );
    println!("  Dedupe on merge: {}", config.harvest.dedupe_on_merge);
    println!("  Checkpoint dir: {}", config.harvest.checkpoint_dir);

    println!("\nRetry:");
    println!(
        "  Backoff: {}s - {}s (x{}, capped at {}s)",
        config.retry.backoff_min_secs,
        config.retry.backoff_max_secs,
        config.retry.multiplier,
        config.retry.effective_max_backoff_secs()
    );
    match config.retry.max_attempts {
        Some(attempts) => println!("  Max attempts: {}", attempts),
        None => println!("  Max attempts: unlimited"),
    }

    println!("\nEndpoints:");
    println!("  Listings: {}", config.listings.base_url);
    println!("  Geocoder: {}", config.geocoder.base_url);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.client_name);
    println!("  Version: {}", config.user_agent.client_version);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid (hash: {})", config_hash);

    Ok(())
}

/// Handles the import command
fn handle_import(
    config: &Config,
    checkpoint: &Path,
    city: Option<String>,
    building_type: u32,
) -> anyhow::Result<()> {
    let city = match city {
        Some(city) => city,
        None => match checkpoint.file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) => stem.to_string(),
            None => bail!("Cannot derive a city from {}; pass --city", checkpoint.display()),
        },
    };

    let records = load_checkpoint(checkpoint)
        .with_context(|| format!("Failed to read checkpoint {}", checkpoint.display()))?;

    let mut storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
    let stored =
        storage.replace_listings(ReplaceScope::Everything, &city, building_type, &records)?;

    println!(
        "✓ Imported {} listings from {} into {}",
        stored,
        checkpoint.display(),
        config.output.database_path
    );

    Ok(())
}

/// Handles the list command
fn handle_list(config: &Config, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;

    let listings = storage.list_listings(limit)?;
    print_listings(&listings);
    println!(
        "\nShowing {} of {} stored listings",
        listings.len(),
        storage.count_listings()?
    );

    Ok(())
}

/// Handles the dump command
fn handle_dump(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;

    let written = export_json(&storage, std::io::stdout().lock())?;
    tracing::info!("Dumped {} listings", written);

    Ok(())
}

/// Handles the details command
async fn handle_details(
    config: &Config,
    property_id: &str,
    reference_number: &str,
) -> anyhow::Result<()> {
    let client = ListingClient::new(&config.listings, &config.user_agent)?;
    let details = client
        .fetch_details(property_id, reference_number, config.harvest.application_id)
        .await
        .with_context(|| format!("Failed to fetch details of property {}", property_id))?;

    println!("{}", serde_json::to_string_pretty(&details)?);

    Ok(())
}

/// Handles the stats command: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;

    let stats = load_rent_statistics(&storage)?;
    print_rent_statistics(&stats);

    Ok(())
}
