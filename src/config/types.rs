use serde::Deserialize;

/// Main configuration structure for Rental-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub listings: ListingsConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Harvest loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HarvestConfig {
    /// Page size requested from the listings API
    pub records_per_page: u32,

    /// Client-assigned application identifier sent with every search
    pub application_id: u32,

    /// Lower bound of the randomized pause between pages (seconds)
    pub page_delay_min_secs: u64,

    /// Upper bound of the randomized pause between pages (seconds)
    pub page_delay_max_secs: u64,

    /// Skip records whose `Id` is already in the listing set
    pub dedupe_on_merge: bool,

    /// Directory holding one checkpoint file per (city, building type)
    pub checkpoint_dir: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            records_per_page: 200,
            application_id: 1,
            page_delay_min_secs: 600,
            page_delay_max_secs: 900,
            dedupe_on_merge: false,
            checkpoint_dir: "./data".to_string(),
        }
    }
}

/// Backoff applied when a page request fails
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,

    /// Consecutive failures of one page before giving up; absent means never
    pub max_attempts: Option<u32>,

    /// Growth factor applied per consecutive failure (1.0 keeps it flat)
    pub multiplier: f64,

    /// Ceiling for a single backoff after growth (seconds); absent means
    /// `backoff-max-secs`
    pub max_backoff_secs: Option<u64>,
}

impl RetryConfig {
    /// The backoff ceiling in effect
    pub fn effective_max_backoff_secs(&self) -> u64 {
        self.max_backoff_secs.unwrap_or(self.backoff_max_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_min_secs: 3000,
            backoff_max_secs: 3600,
            max_attempts: None,
            multiplier: 1.0,
            max_backoff_secs: None,
        }
    }
}

/// Listings API endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ListingsConfig {
    pub base_url: String,

    /// Value sent as both `Referer` and `Origin`
    pub origin: String,

    pub timeout_secs: u64,
}

impl Default for ListingsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api2.realtor.ca".to_string(),
            origin: "https://www.realtor.ca/".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Geocoding endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            timeout_secs: 10,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the client
    pub client_name: String,

    /// Version of the client
    pub client_version: String,

    /// Email address the geocoding service can reach us at
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            client_name: "RentalHarvest".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_email: "ops@example.com".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite document store
    #[serde(rename = "database-path")]
    pub database_path: String,
}
