//! Clients for the external services a harvest depends on
//!
//! This module contains:
//! - HTTP client construction with a proper user agent string
//! - The geocoding client that turns a city into a bounding box
//! - The listings client that fetches search pages and property details

mod geocoder;
mod listings;

pub use geocoder::{normalize_place, select_boundary, GeocodeCandidate, GeocodingClient};
pub use listings::{ListingClient, PageQuery, CULTURE_ID_ENGLISH, TRANSACTION_TYPE_RENT};

use crate::config::UserAgentConfig;
use crate::ApiError;
use reqwest::{Client, Response};
use std::time::Duration;

/// Builds an HTTP client with a per-request timeout
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout_secs` - Upper bound for a single request, including the body
///
/// # Example
///
/// ```no_run
/// use rental_harvest::api::build_http_client;
/// use rental_harvest::config::UserAgentConfig;
///
/// let client = build_http_client(&UserAgentConfig::default(), 10).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    // Format: ClientName/Version (+ContactEmail)
    let user_agent = format!(
        "{}/{} (+{})",
        config.client_name, config.client_version, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a non-success status to an error, logging it the way callers expect
///
/// HTTP 403 is the listings service's rate-limit signal and is reported as
/// `RateLimited`; any other non-2xx status becomes `Status`.
pub(crate) fn check_status(response: Response, url: &str) -> Result<Response, ApiError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 403 {
        tracing::warn!("HTTP 403 from {}: rate limited", url);
        return Err(ApiError::RateLimited {
            url: url.to_string(),
        });
    }

    tracing::warn!("HTTP {} from {}", status.as_u16(), url);
    Err(ApiError::Status {
        url: url.to_string(),
        status: status.as_u16(),
    })
}

/// Joins an endpoint path onto a configured base URL
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
