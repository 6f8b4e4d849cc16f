//! Geocoding client
//!
//! Resolves a free-text place name to the bounding box of its administrative
//! boundary using a Nominatim-compatible search endpoint.

use crate::api::{build_http_client, check_status, endpoint};
use crate::config::{GeocoderConfig, UserAgentConfig};
use crate::listing::BoundingBox;
use crate::ApiError;
use reqwest::Client;
use serde::Deserialize;

/// One candidate place returned by the geocoding service
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeCandidate {
    #[serde(default)]
    pub class: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// [latMin, latMax, lonMin, lonMax], string-encoded
    #[serde(default)]
    pub boundingbox: Vec<String>,
}

impl GeocodeCandidate {
    fn is_administrative_boundary(&self) -> bool {
        self.class == "boundary" && self.kind == "administrative"
    }
}

/// Client for the geocoding service
pub struct GeocodingClient {
    client: Client,
    base_url: String,
}

impl GeocodingClient {
    pub fn new(config: &GeocoderConfig, user_agent: &UserAgentConfig) -> Result<Self, ApiError> {
        let client = build_http_client(user_agent, config.timeout_secs).map_err(|source| {
            ApiError::Request {
                url: config.base_url.clone(),
                source,
            }
        })?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wraps an existing HTTP client
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    /// Resolves a place name to its administrative bounding box
    ///
    /// # Errors
    ///
    /// * `ApiError::Request` / `ApiError::Status` - the lookup itself failed
    /// * `ApiError::Malformed` - the response or the chosen bounding box is unreadable
    /// * `ApiError::NoBoundaryFound` - no candidate is an administrative boundary
    pub async fn resolve(&self, place: &str) -> Result<BoundingBox, ApiError> {
        let place = normalize_place(place);
        let url = endpoint(&self.base_url, "search");

        tracing::debug!("Geocoding '{}' via {}", place, url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", place.as_str()), ("format", "json")])
            .send()
            .await
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?;
        let response = check_status(response, &url)?;

        let candidates: Vec<GeocodeCandidate> =
            response.json().await.map_err(|e| ApiError::Malformed {
                url: url.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("Geocoder returned {} candidates", candidates.len());

        let chosen = select_boundary(&candidates).ok_or_else(|| ApiError::NoBoundaryFound {
            place: place.clone(),
        })?;

        BoundingBox::from_bounds(&chosen.boundingbox).ok_or_else(|| ApiError::Malformed {
            url,
            message: format!("unusable bounding box {:?}", chosen.boundingbox),
        })
    }
}

/// Ensures every comma in a place name is followed by exactly one space
///
/// `"Ottawa,ON"` and `"Ottawa,   ON"` both become `"Ottawa, ON"`.
pub fn normalize_place(place: &str) -> String {
    let mut normalized = String::with_capacity(place.len() + 4);
    let mut after_comma = false;

    for c in place.trim().chars() {
        if after_comma && c.is_whitespace() {
            continue;
        }
        after_comma = c == ',';
        normalized.push(c);
        if after_comma {
            normalized.push(' ');
        }
    }

    normalized.trim_end().to_string()
}

/// Picks the first candidate tagged as an administrative boundary
pub fn select_boundary(candidates: &[GeocodeCandidate]) -> Option<&GeocodeCandidate> {
    candidates.iter().find(|c| c.is_administrative_boundary())
}
