//! Listings API client
//!
//! This module handles all requests to the listings service, including:
//! - Paginated property searches within a bounding box
//! - Single-property detail lookups
//! - Browser-origin headers the service expects
//! - Classification of rate-limit (403) and other failures

use crate::api::{build_http_client, check_status, endpoint};
use crate::config::{ListingsConfig, UserAgentConfig};
use crate::listing::{BoundingBox, ListingPage};
use crate::ApiError;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Culture code for English results
pub const CULTURE_ID_ENGLISH: u32 = 1;

/// Transaction type code for rentals
pub const TRANSACTION_TYPE_RENT: u32 = 3;

const SEARCH_PATH: &str = "Listing.svc/PropertySearch_Post";
const DETAILS_PATH: &str = "Listing.svc/PropertyDetails";

/// Parameters of one search page request
#[derive(Debug, Clone, Copy)]
pub struct PageQuery {
    pub bbox: BoundingBox,
    pub building_type: u32,
    pub records_per_page: u32,
    pub current_page: u32,
    pub application_id: u32,
}

impl PageQuery {
    /// Form fields in the order the service documents them
    fn form(&self) -> Vec<(&'static str, String)> {
        let [lat_min, lat_max, lon_min, lon_max] = self.bbox.to_bounds();
        vec![
            ("LatitudeMin", lat_min),
            ("LatitudeMax", lat_max),
            ("LongitudeMin", lon_min),
            ("LongitudeMax", lon_max),
            ("CultureId", CULTURE_ID_ENGLISH.to_string()),
            ("TransactionTypeId", TRANSACTION_TYPE_RENT.to_string()),
            ("BuildingTypeId", self.building_type.to_string()),
            ("RecordsPerPage", self.records_per_page.to_string()),
            ("CurrentPage", self.current_page.to_string()),
            ("ApplicationId", self.application_id.to_string()),
        ]
    }
}

/// Client for the listings service
pub struct ListingClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
}

impl ListingClient {
    pub fn new(config: &ListingsConfig, user_agent: &UserAgentConfig) -> Result<Self, ApiError> {
        let client = build_http_client(user_agent, config.timeout_secs).map_err(|source| {
            ApiError::Request {
                url: config.base_url.clone(),
                source,
            }
        })?;
        Self::with_client(client, &config.base_url, &config.origin)
    }

    /// Wraps an existing HTTP client
    ///
    /// `origin` is sent as both `Referer` and `Origin` so requests look like
    /// they come from the service's own web front end.
    pub fn with_client(client: Client, base_url: &str, origin: &str) -> Result<Self, ApiError> {
        let origin_value = HeaderValue::from_str(origin).map_err(|e| ApiError::Malformed {
            url: base_url.to_string(),
            message: format!("invalid origin header '{}': {}", origin, e),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(REFERER, origin_value.clone());
        headers.insert(ORIGIN, origin_value);

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            headers,
        })
    }

    /// Fetches one page of rental listings
    ///
    /// # Errors
    ///
    /// * `ApiError::RateLimited` - the service answered 403
    /// * `ApiError::Status` - any other non-2xx answer
    /// * `ApiError::Request` - transport failure or timeout
    /// * `ApiError::Malformed` - the body is not a search page
    pub async fn fetch_page(&self, query: &PageQuery) -> Result<ListingPage, ApiError> {
        let url = endpoint(&self.base_url, SEARCH_PATH);

        tracing::debug!(
            "Requesting page {} (building type {}, {} per page)",
            query.current_page,
            query.building_type,
            query.records_per_page
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .form(&query.form())
            .send()
            .await
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?;

        let page: ListingPage = read_json(response, &url).await?;

        if page.paging.records_per_page == 0 {
            return Err(ApiError::Malformed {
                url,
                message: "RecordsPerPage is 0".to_string(),
            });
        }

        Ok(page)
    }

    /// Fetches the full detail document of a single property
    pub async fn fetch_details(
        &self,
        property_id: &str,
        reference_number: &str,
        application_id: u32,
    ) -> Result<Value, ApiError> {
        let url = endpoint(&self.base_url, DETAILS_PATH);

        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(&[
                ("ApplicationId", application_id.to_string()),
                ("CultureId", CULTURE_ID_ENGLISH.to_string()),
                ("PropertyID", property_id.to_string()),
                ("ReferenceNumber", reference_number.to_string()),
            ])
            .send()
            .await
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?;

        read_json(response, &url).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
    let response = check_status(response, url)?;

    let body = response.text().await.map_err(|source| ApiError::Request {
        url: url.to_string(),
        source,
    })?;

    serde_json::from_str(&body).map_err(|e| ApiError::Malformed {
        url: url.to_string(),
        message: e.to_string(),
    })
}
