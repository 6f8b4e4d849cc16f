//! Checkpointed harvest loop
//!
//! This module contains the loop that pages through the listings service for
//! one bounding box and building type:
//! - Resuming from the page after the last checkpointed one
//! - Correcting the page count from each response's pagination metadata
//! - Persisting the full listing set after every page
//! - Pacing requests and backing off on failures

use crate::api::{ListingClient, PageQuery};
use crate::config::Config;
use crate::harvest::checkpoint::{load_checkpoint, save_checkpoint};
use crate::harvest::policy::{DelayRange, RetryPolicy, Sleeper, TokioSleeper};
use crate::listing::{resume_page, BoundingBox, ListingRecord, ListingSet};
use crate::{ApiError, CheckpointError, HarvestError};
use std::path::Path;

/// Tunables of the harvest loop
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub records_per_page: u32,
    pub application_id: u32,
    pub page_delay: DelayRange,
    pub dedupe_on_merge: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self::from(&crate::config::HarvestConfig::default())
    }
}

impl From<&crate::config::HarvestConfig> for HarvestSettings {
    fn from(config: &crate::config::HarvestConfig) -> Self {
        Self {
            records_per_page: config.records_per_page,
            application_id: config.application_id,
            page_delay: DelayRange::from(config),
            dedupe_on_merge: config.dedupe_on_merge,
        }
    }
}

/// What a finished harvest produced
#[derive(Debug)]
pub struct HarvestReport {
    /// Every record harvested so far, checkpointed ones included
    pub listings: ListingSet,

    /// Page the run started from (1 for a fresh harvest)
    pub start_page: u32,

    /// Records loaded from the checkpoint before the first request
    pub resumed_records: usize,

    /// Pages successfully fetched during this run
    pub pages_fetched: u32,

    /// Page requests that failed and were retried
    pub failed_requests: u32,
}

/// Drives the listings client across every page of a search
pub struct Harvester<S = TokioSleeper> {
    client: ListingClient,
    settings: HarvestSettings,
    retry: RetryPolicy,
    sleeper: S,
}

impl Harvester<TokioSleeper> {
    pub fn new(client: ListingClient, settings: HarvestSettings, retry: RetryPolicy) -> Self {
        Self {
            client,
            settings,
            retry,
            sleeper: TokioSleeper,
        }
    }

    /// Builds a harvester and its listings client from configuration
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let client = ListingClient::new(&config.listings, &config.user_agent)?;
        Ok(Self::new(
            client,
            HarvestSettings::from(&config.harvest),
            RetryPolicy::from(&config.retry),
        ))
    }
}

impl<S: Sleeper> Harvester<S> {
    /// Replaces how the harvester waits between requests
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> Harvester<T> {
        Harvester {
            client: self.client,
            settings: self.settings,
            retry: self.retry,
            sleeper,
        }
    }

    /// Harvests every listing page for a bounding box and building type
    ///
    /// # Flow
    ///
    /// 1. Load the checkpoint, if any, and resume at `ceil(n / page_size) + 1`
    /// 2. Assume one page beyond the resume page until the first response
    /// 3. For each page:
    ///    a. Fetch it
    ///    b. Take the page count from the response's pagination metadata
    ///    c. Append its records to the listing set
    ///    d. Rewrite the checkpoint
    ///    e. Advance and pause before the next page
    /// 4. On a failed request, back off and retry the same page
    ///
    /// # Arguments
    ///
    /// * `city` - Label used in log lines
    /// * `bbox` - Area to search
    /// * `building_type` - Building type code, passed through unvalidated
    /// * `checkpoint` - File to resume from and persist to
    ///
    /// # Errors
    ///
    /// * `HarvestError::Checkpoint` - the checkpoint could not be written
    /// * `HarvestError::RetriesExhausted` - the retry policy gave up on a page
    pub async fn harvest(
        &self,
        city: &str,
        bbox: &BoundingBox,
        building_type: u32,
        checkpoint: &Path,
    ) -> Result<HarvestReport, HarvestError> {
        let mut listings = self.load_listings(checkpoint);
        let resumed_records = listings.len();
        let start_page = resume_page(resumed_records, self.settings.records_per_page);

        let mut current_page = start_page;
        let mut max_pages = current_page.saturating_add(1);
        let mut pages_fetched = 0;
        let mut failed_requests = 0;
        let mut consecutive_failures = 0;

        tracing::info!(
            "Harvesting {} (building type {}) from page {} with {} checkpointed records",
            city,
            building_type,
            start_page,
            resumed_records
        );

        while current_page <= max_pages {
            let query = PageQuery {
                bbox: *bbox,
                building_type,
                records_per_page: self.settings.records_per_page,
                current_page,
                application_id: self.settings.application_id,
            };

            let page = match self.client.fetch_page(&query).await {
                Ok(page) => page,
                Err(error) => {
                    consecutive_failures += 1;
                    failed_requests += 1;

                    if !self.retry.allows_retry(consecutive_failures) {
                        tracing::error!(
                            "Giving up on {} page {} after {} attempts: {}",
                            city,
                            current_page,
                            consecutive_failures,
                            error
                        );
                        return Err(HarvestError::RetriesExhausted {
                            page: current_page,
                            attempts: consecutive_failures,
                            source: error,
                        });
                    }

                    let delay = self.retry.backoff(consecutive_failures);
                    tracing::warn!(
                        "Error on city {} page {} ({}); retrying in {}s",
                        city,
                        current_page,
                        error,
                        delay.as_secs()
                    );
                    self.sleeper.sleep(delay).await;
                    continue;
                }
            };

            consecutive_failures = 0;
            pages_fetched += 1;
            max_pages = page.paging.page_count().unwrap_or(0);

            let fetched = page.results.len();
            let kept = listings.merge(page.results.into_iter().filter_map(|raw| {
                let record = ListingRecord::flatten(raw);
                if record.is_none() {
                    tracing::warn!("Skipping non-object result on page {}", current_page);
                }
                record
            }));

            save_checkpoint(checkpoint, listings.records()).map_err(|source| {
                HarvestError::Checkpoint {
                    path: checkpoint.display().to_string(),
                    source,
                }
            })?;

            tracing::info!(
                "Page {}/{} of {}: {} results, {} kept, {} total",
                current_page,
                max_pages,
                city,
                fetched,
                kept,
                listings.len()
            );

            current_page += 1;

            if current_page <= max_pages {
                let delay = self.settings.page_delay.sample();
                tracing::debug!("Pausing {}s before page {}", delay.as_secs(), current_page);
                self.sleeper.sleep(delay).await;
            }
        }

        tracing::info!(
            "Harvest of {} complete: {} records over {} pages fetched this run",
            city,
            listings.len(),
            pages_fetched
        );

        Ok(HarvestReport {
            listings,
            start_page,
            resumed_records,
            pages_fetched,
            failed_requests,
        })
    }

    /// Loads the checkpoint, falling back to an empty set if it is unusable
    fn load_listings(&self, checkpoint: &Path) -> ListingSet {
        let dedupe = self.settings.dedupe_on_merge;

        match load_checkpoint(checkpoint) {
            Ok(records) => ListingSet::from_records(records, dedupe),
            Err(CheckpointError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No checkpoint at {}, starting fresh", checkpoint.display());
                ListingSet::new(dedupe)
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable checkpoint {}: {}",
                    checkpoint.display(),
                    e
                );
                ListingSet::new(dedupe)
            }
        }
    }
}
