//! Shared fixtures for integration tests

use rental_harvest::api::ListingClient;
use rental_harvest::harvest::{DelayRange, HarvestSettings, Harvester, RecordingSleeper};
use rental_harvest::{BoundingBox, RetryPolicy};
use reqwest::Client;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockBuilder, ResponseTemplate};

pub const SEARCH_PATH: &str = "/Listing.svc/PropertySearch_Post";
pub const ORIGIN: &str = "https://www.realtor.ca/";

pub fn ottawa() -> BoundingBox {
    BoundingBox::new(44.96, 45.53, -76.35, -75.24)
}

/// Harvester pointed at a mock server that records its pauses
pub fn harvester(
    base_url: &str,
    retry: RetryPolicy,
    dedupe_on_merge: bool,
) -> (Harvester<RecordingSleeper>, RecordingSleeper) {
    let client = ListingClient::with_client(Client::new(), base_url, ORIGIN)
        .expect("Failed to build listings client");
    let settings = HarvestSettings {
        records_per_page: 200,
        application_id: 1,
        page_delay: DelayRange::new(600, 900),
        dedupe_on_merge,
    };
    let sleeper = RecordingSleeper::new();
    let harvester = Harvester::new(client, settings, retry).with_sleeper(sleeper.clone());
    (harvester, sleeper)
}

/// A search page body holding listings `first..first + count`
pub fn page_body(first: u64, count: u64, total: u64, current_page: u32) -> Value {
    let results: Vec<Value> = (first..first + count)
        .map(|id| {
            json!({
                "Id": id.to_string(),
                "MlsNumber": format!("X{id}"),
                "Property": {
                    "Type": "Apartment",
                    "LeaseRentUnformattedValue": (1500 + id % 1000).to_string(),
                    "Address": {"AddressText": format!("{id} Bank St|Ottawa, Ontario")}
                }
            })
        })
        .collect();

    json!({
        "Results": results,
        "Paging": {
            "TotalRecords": total,
            "RecordsPerPage": 200,
            "CurrentPage": current_page
        }
    })
}

/// Matches a search request for one page
pub fn search_page(page: u32) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(body_string_contains(format!("CurrentPage={page}&")))
}

pub fn json_response(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}
