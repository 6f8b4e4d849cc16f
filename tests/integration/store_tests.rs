//! Config-driven harvests published to the document store

use crate::common::{json_response, page_body, search_page};
use rental_harvest::config::{parse_config, Config};
use rental_harvest::harvest::{harvest_city, resolve_checkpoint, Area};
use rental_harvest::output::{compute_rent_statistics, export_json};
use rental_harvest::storage::{open_storage, ReplaceScope, RunStatus, Storage};
use rental_harvest::{BoundingBox, BuildingType};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

/// Config pointing both services at the mock server, with no page pauses
fn test_config(server: &MockServer, dir: &Path) -> Config {
    let toml = format!(
        r#"
[harvest]
records-per-page = 200
page-delay-min-secs = 0
page-delay-max-secs = 0
checkpoint-dir = '{checkpoints}'

[retry]
max-attempts = 1

[listings]
base-url = "{uri}"

[geocoder]
base-url = "{uri}"

[user-agent]
client-name = "TestHarvest"
contact-email = "test@example.com"

[output]
database-path = '{database}'
"#,
        checkpoints = dir.join("checkpoints").display(),
        uri = server.uri(),
        database = dir.join("listings.db").display(),
    );

    parse_config(&toml).expect("Test config should be valid")
}

#[tokio::test]
async fn test_geocoded_harvest_publishes_to_store() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(json_response(json!([{
            "class": "boundary",
            "type": "administrative",
            "boundingbox": ["44.96", "45.53", "-76.35", "-75.24"]
        }])))
        .expect(1)
        .mount(&server)
        .await;
    search_page(1)
        .respond_with(json_response(page_body(0, 200, 250, 1)))
        .expect(1)
        .mount(&server)
        .await;
    search_page(2)
        .respond_with(json_response(page_body(200, 50, 250, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let report = harvest_city(&config, "Ottawa, ON", BuildingType::APARTMENT, Area::Geocode, None)
        .await
        .expect("Harvest should succeed");
    assert_eq!(report.listings.len(), 250);

    // Default checkpoint lives in the configured directory
    let checkpoint = resolve_checkpoint(&config, "Ottawa, ON", BuildingType::APARTMENT, None);
    assert_eq!(
        checkpoint,
        dir.path().join("checkpoints").join("ottawa_on_17.jsonl")
    );
    assert!(checkpoint.exists());

    let mut storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    let run_id = storage.create_run("Ottawa, ON", 17, "hash").unwrap();
    storage
        .replace_listings(
            ReplaceScope::SameHarvest,
            "Ottawa, ON",
            17,
            report.listings.records(),
        )
        .unwrap();
    storage
        .complete_run(run_id, report.listings.len() as u64)
        .unwrap();

    assert_eq!(storage.count_listings().unwrap(), 250);
    assert_eq!(storage.get_run(run_id).unwrap().status, RunStatus::Completed);

    let top = storage.list_listings(10).unwrap();
    assert_eq!(top.len(), 10);
    assert_eq!(top[0].listing_id.as_deref(), Some("0"));

    let mut buffer = Vec::new();
    assert_eq!(export_json(&storage, &mut buffer).unwrap(), 250);
    let exported: Value = serde_json::from_slice(&buffer).unwrap();
    assert_eq!(exported[249]["Id"], json!("249"));
    assert_eq!(exported[0]["Property.LeaseRentUnformattedValue"], json!("1500"));

    let records: Vec<_> = storage
        .all_listings()
        .unwrap()
        .into_iter()
        .map(|listing| listing.record)
        .collect();
    let stats = compute_rent_statistics(&records);
    assert_eq!(stats.priced_listings, 250);
    assert_eq!(stats.min_rent, Some(1500.0));
    assert_eq!(stats.max_rent, Some(1749.0));
    assert_eq!(stats.distribution.len(), 10);
}

#[tokio::test]
async fn test_fixed_area_skips_geocoding_and_republish_replaces() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    let checkpoint = dir.path().join("custom.jsonl");

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(json_response(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    search_page(1)
        .respond_with(json_response(page_body(0, 5, 5, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let bbox = BoundingBox::new(44.96, 45.53, -76.35, -75.24);
    let report = harvest_city(&config, "Ottawa", 1, Area::Fixed(bbox), Some(&checkpoint))
        .await
        .expect("Harvest should succeed");
    assert_eq!(report.listings.len(), 5);
    assert!(checkpoint.exists());

    let mut storage = open_storage(Path::new(&config.output.database_path)).unwrap();
    storage
        .replace_listings(ReplaceScope::SameHarvest, "Toronto", 1, report.listings.records())
        .unwrap();
    storage
        .replace_listings(ReplaceScope::SameHarvest, "Ottawa", 1, report.listings.records())
        .unwrap();
    // Republishing the same harvest replaces rather than appends
    storage
        .replace_listings(ReplaceScope::SameHarvest, "Ottawa", 1, report.listings.records())
        .unwrap();

    assert_eq!(storage.count_listings().unwrap(), 10);
    let by_harvest = storage.count_listings_by_harvest().unwrap();
    assert!(by_harvest.contains(&("Ottawa".to_string(), 1, 5)));
    assert!(by_harvest.contains(&("Toronto".to_string(), 1, 5)));
}
