//! End-to-end harvest tests against a mock listings service

use crate::common::{harvester, json_response, ottawa, page_body, search_page, ORIGIN, SEARCH_PATH};
use rental_harvest::harvest::{load_checkpoint, save_checkpoint, DelayRange};
use rental_harvest::{HarvestError, ListingRecord, RetryPolicy};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_harvest_fetches_every_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("ottawa_on_17.jsonl");

    search_page(1)
        .respond_with(json_response(page_body(0, 200, 450, 1)))
        .expect(1)
        .mount(&server)
        .await;
    search_page(2)
        .respond_with(json_response(page_body(200, 200, 450, 2)))
        .expect(1)
        .mount(&server)
        .await;
    search_page(3)
        .respond_with(json_response(page_body(400, 50, 450, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, sleeper) = harvester(&server.uri(), RetryPolicy::default(), false);
    let report = harvester
        .harvest("Ottawa, ON", &ottawa(), 17, &checkpoint)
        .await
        .expect("Harvest should succeed");

    assert_eq!(report.start_page, 1);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.failed_requests, 0);
    assert_eq!(report.listings.len(), 450);

    // Exactly three search requests
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);

    // One pause between each pair of pages, none after the last
    let sleeps = sleeper.recorded();
    assert_eq!(sleeps.len(), 2);
    assert!(sleeps.iter().all(|d| DelayRange::new(600, 900).contains(*d)));

    // Checkpoint holds every record, flattened, in arrival order
    let persisted = load_checkpoint(&checkpoint).unwrap();
    assert_eq!(persisted.len(), 450);
    assert_eq!(persisted[0].id().as_deref(), Some("0"));
    assert_eq!(persisted[449].id().as_deref(), Some("449"));
    assert_eq!(
        persisted[0].get("Property.Address.AddressText"),
        Some(&json!("0 Bank St|Ottawa, Ontario"))
    );
}

#[tokio::test]
async fn test_search_request_carries_form_and_origin_headers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(header("Referer", ORIGIN))
        .and(header("Origin", ORIGIN))
        .and(body_string_contains("LatitudeMin=44.96"))
        .and(body_string_contains("LongitudeMax=-75.24"))
        .and(body_string_contains("CultureId=1"))
        .and(body_string_contains("TransactionTypeId=3"))
        .and(body_string_contains("BuildingTypeId=1&"))
        .and(body_string_contains("RecordsPerPage=200"))
        .respond_with(json_response(page_body(0, 3, 3, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, sleeper) = harvester(&server.uri(), RetryPolicy::bounded(1), false);
    let report = harvester
        .harvest("Ottawa", &ottawa(), 1, &dir.path().join("ottawa_1.jsonl"))
        .await
        .expect("Harvest should succeed");

    assert_eq!(report.listings.len(), 3);
    assert!(sleeper.recorded().is_empty());
}

#[tokio::test]
async fn test_interrupted_harvest_resumes_at_next_page() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("ottawa_on_17.jsonl");

    // First run: page 1 succeeds, page 2 fails and the run gives up
    {
        let server = MockServer::start().await;
        search_page(1)
            .respond_with(json_response(page_body(0, 200, 450, 1)))
            .expect(1)
            .mount(&server)
            .await;
        search_page(2)
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let (harvester, _) = harvester(&server.uri(), RetryPolicy::bounded(1), false);
        let result = harvester
            .harvest("Ottawa, ON", &ottawa(), 17, &checkpoint)
            .await;

        match result {
            Err(HarvestError::RetriesExhausted { page, source, .. }) => {
                assert_eq!(page, 2);
                assert_eq!(source.status(), Some(500));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other.map(|r| r.pages_fetched)),
        }
        assert_eq!(load_checkpoint(&checkpoint).unwrap().len(), 200);
    }

    // Second run: page 1 must not be requested again
    let server = MockServer::start().await;
    search_page(1)
        .respond_with(json_response(page_body(0, 200, 450, 1)))
        .expect(0)
        .mount(&server)
        .await;
    search_page(2)
        .respond_with(json_response(page_body(200, 200, 450, 2)))
        .expect(1)
        .mount(&server)
        .await;
    search_page(3)
        .respond_with(json_response(page_body(400, 50, 450, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, _) = harvester(&server.uri(), RetryPolicy::bounded(1), false);
    let report = harvester
        .harvest("Ottawa, ON", &ottawa(), 17, &checkpoint)
        .await
        .expect("Resumed harvest should succeed");

    assert_eq!(report.start_page, 2);
    assert_eq!(report.resumed_records, 200);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.listings.len(), 450);

    let requests = server.received_requests().await.unwrap();
    let first_body = String::from_utf8_lossy(&requests[0].body).to_string();
    assert!(first_body.contains("CurrentPage=2&"));

    let persisted = load_checkpoint(&checkpoint).unwrap();
    let ids: Vec<String> = persisted.iter().filter_map(ListingRecord::id).collect();
    let expected: Vec<String> = (0..450).map(|id| id.to_string()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_rate_limit_retries_the_same_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("ottawa_on_17.jsonl");

    search_page(1)
        .respond_with(json_response(page_body(0, 200, 450, 1)))
        .expect(1)
        .mount(&server)
        .await;
    // Earlier mounts win: the first request for page 2 is refused
    search_page(2)
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    search_page(2)
        .respond_with(json_response(page_body(200, 200, 450, 2)))
        .expect(1)
        .mount(&server)
        .await;
    search_page(3)
        .respond_with(json_response(page_body(400, 50, 450, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, sleeper) = harvester(&server.uri(), RetryPolicy::default(), false);
    let report = harvester
        .harvest("Ottawa, ON", &ottawa(), 17, &checkpoint)
        .await
        .expect("Harvest should recover from a rate limit");

    assert_eq!(report.failed_requests, 1);
    assert_eq!(report.listings.len(), 450);

    // Requests: page 1, page 2 (403), page 2 again, page 3
    let pages: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| {
            let body = String::from_utf8_lossy(&request.body).to_string();
            body.split('&')
                .find(|field| field.starts_with("CurrentPage="))
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    assert_eq!(
        pages,
        vec!["CurrentPage=1", "CurrentPage=2", "CurrentPage=2", "CurrentPage=3"]
    );

    // Page pause, then the rate-limit backoff, then the next page pause
    let sleeps = sleeper.recorded();
    assert_eq!(sleeps.len(), 3);
    assert!(DelayRange::new(600, 900).contains(sleeps[0]));
    assert!(DelayRange::new(3000, 3600).contains(sleeps[1]));
    assert!(DelayRange::new(600, 900).contains(sleeps[2]));
}

#[tokio::test]
async fn test_dedupe_on_merge_drops_repeated_ids() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("ottawa_on_17.jsonl");

    // Listings 0..200 already checkpointed; the service shifted and page 2
    // now starts with 50 of them again
    let existing: Vec<ListingRecord> = (0..200)
        .map(|id| ListingRecord::flatten(json!({"Id": id.to_string()})).unwrap())
        .collect();
    save_checkpoint(&checkpoint, &existing).unwrap();

    search_page(2)
        .respond_with(json_response(page_body(150, 200, 400, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, _) = harvester(&server.uri(), RetryPolicy::bounded(1), true);
    let report = harvester
        .harvest("Ottawa, ON", &ottawa(), 17, &checkpoint)
        .await
        .expect("Harvest should succeed");

    assert_eq!(report.listings.len(), 350);
    assert_eq!(load_checkpoint(&checkpoint).unwrap().len(), 350);
}

#[tokio::test]
async fn test_duplicates_kept_without_dedupe() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("ottawa_on_17.jsonl");

    let existing: Vec<ListingRecord> = (0..200)
        .map(|id| ListingRecord::flatten(json!({"Id": id.to_string()})).unwrap())
        .collect();
    save_checkpoint(&checkpoint, &existing).unwrap();

    search_page(2)
        .respond_with(json_response(page_body(150, 200, 400, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, _) = harvester(&server.uri(), RetryPolicy::bounded(1), false);
    let report = harvester
        .harvest("Ottawa, ON", &ottawa(), 17, &checkpoint)
        .await
        .expect("Harvest should succeed");

    assert_eq!(report.listings.len(), 400);
}

#[tokio::test]
async fn test_empty_result_set_finishes_after_one_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("nowhere_17.jsonl");

    search_page(1)
        .respond_with(json_response(json!({
            "Results": [],
            "Paging": {"TotalRecords": 0, "RecordsPerPage": 200}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, sleeper) = harvester(&server.uri(), RetryPolicy::bounded(1), false);
    let report = harvester
        .harvest("Nowhere", &ottawa(), 17, &checkpoint)
        .await
        .expect("Harvest should succeed");

    assert!(report.listings.is_empty());
    assert_eq!(report.pages_fetched, 1);
    assert!(sleeper.recorded().is_empty());
    assert!(load_checkpoint(&checkpoint).unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_page_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    search_page(1)
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    search_page(1)
        .respond_with(json_response(page_body(0, 10, 10, 1)))
        .mount(&server)
        .await;

    let (harvester, sleeper) = harvester(&server.uri(), RetryPolicy::bounded(2), false);
    let report = harvester
        .harvest("Ottawa", &ottawa(), 17, &dir.path().join("ottawa_17.jsonl"))
        .await
        .expect("Harvest should recover from a malformed page");

    assert_eq!(report.listings.len(), 10);
    assert_eq!(report.failed_requests, 1);
    assert_eq!(sleeper.recorded().len(), 1);
}

#[tokio::test]
async fn test_zero_page_size_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    search_page(1)
        .respond_with(json_response(json!({
            "Results": [],
            "Paging": {"TotalRecords": 5, "RecordsPerPage": 0}
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    search_page(1)
        .respond_with(json_response(page_body(0, 5, 5, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, sleeper) = harvester(&server.uri(), RetryPolicy::bounded(2), false);
    let report = harvester
        .harvest("Ottawa", &ottawa(), 17, &dir.path().join("ottawa_17.jsonl"))
        .await
        .expect("Harvest should retry a page reporting zero page size");

    assert_eq!(report.failed_requests, 1);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.listings.len(), 5);

    let sleeps = sleeper.recorded();
    assert_eq!(sleeps.len(), 1);
    assert!(DelayRange::new(3000, 3600).contains(sleeps[0]));
}

#[tokio::test]
async fn test_server_error_retries_the_same_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    search_page(1)
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    search_page(1)
        .respond_with(json_response(page_body(0, 20, 20, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let (harvester, sleeper) = harvester(&server.uri(), RetryPolicy::default(), false);
    let report = harvester
        .harvest("Ottawa", &ottawa(), 17, &dir.path().join("ottawa_17.jsonl"))
        .await
        .expect("Harvest should recover from a server error");

    assert_eq!(report.failed_requests, 1);
    assert_eq!(report.listings.len(), 20);

    // Both requests asked for page 1
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|r| String::from_utf8_lossy(&r.body).contains("CurrentPage=1&")));

    let sleeps = sleeper.recorded();
    assert_eq!(sleeps.len(), 1);
    assert!(DelayRange::new(3000, 3600).contains(sleeps[0]));
}
