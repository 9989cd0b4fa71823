//! Offshore leaks scraper against a mock search endpoint.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

use riskscan::sources::offshore::OffshoreScraper;
use riskscan::sources::{collect_or_empty, SourceScraper};
use riskscan::{EngineConfig, OffshoreRecord, SearchRequest, SourceResult};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ─────────────────────── helpers ───────────────────────

fn config_for(server: &MockServer) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.offshore.base_url = format!("{}/", server.uri());
    config.http.max_retries = 0;
    config.http.timeout_ms = 5_000;
    config
}

fn row(name: &str, jurisdiction: &str, linked: &str, source: &str) -> String {
    format!(
        r#"<tr>
             <td><a class="font-weight-bold text-dark" href="/nodes/x">{name}</a></td>
             <td class="jurisdiction">{jurisdiction}</td>
             <td class="country">{linked}</td>
             <td class="source"><a title="{source}" href="/stories/x">src</a></td>
           </tr>"#
    )
}

fn results_page(rows: &[String]) -> String {
    format!(
        "<html><body><table class=\"table\"><thead><tr><th>Entity</th></tr></thead><tbody>{}</tbody></table></body></html>",
        rows.concat()
    )
}

fn numbered_page(page: usize, size: usize) -> String {
    let rows: Vec<String> = (0..size)
        .map(|i| row(&format!("Entity {}", page * size + i), "Panama", "", "Leak DB"))
        .collect();
    results_page(&rows)
}

const NO_RESULTS: &str = "<html><body><p>No results for this search.</p></body></html>";

async fn mount_page(server: &MockServer, from: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("from", from))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_single_match_then_empty_block() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Acme Corp"))
        .and(query_param("cat", "Entity"))
        .and(query_param("from", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(&[row(
            "Acme Corp", "Panama", "Globex", "Leak DB",
        )])))
        .mount(&server)
        .await;
    mount_page(&server, "100", NO_RESULTS.to_string()).await;

    let scraper = OffshoreScraper::new(&config_for(&server)).unwrap();
    let records = collect_or_empty(&scraper, &SearchRequest::new("Acme Corp")).await;
    let envelope = SourceResult::from_records(records);

    assert_eq!(envelope.status_code(), 200);
    assert_eq!(envelope.count(), 1);
    assert_eq!(
        envelope.records(),
        &[OffshoreRecord {
            entity_name: "Acme Corp".into(),
            jurisdiction: "Panama".into(),
            linked_to: "Globex".into(),
            source_label: "Leak DB".into(),
        }]
    );
}

#[tokio::test]
async fn test_full_pages_are_concatenated_in_order() {
    let server = MockServer::start().await;
    mount_page(&server, "0", numbered_page(0, 100)).await;
    mount_page(&server, "100", numbered_page(1, 100)).await;
    mount_page(&server, "200", numbered_page(2, 100)).await;
    mount_page(&server, "300", NO_RESULTS.to_string()).await;

    let scraper = OffshoreScraper::new(&config_for(&server)).unwrap();
    let records = scraper.scrape(&SearchRequest::new("Entity")).await.unwrap();

    assert_eq!(records.len(), 300);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.entity_name, format!("Entity {i}"));
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
}

#[tokio::test]
async fn test_empty_tbody_also_stops() {
    let server = MockServer::start().await;
    mount_page(&server, "0", numbered_page(0, 100)).await;
    mount_page(&server, "100", results_page(&[])).await;

    let scraper = OffshoreScraper::new(&config_for(&server)).unwrap();
    let records = scraper.scrape(&SearchRequest::new("Entity")).await.unwrap();
    assert_eq!(records.len(), 100);
}

#[tokio::test]
async fn test_page_ceiling_bounds_a_source_that_never_runs_dry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_page(&[row("Loop Ltd", "Nowhere", "", "Leak DB")])),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.offshore.max_pages = 4;
    let scraper = OffshoreScraper::new(&config).unwrap();
    let records = scraper.scrape(&SearchRequest::new("Loop")).await.unwrap();

    assert_eq!(records.len(), 4);
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_record_ceiling_truncates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(numbered_page(0, 100)))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.offshore.max_records = 150;
    let scraper = OffshoreScraper::new(&config).unwrap();
    let records = scraper.scrape(&SearchRequest::new("Entity")).await.unwrap();

    assert_eq!(records.len(), 150);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_mid_pagination_failure_discards_partial_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "0", numbered_page(0, 100)).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("from", "100"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let scraper = OffshoreScraper::new(&config_for(&server)).unwrap();
    let request = SearchRequest::new("Entity");

    let err = scraper.scrape(&request).await.unwrap_err();
    assert_eq!(err.kind(), "transport");
    assert!(collect_or_empty(&scraper, &request).await.is_empty());
}

#[tokio::test]
async fn test_gzip_page_is_inflated() {
    let server = MockServer::start().await;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(results_page(&[row("Acme Corp", "Panama", "Globex", "Leak DB")]).as_bytes())
        .unwrap();
    let compressed = encoder.finish().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("from", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "gzip")
                .set_body_bytes(compressed),
        )
        .mount(&server)
        .await;
    mount_page(&server, "100", NO_RESULTS.to_string()).await;

    let scraper = OffshoreScraper::new(&config_for(&server)).unwrap();
    let records = scraper.scrape(&SearchRequest::new("Acme Corp")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].jurisdiction, "Panama");
}
