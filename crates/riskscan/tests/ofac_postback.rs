//! OFAC forms postback against a mock ASP.NET endpoint.

use std::collections::HashMap;

use riskscan::sources::ofac::OfacScraper;
use riskscan::sources::{collect_or_empty, SourceScraper};
use riskscan::{EngineConfig, SearchRequest};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ─────────────────────── helpers ───────────────────────

const LANDING: &str = r#"<!DOCTYPE html>
<html><body>
<form method="post" action="./Default.aspx" id="aspnetForm">
  <div class="aspNetHidden">
    <input type="hidden" name="__EVENTTARGET" id="__EVENTTARGET" value="" />
    <input type="hidden" name="__EVENTARGUMENT" id="__EVENTARGUMENT" value="" />
    <input type="hidden" name="__VIEWSTATE" id="__VIEWSTATE" value="/wEPDwUKMTY1NDU2MTA1Mg9kFgJmD2QWAgID" />
    <input type="hidden" name="__VIEWSTATEGENERATOR" value="CA0B0334" />
    <input type="hidden" name="__EVENTVALIDATION" value="/wEdAAvZ+k2=" />
  </div>
  <input name="ctl00$MainContent$txtLastName" type="text" id="ctl00_MainContent_txtLastName" />
  <select name="ctl00$MainContent$ddlType" id="ctl00_MainContent_ddlType">
    <option selected="selected" value="">All</option>
    <option value="Entity">Entity</option>
    <option value="Individual">Individual</option>
  </select>
  <select name="ctl00$MainContent$lstPrograms" multiple="multiple">
    <option value="BALKANS">BALKANS</option>
  </select>
  <input name="ctl00$MainContent$txtAddress" type="text" value="" />
  <input name="ctl00$MainContent$Slider1" type="text" value="100" />
  <input name="ctl00$MainContent$Slider1_Boundcontrol" type="text" value="100" />
  <input type="submit" name="ctl00$MainContent$btnSearch" value="Search" />
  <input type="submit" name="ctl00$MainContent$btnReset" value="Reset" />
  <input type="image" name="ctl00$MainContent$ImageButton1" src="images/help.png" />
</form>
</body></html>"#;

const RESULTS: &str = r#"<html><body>
<table id="gvSearchResults">
  <tr>
    <td><a href="Details.aspx?id=1">ACME TRADING LLC</a></td>
    <td>Dubai, United Arab Emirates</td><td>Entity</td><td>IRAN</td><td>SDN</td><td>100</td>
  </tr>
  <tr>
    <td><a href="Details.aspx?id=2">ACME CORP FZE</a></td>
    <td>Sharjah</td><td>Entity</td><td>SDGT</td><td>SDN</td><td>92</td>
  </tr>
</table>
</body></html>"#;

const NO_TABLE: &str =
    "<html><body><span id=\"lblMessage\">Your search has not returned any results.</span></body></html>";

fn config_for(server: &MockServer) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.ofac.landing_url = format!("{}/Default.aspx", server.uri());
    config.http.max_retries = 0;
    config.http.timeout_ms = 5_000;
    config
}

async fn mount_landing(server: &MockServer, cookie: &str) {
    Mock::given(method("GET"))
        .and(path("/Default.aspx"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", format!("{cookie}; path=/; HttpOnly").as_str())
                .set_body_string(LANDING),
        )
        .mount(server)
        .await;
}

fn posts(requests: &[Request]) -> Vec<&Request> {
    requests
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect()
}

fn header_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

fn form_body(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body).into_owned().collect()
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_postback_returns_sanction_records() {
    let server = MockServer::start().await;
    mount_landing(&server, "ASP.NET_SessionId=s3ss10n").await;

    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .and(header("cookie", "ASP.NET_SessionId=s3ss10n"))
        .and(body_string_contains("ctl00%24MainContent%24txtLastName=Acme+Corp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS))
        .mount(&server)
        .await;

    let scraper = OfacScraper::new(&config_for(&server)).unwrap();
    let records = scraper
        .scrape(&SearchRequest::new("Acme Corp").with_match_score(90))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "ACME TRADING LLC");
    assert_eq!(records[0].address, "Dubai, United Arab Emirates");
    assert_eq!(records[0].entity_type, "Entity");
    assert_eq!(records[0].program, "IRAN");
    assert_eq!(records[0].list, "SDN");
    assert_eq!(records[0].match_score, "100");
    assert_eq!(records[1].name, "ACME CORP FZE");
    assert_eq!(records[1].match_score, "92");
}

#[tokio::test]
async fn test_post_replays_every_harvested_field() {
    let server = MockServer::start().await;
    mount_landing(&server, "ASP.NET_SessionId=abc").await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS))
        .mount(&server)
        .await;

    let scraper = OfacScraper::new(&config_for(&server)).unwrap();
    scraper
        .scrape(&SearchRequest::new("Acme & Sons").with_match_score(85))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let posts = posts(&requests);
    assert_eq!(posts.len(), 1);
    let post = posts[0];

    let fields = form_body(post);
    let mut names: Vec<&str> = fields.keys().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "__EVENTARGUMENT",
            "__EVENTTARGET",
            "__EVENTVALIDATION",
            "__VIEWSTATE",
            "__VIEWSTATEGENERATOR",
            "ctl00$MainContent$Slider1",
            "ctl00$MainContent$Slider1_Boundcontrol",
            "ctl00$MainContent$btnSearch",
            "ctl00$MainContent$ddlType",
            "ctl00$MainContent$lstPrograms",
            "ctl00$MainContent$txtAddress",
            "ctl00$MainContent$txtLastName",
        ]
    );

    assert_eq!(fields["__VIEWSTATE"], "/wEPDwUKMTY1NDU2MTA1Mg9kFgJmD2QWAgID");
    assert_eq!(fields["__EVENTVALIDATION"], "/wEdAAvZ+k2=");
    assert_eq!(fields["ctl00$MainContent$txtLastName"], "Acme & Sons");
    assert_eq!(fields["ctl00$MainContent$ddlType"], "Entity");
    assert_eq!(fields["ctl00$MainContent$Slider1"], "85");
    assert_eq!(fields["ctl00$MainContent$Slider1_Boundcontrol"], "85");
    assert_eq!(fields["ctl00$MainContent$btnSearch"], "Search");
    assert_eq!(fields["ctl00$MainContent$lstPrograms"], "BALKANS");

    let raw = String::from_utf8_lossy(&post.body);
    assert!(!raw.contains('$'), "field names must be percent-encoded: {raw}");
    assert!(raw.contains("Acme+%26+Sons"), "{raw}");

    assert_eq!(header_value(post, "origin"), Some(server.uri().as_str()));
    let expected_referer = format!("{}/Default.aspx", server.uri());
    assert_eq!(header_value(post, "referer"), Some(expected_referer.as_str()));
    assert_eq!(
        header_value(post, "content-type"),
        Some("application/x-www-form-urlencoded")
    );
}

#[tokio::test]
async fn test_default_match_score_is_100() {
    let server = MockServer::start().await;
    mount_landing(&server, "ASP.NET_SessionId=abc").await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS))
        .mount(&server)
        .await;

    let scraper = OfacScraper::new(&config_for(&server)).unwrap();
    scraper.scrape(&SearchRequest::new("Acme")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let fields = form_body(posts(&requests)[0]);
    assert_eq!(fields["ctl00$MainContent$Slider1"], "100");
    assert_eq!(fields["ctl00$MainContent$Slider1_Boundcontrol"], "100");
}

#[tokio::test]
async fn test_missing_results_table_yields_empty() {
    let server = MockServer::start().await;
    mount_landing(&server, "ASP.NET_SessionId=abc").await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(NO_TABLE))
        .mount(&server)
        .await;

    let scraper = OfacScraper::new(&config_for(&server)).unwrap();
    let request = SearchRequest::new("Nobody Ltd");

    let err = scraper.scrape(&request).await.unwrap_err();
    assert_eq!(err.kind(), "parse");
    assert!(collect_or_empty(&scraper, &request).await.is_empty());
}

#[tokio::test]
async fn test_landing_failure_yields_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Default.aspx"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let scraper = OfacScraper::new(&config_for(&server)).unwrap();
    let request = SearchRequest::new("Acme");
    assert_eq!(scraper.scrape(&request).await.unwrap_err().kind(), "transport");
    assert!(collect_or_empty(&scraper, &request).await.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert!(posts(&requests).is_empty());
}

#[tokio::test]
async fn test_sequential_scrapes_never_share_cookies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Default.aspx"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "SessionA=first; path=/")
                .set_body_string(LANDING),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Default.aspx"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "SessionB=second; path=/")
                .set_body_string(LANDING),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Default.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS))
        .mount(&server)
        .await;

    let scraper = OfacScraper::new(&config_for(&server)).unwrap();
    scraper.scrape(&SearchRequest::new("Acme")).await.unwrap();
    scraper.scrape(&SearchRequest::new("Globex")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let gets: Vec<&Request> = requests
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .collect();
    let posts = posts(&requests);
    assert_eq!(gets.len(), 2);
    assert_eq!(posts.len(), 2);

    // Each landing request starts with an empty jar.
    assert_eq!(header_value(gets[0], "cookie"), None);
    assert_eq!(header_value(gets[1], "cookie"), None);

    assert_eq!(header_value(posts[0], "cookie"), Some("SessionA=first"));
    assert_eq!(header_value(posts[1], "cookie"), Some("SessionB=second"));
    assert_eq!(form_body(posts[0])["ctl00$MainContent$txtLastName"], "Acme");
    assert_eq!(form_body(posts[1])["ctl00$MainContent$txtLastName"], "Globex");
}
