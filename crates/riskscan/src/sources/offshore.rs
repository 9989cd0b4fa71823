//! Offshore leaks database: paginated static HTML.
//!
//! The search page renders a single results table, 100 rows at a time,
//! selected by a `from` offset. Pages are fetched in order until one comes
//! back without a results body (or with an empty one). A page and record
//! ceiling bounds the loop against endpoints that never run dry.

use super::{element_text, SourceScraper};
use crate::config::{EngineConfig, OffshoreSettings};
use crate::error::{ScrapeError, ScrapeResult};
use crate::http_client::HttpClient;
use crate::types::{OffshoreRecord, SearchRequest, SourceKind};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

/// Where each field lives inside a result row.
struct OffshoreLayout {
    table_body: &'static str,
    row: &'static str,
    entity_name: &'static str,
    jurisdiction: &'static str,
    linked_to: &'static str,
    source_link: &'static str,
    source_attr: &'static str,
}

const LAYOUT: OffshoreLayout = OffshoreLayout {
    table_body: "tbody",
    row: "tr",
    entity_name: "td a.font-weight-bold",
    jurisdiction: "td.jurisdiction",
    linked_to: "td.country",
    source_link: "td.source a",
    source_attr: "title",
};

/// Fixed filters sent with every query: entity category, any country,
/// any jurisdiction, any data source.
const STATIC_FILTERS: [(&str, &str); 4] = [("c", ""), ("j", ""), ("d", ""), ("cat", "Entity")];

struct Selectors {
    table_body: Selector,
    row: Selector,
    entity_name: Selector,
    jurisdiction: Selector,
    linked_to: Selector,
    source_link: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        table_body: Selector::parse(LAYOUT.table_body).expect("tbody selector is valid"),
        row: Selector::parse(LAYOUT.row).expect("row selector is valid"),
        entity_name: Selector::parse(LAYOUT.entity_name).expect("name selector is valid"),
        jurisdiction: Selector::parse(LAYOUT.jurisdiction)
            .expect("jurisdiction selector is valid"),
        linked_to: Selector::parse(LAYOUT.linked_to).expect("linked selector is valid"),
        source_link: Selector::parse(LAYOUT.source_link).expect("source selector is valid"),
    })
}

/// Scraper for the offshore leaks search.
pub struct OffshoreScraper {
    http: HttpClient,
    settings: OffshoreSettings,
}

impl OffshoreScraper {
    pub fn new(config: &EngineConfig) -> ScrapeResult<Self> {
        Url::parse(&config.offshore.base_url)?;
        if config.offshore.page_size == 0 {
            return Err(ScrapeError::Config("offshore page size must be positive".into()));
        }
        Ok(Self {
            http: HttpClient::new(&config.http)?,
            settings: config.offshore.clone(),
        })
    }

    /// Search URL for one page of results.
    pub fn search_url(&self, entity: &str, offset: usize) -> ScrapeResult<String> {
        build_search_url(&self.settings.base_url, entity, offset)
    }
}

#[async_trait]
impl SourceScraper<OffshoreRecord> for OffshoreScraper {
    fn kind(&self) -> SourceKind {
        SourceKind::Offshore
    }

    async fn scrape(&self, request: &SearchRequest) -> ScrapeResult<Vec<OffshoreRecord>> {
        let entity = request.trimmed_entity();
        let mut records = Vec::new();

        for page in 0..self.settings.max_pages {
            let offset = page * self.settings.page_size;
            let url = self.search_url(entity, offset)?;
            debug!("offshore page {page}: GET {url}");

            // Any failure drops the pages gathered so far.
            let resp = self.http.get(&url).await?.error_for_status()?;

            let rows = match parse_results_page(&resp.body) {
                Some(rows) if !rows.is_empty() => rows,
                _ => {
                    debug!("offshore page {page} has no result rows, stopping");
                    return Ok(records);
                }
            };

            debug!("offshore page {page}: {} rows", rows.len());
            records.extend(rows);

            if records.len() >= self.settings.max_records {
                warn!(
                    "offshore record ceiling of {} reached for {entity:?}, truncating",
                    self.settings.max_records
                );
                records.truncate(self.settings.max_records);
                return Ok(records);
            }
        }

        warn!(
            "offshore page ceiling of {} reached for {entity:?}, returning {} records",
            self.settings.max_pages,
            records.len()
        );
        Ok(records)
    }
}

/// Build the paginated search URL; spaces in the entity are sent as `+`.
///
/// `search` is appended below the base path whether or not it ends in `/`.
pub fn build_search_url(base_url: &str, entity: &str, offset: usize) -> ScrapeResult<String> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    let mut url = base.join("search")?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("q", entity.trim());
        for (key, value) in STATIC_FILTERS {
            query.append_pair(key, value);
        }
        query.append_pair("from", &offset.to_string());
    }
    Ok(url.to_string())
}

/// Parse one results page.
///
/// Returns `None` when the page has no results body at all, which ends
/// pagination.
pub fn parse_results_page(html: &str) -> Option<Vec<OffshoreRecord>> {
    let sel = selectors();
    let document = Html::parse_document(html);
    let body = document.select(&sel.table_body).next()?;

    let records = body
        .select(&sel.row)
        .map(|row| OffshoreRecord {
            entity_name: first_text(&row, &sel.entity_name),
            jurisdiction: first_text(&row, &sel.jurisdiction),
            linked_to: first_text(&row, &sel.linked_to),
            source_label: row
                .select(&sel.source_link)
                .find_map(|a| a.value().attr(LAYOUT.source_attr))
                .unwrap_or_default()
                .trim()
                .to_string(),
        })
        .collect();

    Some(records)
}

fn first_text(row: &scraper::ElementRef<'_>, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default()
}
