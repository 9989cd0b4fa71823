//! The three screening sources behind one scraper contract.
//!
//! - [`offshore`]: paginated static HTML (GET + parse).
//! - [`worldbank`]: JavaScript grid driven through a browser, synchronized
//!   by wait-polling the row count.
//! - [`ofac`]: stateful forms postback: harvest every field, resubmit with
//!   the same cookie jar, parse the result table.
//!
//! Parsing helpers here are synchronous; `scraper::Html` is not `Send`, so
//! documents are parsed and dropped between awaits.

pub mod offshore;
pub mod ofac;
pub mod worldbank;

use crate::error::ScrapeResult;
use crate::types::{SearchRequest, SourceKind};
use async_trait::async_trait;
use tracing::{info, warn};

/// A source that turns a search request into an ordered list of records.
#[async_trait]
pub trait SourceScraper<T>: Send + Sync {
    /// Which source this scraper reads.
    fn kind(&self) -> SourceKind;

    /// Run one isolated scrape. Records come back in document order.
    async fn scrape(&self, request: &SearchRequest) -> ScrapeResult<Vec<T>>;
}

/// Run a scraper and absorb any failure into an empty list.
///
/// Callers therefore cannot tell "no matches" from "source failed"; the
/// failure is only visible in the logs.
pub async fn collect_or_empty<T>(scraper: &dyn SourceScraper<T>, request: &SearchRequest) -> Vec<T> {
    let source = scraper.kind();
    let entity = request.trimmed_entity();
    info!(%source, entity, "scrape started");

    match scraper.scrape(request).await {
        Ok(records) => {
            info!(%source, entity, count = records.len(), "scrape finished");
            records
        }
        Err(e) => {
            warn!(%source, entity, kind = e.kind(), error = %e, "scrape failed, returning no records");
            Vec::new()
        }
    }
}

/// Collapse an element's text nodes into single-spaced, trimmed text.
pub(crate) fn element_text(el: &scraper::ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a potentially relative URL against a base URL.
pub(crate) fn resolve_url(base_url: &str, relative: &str) -> String {
    let relative = relative.trim();
    if relative.is_empty() {
        return base_url.to_string();
    }
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }
    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(relative) {
            return resolved.to_string();
        }
    }
    relative.to_string()
}
