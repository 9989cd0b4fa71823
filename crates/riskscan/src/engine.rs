//! Result aggregation: fan one request out to the three sources and wrap
//! each outcome in an envelope.
//!
//! Each source runs as its own tokio task. A failing, panicking, or slow
//! source only empties its own envelope; the other two still report what
//! they found. All tasks share one deadline, and tasks still running when it
//! passes are aborted, which drops their browser session or cookie jar.

use crate::config::EngineConfig;
use crate::error::ScrapeResult;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NoopRenderer, Renderer};
use crate::sources::ofac::OfacScraper;
use crate::sources::offshore::OffshoreScraper;
use crate::sources::worldbank::WorldBankScraper;
use crate::sources::{collect_or_empty, SourceScraper};
use crate::types::{
    DebarredFirmRecord, OffshoreRecord, SanctionRecord, ScreeningReport, SearchRequest,
    SourceKind, SourceReport, SourceResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

/// The screening engine: three scrapers behind one result contract.
pub struct ScreeningEngine {
    offshore: Arc<dyn SourceScraper<OffshoreRecord>>,
    worldbank: Arc<dyn SourceScraper<DebarredFirmRecord>>,
    ofac: Arc<dyn SourceScraper<SanctionRecord>>,
    deadline: Duration,
}

impl ScreeningEngine {
    /// Wire the real scrapers.
    ///
    /// A missing Chromium is not fatal: the grid source falls back to a
    /// renderer that refuses every session and so always reports empty.
    pub fn new(config: &EngineConfig) -> ScrapeResult<Self> {
        let renderer: Arc<dyn Renderer> =
            match ChromiumRenderer::new(config.worldbank.chromium_path.as_deref()) {
                Ok(chromium) => Arc::new(chromium),
                Err(e) => {
                    warn!("{e:#}; worldbank searches will return no results");
                    Arc::new(NoopRenderer)
                }
            };
        Self::with_renderer(config, renderer)
    }

    /// Wire the real scrapers around a given renderer.
    pub fn with_renderer(config: &EngineConfig, renderer: Arc<dyn Renderer>) -> ScrapeResult<Self> {
        Ok(Self::from_parts(
            Arc::new(OffshoreScraper::new(config)?),
            Arc::new(WorldBankScraper::new(config, renderer)),
            Arc::new(OfacScraper::new(config)?),
            config.request_deadline(),
        ))
    }

    pub fn from_parts(
        offshore: Arc<dyn SourceScraper<OffshoreRecord>>,
        worldbank: Arc<dyn SourceScraper<DebarredFirmRecord>>,
        ofac: Arc<dyn SourceScraper<SanctionRecord>>,
        deadline: Duration,
    ) -> Self {
        Self {
            offshore,
            worldbank,
            ofac,
            deadline,
        }
    }

    /// Upper bound on any one entry point call.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Screen an entity against all three sources concurrently.
    pub async fn scrape_all(&self, request: &SearchRequest) -> ScreeningReport {
        let deadline = Instant::now() + self.deadline;

        let offshore = spawn_source(&self.offshore, request);
        let worldbank = spawn_source(&self.worldbank, request);
        let ofac = spawn_source(&self.ofac, request);

        let report = ScreeningReport {
            offshore: SourceResult::from_records(
                join_source(SourceKind::Offshore, offshore, deadline).await,
            ),
            worldbank: SourceResult::from_records(
                join_source(SourceKind::WorldBank, worldbank, deadline).await,
            ),
            ofac: SourceResult::from_records(join_source(SourceKind::Ofac, ofac, deadline).await),
        };

        info!(
            entity = request.trimmed_entity(),
            offshore = report.offshore.count(),
            worldbank = report.worldbank.count(),
            ofac = report.ofac.count(),
            "screening finished"
        );
        report
    }

    pub async fn scrape_offshore(&self, request: &SearchRequest) -> SourceResult<OffshoreRecord> {
        self.run_single(SourceKind::Offshore, &self.offshore, request).await
    }

    pub async fn scrape_worldbank(
        &self,
        request: &SearchRequest,
    ) -> SourceResult<DebarredFirmRecord> {
        self.run_single(SourceKind::WorldBank, &self.worldbank, request).await
    }

    pub async fn scrape_ofac(&self, request: &SearchRequest) -> SourceResult<SanctionRecord> {
        self.run_single(SourceKind::Ofac, &self.ofac, request).await
    }

    /// Screen against one source chosen at runtime.
    pub async fn scrape_one(&self, kind: SourceKind, request: &SearchRequest) -> SourceReport {
        match kind {
            SourceKind::Offshore => SourceReport::Offshore(self.scrape_offshore(request).await),
            SourceKind::WorldBank => SourceReport::WorldBank(self.scrape_worldbank(request).await),
            SourceKind::Ofac => SourceReport::Ofac(self.scrape_ofac(request).await),
        }
    }

    async fn run_single<T: Send + 'static>(
        &self,
        kind: SourceKind,
        scraper: &Arc<dyn SourceScraper<T>>,
        request: &SearchRequest,
    ) -> SourceResult<T> {
        let deadline = Instant::now() + self.deadline;
        let handle = spawn_source(scraper, request);
        SourceResult::from_records(join_source(kind, handle, deadline).await)
    }
}

fn spawn_source<T: Send + 'static>(
    scraper: &Arc<dyn SourceScraper<T>>,
    request: &SearchRequest,
) -> JoinHandle<Vec<T>> {
    let scraper = Arc::clone(scraper);
    let request = request.clone();
    tokio::spawn(async move { collect_or_empty(scraper.as_ref(), &request).await })
}

/// Wait for a source task until `deadline`; anything but a clean finish is
/// an empty list.
async fn join_source<T>(kind: SourceKind, mut handle: JoinHandle<Vec<T>>, deadline: Instant) -> Vec<T> {
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(records)) => records,
        Ok(Err(e)) => {
            warn!(source = %kind, "source task did not complete: {e}");
            Vec::new()
        }
        Err(_) => {
            handle.abort();
            warn!(source = %kind, "deadline expired, abandoning source");
            Vec::new()
        }
    }
}
