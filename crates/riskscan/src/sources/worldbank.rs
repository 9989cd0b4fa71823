//! World Bank debarred firms: a client-rendered Kendo grid.
//!
//! The page filters its grid in the browser as text is typed, and gives no
//! "loading finished" signal. Completion is detected by polling until the
//! row count differs from the count seen before typing. When the filtered
//! count happens to equal that baseline the wait runs to its timeout and the
//! scrape comes back empty; this is a known limitation of the heuristic.
//!
//! Every scrape gets its own browser session, closed on every exit path.

use super::{element_text, SourceScraper};
use crate::config::{EngineConfig, WorldBankSettings};
use crate::error::{ScrapeError, ScrapeResult};
use crate::renderer::wait::wait_for;
use crate::renderer::{RenderContext, Renderer};
use crate::types::{DebarredFirmRecord, SearchRequest, SourceKind};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cell positions inside a grid row.
///
/// Column 1 is a hidden, non-data column and is skipped.
struct GridColumns {
    firm_name: usize,
    address: usize,
    country: usize,
    from_date: usize,
    to_date: usize,
    grounds: usize,
}

const COLUMNS: GridColumns = GridColumns {
    firm_name: 0,
    address: 2,
    country: 3,
    from_date: 4,
    to_date: 5,
    grounds: 6,
};

impl GridColumns {
    fn min_cells(&self) -> usize {
        [
            self.firm_name,
            self.address,
            self.country,
            self.from_date,
            self.to_date,
            self.grounds,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

fn automation(context: &str) -> impl FnOnce(anyhow::Error) -> ScrapeError + '_ {
    move |e| ScrapeError::Automation(format!("{context}: {e:#}"))
}

/// Scraper for the World Bank debarment grid.
pub struct WorldBankScraper {
    renderer: Arc<dyn Renderer>,
    settings: WorldBankSettings,
}

impl WorldBankScraper {
    pub fn new(config: &EngineConfig, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            settings: config.worldbank.clone(),
        }
    }

    /// Drive one page load, filter, and extraction inside an acquired session.
    async fn drive(
        &self,
        ctx: &mut dyn RenderContext,
        entity: &str,
    ) -> ScrapeResult<Vec<DebarredFirmRecord>> {
        let s = &self.settings;

        let nav = ctx
            .navigate(&s.landing_url, s.navigation_timeout_ms)
            .await
            .map_err(automation("failed to load landing page"))?;
        debug!("worldbank landing page {} loaded in {}ms", nav.final_url, nav.load_time_ms);

        let grid_selector = s.grid_selector.as_str();
        let row_selector = s.row_selector.as_str();

        {
            let view: &dyn RenderContext = &*ctx;
            wait_for("grid container", s.wait_timeout(), s.poll_interval(), move || async move {
                anyhow::Ok(view.count(grid_selector).await? > 0)
            })
            .await?;
        }

        let baseline = ctx
            .count(row_selector)
            .await
            .map_err(automation("failed to count grid rows"))?;
        debug!("worldbank grid ready with {baseline} rows before filtering");

        ctx.type_text(&s.filter_selector, entity)
            .await
            .map_err(automation("failed to type into filter field"))?;

        {
            let view: &dyn RenderContext = &*ctx;
            wait_for("grid row count to change", s.wait_timeout(), s.poll_interval(), move || async move {
                anyhow::Ok(view.count(row_selector).await? != baseline)
            })
            .await?;
        }

        let html = ctx
            .get_html()
            .await
            .map_err(automation("failed to read filtered grid"))?;

        parse_grid_rows(&html, &s.table_row_selector)
    }
}

#[async_trait]
impl SourceScraper<DebarredFirmRecord> for WorldBankScraper {
    fn kind(&self) -> SourceKind {
        SourceKind::WorldBank
    }

    async fn scrape(&self, request: &SearchRequest) -> ScrapeResult<Vec<DebarredFirmRecord>> {
        let mut ctx = self
            .renderer
            .new_context()
            .await
            .map_err(automation("failed to acquire browser session"))?;

        let outcome = self.drive(ctx.as_mut(), request.trimmed_entity()).await;

        if let Err(e) = ctx.close().await {
            warn!("failed to close browser session: {e:#}");
        }

        outcome
    }
}

/// Extract one record per grid row, by cell position.
///
/// Rows with too few cells (placeholder or "no records" rows) are skipped.
pub fn parse_grid_rows(html: &str, row_selector: &str) -> ScrapeResult<Vec<DebarredFirmRecord>> {
    let rows_sel = Selector::parse(row_selector)
        .map_err(|e| ScrapeError::Config(format!("invalid row selector {row_selector:?}: {e:?}")))?;
    let cell_sel = Selector::parse("td").expect("cell selector is valid");

    let document = Html::parse_document(html);
    let min_cells = COLUMNS.min_cells();

    let mut records = Vec::new();
    for (i, row) in document.select(&rows_sel).enumerate() {
        let cells: Vec<String> = row.select(&cell_sel).map(|td| element_text(&td)).collect();
        if cells.len() < min_cells {
            debug!("worldbank row {i} has {} cells, skipping", cells.len());
            continue;
        }
        records.push(DebarredFirmRecord {
            firm_name: cells[COLUMNS.firm_name].clone(),
            address: cells[COLUMNS.address].clone(),
            country: cells[COLUMNS.country].clone(),
            from_date: cells[COLUMNS.from_date].clone(),
            to_date: cells[COLUMNS.to_date].clone(),
            grounds: cells[COLUMNS.grounds].clone(),
        });
    }

    Ok(records)
}
