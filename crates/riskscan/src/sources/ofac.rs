//! OFAC sanctions search: a stateful ASP.NET forms postback.
//!
//! The search page validates machine-generated hidden fields (`__VIEWSTATE`,
//! `__EVENTVALIDATION`, and whatever else the deployment emits) against the
//! session cookie. A scrape therefore:
//!
//! 1. GETs the landing page with a fresh cookie jar, inflating gzip bodies;
//! 2. harvests **every** named input/select of the search form, skipping only
//!    the reset button and image controls;
//! 3. overwrites the query fields (last name, entity type, match score on
//!    both slider controls, and the search button);
//! 4. POSTs the whole field set, url-encoded, to the form's action URL with
//!    the same jar and matching `Origin`/`Referer` headers;
//! 5. maps each row of the results grid to a [`SanctionRecord`] by position.
//!
//! The field set is replayed in full because its names are not known ahead
//! of time; a hand-picked subset breaks whenever the hidden tokens change.

use super::{element_text, resolve_url, SourceScraper};
use crate::config::{EngineConfig, HttpSettings, OfacSettings};
use crate::error::{ScrapeError, ScrapeResult};
use crate::http_client::HttpClient;
use crate::types::{SanctionRecord, SearchRequest, SourceKind};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::cookie::CookieStore;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

/// Names and selectors of the search form.
struct FormLayout {
    form: &'static str,
    fields: &'static str,
    last_name: &'static str,
    entity_type: &'static str,
    score_slider: &'static str,
    score_bound: &'static str,
    search_button: &'static str,
    reset_button: &'static str,
    /// Any field whose name contains this is an image control.
    image_marker: &'static str,
    results_table: &'static str,
}

const FORM: FormLayout = FormLayout {
    form: "form#aspnetForm",
    fields: "input[name], select[name]",
    last_name: "ctl00$MainContent$txtLastName",
    entity_type: "ctl00$MainContent$ddlType",
    score_slider: "ctl00$MainContent$Slider1",
    score_bound: "ctl00$MainContent$Slider1_Boundcontrol",
    search_button: "ctl00$MainContent$btnSearch",
    reset_button: "ctl00$MainContent$btnReset",
    image_marker: "Image",
    results_table: "#gvSearchResults",
};

const ENTITY_TYPE: &str = "Entity";
const SEARCH_LABEL: &str = "Search";

/// Cell positions in a results row.
struct ResultColumns {
    name: usize,
    address: usize,
    entity_type: usize,
    program: usize,
    list: usize,
    score: usize,
}

const COLUMNS: ResultColumns = ResultColumns {
    name: 0,
    address: 1,
    entity_type: 2,
    program: 3,
    list: 4,
    score: 5,
};

const MIN_VISIBLE_CELLS: usize = 6;

struct Selectors {
    form: Selector,
    fields: Selector,
    option_selected: Selector,
    option: Selector,
    results_table: Selector,
    row: Selector,
    cell: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        form: Selector::parse(FORM.form).expect("form selector is valid"),
        fields: Selector::parse(FORM.fields).expect("field selector is valid"),
        option_selected: Selector::parse("option[selected]").expect("option selector is valid"),
        option: Selector::parse("option").expect("option selector is valid"),
        results_table: Selector::parse(FORM.results_table).expect("table selector is valid"),
        row: Selector::parse("tr").expect("row selector is valid"),
        cell: Selector::parse("td").expect("cell selector is valid"),
    })
}

/// The search form as served: its submission URL and every field's value.
///
/// Keys are whatever the server emitted, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedForm {
    pub action_url: String,
    pub fields: IndexMap<String, String>,
}

impl HarvestedForm {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Set a field, keeping its original position if it already exists.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Fill in the query: entity name, entity type, score, and submit control.
    pub fn apply_search(&mut self, entity: &str, score: u8) {
        let score = score.to_string();
        self.set(FORM.last_name, entity);
        self.set(FORM.entity_type, ENTITY_TYPE);
        self.set(FORM.score_slider, score.clone());
        self.set(FORM.score_bound, score);
        self.set(FORM.search_button, SEARCH_LABEL);
    }

    /// Fields as ordered pairs for url-encoding.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The `application/x-www-form-urlencoded` body this form submits as.
    pub fn encoded_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }
}

fn is_excluded(name: &str) -> bool {
    name == FORM.reset_button || name.contains(FORM.image_marker)
}

/// Collect every named input/select of the search form.
///
/// `page_url` is the URL the page was served from; it resolves the form's
/// action and is used as-is when the form names no action.
pub fn harvest_form(html: &str, page_url: &str) -> ScrapeResult<HarvestedForm> {
    let sel = selectors();
    let document = Html::parse_document(html);

    let form = document
        .select(&sel.form)
        .next()
        .ok_or_else(|| ScrapeError::Session(format!("search form {} not found", FORM.form)))?;

    let action_url = resolve_url(page_url, form.value().attr("action").unwrap_or(""));

    let mut fields = IndexMap::new();
    for el in form.select(&sel.fields) {
        let Some(name) = el.value().attr("name") else {
            continue;
        };
        if is_excluded(name) {
            continue;
        }
        let value = match el.value().name() {
            "select" => selected_option_value(&el, sel),
            _ => el.value().attr("value").unwrap_or("").to_string(),
        };
        fields.insert(name.to_string(), value);
    }

    if fields.is_empty() {
        return Err(ScrapeError::Session("search form has no fields to harvest".into()));
    }

    let hidden = form
        .select(&sel.fields)
        .filter(|el| el.value().attr("type") == Some("hidden"))
        .count();
    debug!("harvested {} form fields ({hidden} hidden)", fields.len());

    Ok(HarvestedForm { action_url, fields })
}

/// The value a browser would submit for a `<select>`: the selected option,
/// or the first one.
fn selected_option_value(select: &ElementRef<'_>, sel: &Selectors) -> String {
    select
        .select(&sel.option_selected)
        .next()
        .or_else(|| select.select(&sel.option).next())
        .map(|opt| {
            opt.value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| element_text(&opt))
        })
        .unwrap_or_default()
}

/// Map the results grid to records.
///
/// A missing table is a parse failure; a table with no data rows is an
/// empty result.
pub fn parse_results(html: &str) -> ScrapeResult<Vec<SanctionRecord>> {
    let sel = selectors();
    let document = Html::parse_document(html);

    let table = document
        .select(&sel.results_table)
        .next()
        .ok_or_else(|| ScrapeError::Parse(format!("results table {} not found", FORM.results_table)))?;

    let records = table
        .select(&sel.row)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&sel.cell).map(|td| element_text(&td)).collect();
            if cells.len() < MIN_VISIBLE_CELLS {
                return None;
            }
            Some(SanctionRecord {
                name: cells[COLUMNS.name].clone(),
                address: cells[COLUMNS.address].clone(),
                entity_type: cells[COLUMNS.entity_type].clone(),
                program: cells[COLUMNS.program].clone(),
                list: cells[COLUMNS.list].clone(),
                match_score: cells[COLUMNS.score].clone(),
            })
        })
        .collect();

    Ok(records)
}

/// `scheme://host[:port]` of a URL, as sent in the `Origin` header.
pub fn origin_of(url: &str) -> ScrapeResult<String> {
    Ok(Url::parse(url)?.origin().ascii_serialization())
}

/// Scraper for the OFAC sanctions search.
///
/// Holds only settings: every scrape builds its own client and cookie jar.
pub struct OfacScraper {
    http: HttpSettings,
    settings: OfacSettings,
}

impl OfacScraper {
    pub fn new(config: &EngineConfig) -> ScrapeResult<Self> {
        Url::parse(&config.ofac.landing_url)?;
        Ok(Self {
            http: config.http.clone(),
            settings: config.ofac.clone(),
        })
    }
}

#[async_trait]
impl SourceScraper<SanctionRecord> for OfacScraper {
    fn kind(&self) -> SourceKind {
        SourceKind::Ofac
    }

    async fn scrape(&self, request: &SearchRequest) -> ScrapeResult<Vec<SanctionRecord>> {
        let entity = request.trimmed_entity();
        let score = request.match_score_or(self.settings.default_match_score);

        let (http, jar) = HttpClient::with_fresh_jar(&self.http)?;

        let landing = http
            .get(&self.settings.landing_url)
            .await?
            .error_for_status()?;
        if landing.body.trim().is_empty() {
            return Err(ScrapeError::Transport("landing page was empty".into()));
        }

        let mut form = harvest_form(&landing.body, &landing.final_url)?;
        form.apply_search(entity, score);

        let origin = origin_of(&landing.final_url)?;
        let has_session = Url::parse(&landing.final_url)
            .ok()
            .and_then(|u| jar.cookies(&u))
            .is_some();
        debug!(
            "posting {} fields to {} (session cookie: {has_session})",
            form.len(),
            form.action_url
        );

        let headers = [
            ("Origin".to_string(), origin),
            ("Referer".to_string(), form.action_url.clone()),
        ];
        let results = http
            .post_form(&form.action_url, &form.to_pairs(), &headers)
            .await?
            .error_for_status()?;

        parse_results(&results.body)
    }
}
