//! Core data types: screening records, requests, and per-source envelopes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Envelope status for a source that returned at least one record.
pub const STATUS_OK: u16 = 200;
/// Envelope status for a source that returned nothing, or failed.
pub const STATUS_NOT_FOUND: u16 = 404;
/// Envelope status assigned by the admission layer when a call is rejected.
pub const STATUS_RATE_LIMITED: u16 = 429;

const MESSAGE_OK: &str = "Results found";
const MESSAGE_NOT_FOUND: &str = "No results found";
const MESSAGE_RATE_LIMITED: &str = "Request limit exceeded. Try again later.";

/// One disclosed match from the offshore leaks database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffshoreRecord {
    pub entity_name: String,
    pub jurisdiction: String,
    pub linked_to: String,
    /// Which leak the record was published in.
    pub source_label: String,
}

/// One firm from the World Bank debarment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebarredFirmRecord {
    pub firm_name: String,
    pub address: String,
    pub country: String,
    pub from_date: String,
    pub to_date: String,
    pub grounds: String,
}

/// One hit from the OFAC sanctions search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanctionRecord {
    pub name: String,
    pub address: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub program: String,
    pub list: String,
    pub match_score: String,
}

/// A screening query for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub entity_name: String,
    /// Fuzzy-match sensitivity for the sanctions search, 0–100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score_threshold: Option<u8>,
}

impl SearchRequest {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            match_score_threshold: None,
        }
    }

    pub fn with_match_score(mut self, score: u8) -> Self {
        self.match_score_threshold = Some(score);
        self
    }

    /// The entity name with surrounding whitespace removed.
    pub fn trimmed_entity(&self) -> &str {
        self.entity_name.trim()
    }

    /// The threshold to submit, falling back to `default` and capped at 100.
    pub fn match_score_or(&self, default: u8) -> u8 {
        self.match_score_threshold.unwrap_or(default).min(100)
    }
}

/// The three public sources the engine screens against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Offshore,
    WorldBank,
    Ofac,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Offshore => "offshore",
            SourceKind::WorldBank => "worldbank",
            SourceKind::Ofac => "ofac",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offshore" | "offshoreleaks" => Ok(SourceKind::Offshore),
            "worldbank" | "world-bank" => Ok(SourceKind::WorldBank),
            "ofac" => Ok(SourceKind::Ofac),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Per-source response envelope.
///
/// Fields are private so that `count` always equals the number of records;
/// build one with [`SourceResult::from_records`] or
/// [`SourceResult::rate_limited`].
///
/// A 404 envelope means either "no genuine matches" or "the source failed".
/// The two are deliberately not distinguished here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult<T> {
    status_code: u16,
    message: String,
    count: usize,
    records: Vec<T>,
}

impl<T> SourceResult<T> {
    /// Wrap a scraper's output: 200 when non-empty, 404 otherwise.
    pub fn from_records(records: Vec<T>) -> Self {
        let (status_code, message) = if records.is_empty() {
            (STATUS_NOT_FOUND, MESSAGE_NOT_FOUND)
        } else {
            (STATUS_OK, MESSAGE_OK)
        };
        Self {
            status_code,
            message: message.to_string(),
            count: records.len(),
            records,
        }
    }

    /// An empty envelope for a call the admission layer turned away.
    pub fn rate_limited() -> Self {
        Self {
            status_code: STATUS_RATE_LIMITED,
            message: MESSAGE_RATE_LIMITED.to_string(),
            count: 0,
            records: Vec::new(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

/// Envelopes for all three sources from one combined call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub offshore: SourceResult<OffshoreRecord>,
    pub worldbank: SourceResult<DebarredFirmRecord>,
    pub ofac: SourceResult<SanctionRecord>,
}

impl ScreeningReport {
    /// Every source rejected by the admission layer.
    pub fn rate_limited() -> Self {
        Self {
            offshore: SourceResult::rate_limited(),
            worldbank: SourceResult::rate_limited(),
            ofac: SourceResult::rate_limited(),
        }
    }

    /// Total records across the three sources.
    pub fn total_count(&self) -> usize {
        self.offshore.count() + self.worldbank.count() + self.ofac.count()
    }
}

/// Envelope returned by the dynamic single-source entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceReport {
    Offshore(SourceResult<OffshoreRecord>),
    #[serde(rename = "worldbank")]
    WorldBank(SourceResult<DebarredFirmRecord>),
    Ofac(SourceResult<SanctionRecord>),
}

impl SourceReport {
    pub fn rate_limited(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Offshore => SourceReport::Offshore(SourceResult::rate_limited()),
            SourceKind::WorldBank => SourceReport::WorldBank(SourceResult::rate_limited()),
            SourceKind::Ofac => SourceReport::Ofac(SourceResult::rate_limited()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceReport::Offshore(_) => SourceKind::Offshore,
            SourceReport::WorldBank(_) => SourceKind::WorldBank,
            SourceReport::Ofac(_) => SourceKind::Ofac,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            SourceReport::Offshore(r) => r.status_code(),
            SourceReport::WorldBank(r) => r.status_code(),
            SourceReport::Ofac(r) => r.status_code(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            SourceReport::Offshore(r) => r.count(),
            SourceReport::WorldBank(r) => r.count(),
            SourceReport::Ofac(r) => r.count(),
        }
    }
}
