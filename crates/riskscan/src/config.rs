//! Engine configuration and environment resolution.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OFFSHORE_URL: &str = "https://offshoreleaks.icij.org/";
pub const DEFAULT_WORLDBANK_URL: &str =
    "https://projects.worldbank.org/en/projects-operations/procurement/debarred-firms";
pub const DEFAULT_OFAC_URL: &str = "https://sanctionssearch.ofac.treas.gov/Default.aspx";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                  AppleWebKit/537.36 (KHTML, like Gecko) \
                                  Chrome/121.0.0.0 Safari/537.36";

/// Settings for the whole engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub http: HttpSettings,
    pub offshore: OffshoreSettings,
    pub worldbank: WorldBankSettings,
    pub ofac: OfacSettings,
    /// Upper bound on a whole aggregate call, in milliseconds.
    pub request_deadline_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http: HttpSettings::default(),
            offshore: OffshoreSettings::default(),
            worldbank: WorldBankSettings::default(),
            ofac: OfacSettings::default(),
            request_deadline_ms: 120_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_ms: u64,
    /// Extra attempts on transport errors, 5xx, and 429.
    pub max_retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: 30_000,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OffshoreSettings {
    pub base_url: String,
    /// Rows the source serves per page; the `from` offset advances by this.
    pub page_size: usize,
    /// Hard ceiling on pages fetched for one entity.
    pub max_pages: usize,
    /// Hard ceiling on records kept for one entity.
    pub max_records: usize,
}

impl Default for OffshoreSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OFFSHORE_URL.to_string(),
            page_size: 100,
            max_pages: 50,
            max_records: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldBankSettings {
    pub landing_url: String,
    pub grid_selector: String,
    pub row_selector: String,
    /// Rows re-queried for extraction once the grid has settled.
    pub table_row_selector: String,
    pub filter_selector: String,
    pub navigation_timeout_ms: u64,
    pub wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub chromium_path: Option<PathBuf>,
}

impl Default for WorldBankSettings {
    fn default() -> Self {
        Self {
            landing_url: DEFAULT_WORLDBANK_URL.to_string(),
            grid_selector: ".k-grid-content".to_string(),
            row_selector: ".k-grid-content tr".to_string(),
            table_row_selector: "#k-debarred-firms .k-grid-content tr".to_string(),
            filter_selector: "#category".to_string(),
            navigation_timeout_ms: 30_000,
            wait_timeout_ms: 10_000,
            poll_interval_ms: 250,
            chromium_path: None,
        }
    }
}

impl WorldBankSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfacSettings {
    pub landing_url: String,
    /// Threshold used when the request carries none.
    pub default_match_score: u8,
}

impl Default for OfacSettings {
    fn default() -> Self {
        Self {
            landing_url: DEFAULT_OFAC_URL.to_string(),
            default_match_score: 100,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `RISKSCAN_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay values from a key lookup. Unparseable numbers are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RISKSCAN_OFFSHORE_URL") {
            self.offshore.base_url = v;
        }
        if let Some(v) = lookup("RISKSCAN_WORLDBANK_URL") {
            self.worldbank.landing_url = v;
        }
        if let Some(v) = lookup("RISKSCAN_OFAC_URL") {
            self.ofac.landing_url = v;
        }
        if let Some(v) = lookup("RISKSCAN_CHROMIUM_PATH") {
            self.worldbank.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(secs) = lookup("RISKSCAN_DEADLINE_SECS").and_then(|v| v.parse::<u64>().ok()) {
            self.request_deadline_ms = secs * 1000;
        }
        if let Some(secs) =
            lookup("RISKSCAN_HTTP_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok())
        {
            self.http.timeout_ms = secs * 1000;
        }
        if let Some(n) = lookup("RISKSCAN_MAX_PAGES").and_then(|v| v.parse::<usize>().ok()) {
            self.offshore.max_pages = n;
        }
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}
