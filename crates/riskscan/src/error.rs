//! Error taxonomy for the scrapers.
//!
//! Errors never leave a scraper: [`crate::sources::collect_or_empty`]
//! logs them and turns them into an empty record list.

/// All failures a scrape can hit.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// Network, DNS, timeout, or a non-success HTTP status.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// An expected element or table was absent from the document.
    #[error("Parse failure: {0}")]
    Parse(String),

    /// Browser wait timed out or an element could not be driven.
    #[error("Automation failure: {0}")]
    Automation(String),

    /// Form state could not be harvested or resolved for resubmission.
    #[error("Session failure: {0}")]
    Session(String),

    /// The engine was built with an unusable setting.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ScrapeError {
    /// Short category name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Transport(_) | ScrapeError::Http(_) => "transport",
            ScrapeError::Parse(_) => "parse",
            ScrapeError::Automation(_) => "automation",
            ScrapeError::Session(_) => "session",
            ScrapeError::Config(_) | ScrapeError::Url(_) => "config",
        }
    }
}

/// Convenience result type.
pub type ScrapeResult<T> = Result<T, ScrapeError>;
