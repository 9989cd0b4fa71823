//! Riskscan: screen a named business entity against offshore leaks, debarred
//! firms, and sanctions listings, each behind one uniform result envelope.

pub mod admission;
pub mod config;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod renderer;
pub mod sources;
pub mod types;

pub use admission::{AdmissionGate, RateLimiter};
pub use config::EngineConfig;
pub use engine::ScreeningEngine;
pub use error::{ScrapeError, ScrapeResult};
pub use sources::SourceScraper;
pub use types::*;
