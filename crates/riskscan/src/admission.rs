//! Admission control in front of the engine.
//!
//! The gate decides before any scraper runs; a rejected call never reaches
//! the sources and comes back as 429 envelopes.

use crate::engine::ScreeningEngine;
use crate::types::{
    DebarredFirmRecord, OffshoreRecord, SanctionRecord, ScreeningReport, SearchRequest,
    SourceKind, SourceReport, SourceResult,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

/// Calls admitted per window by default.
pub const DEFAULT_LIMIT: u32 = 10;
/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// A sliding-window rate limiter.
pub struct RateLimiter {
    inner: Mutex<RateLimiterInner>,
}

struct RateLimiterInner {
    limit: u32,
    window: Duration,
    /// Admission times still inside the window, oldest first.
    admitted: VecDeque<Instant>,
}

impl RateLimiterInner {
    fn evict(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while self.admitted.front().is_some_and(|t| *t <= cutoff) {
            self.admitted.pop_front();
        }
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            inner: Mutex::new(RateLimiterInner {
                limit,
                window,
                admitted: VecDeque::new(),
            }),
        }
    }

    /// Admit one call if the window has room.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        inner.evict(now);
        if (inner.admitted.len() as u32) < inner.limit {
            inner.admitted.push_back(now);
            true
        } else {
            false
        }
    }

    /// Time until the next call would be admitted.
    pub fn wait_duration(&self) -> Duration {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.evict(now);
        if (inner.admitted.len() as u32) < inner.limit {
            return Duration::ZERO;
        }
        inner
            .admitted
            .front()
            .map(|oldest| (*oldest + inner.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Calls admitted within the current window.
    pub fn current_count(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.evict(Instant::now());
        inner.admitted.len() as u32
    }

    pub fn limit(&self) -> u32 {
        self.inner.lock().limit
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

/// Rate-limited front door to a [`ScreeningEngine`].
///
/// Exposes the same entry points; each call, combined or single-source,
/// consumes one admission.
pub struct AdmissionGate {
    engine: ScreeningEngine,
    limiter: RateLimiter,
}

impl AdmissionGate {
    pub fn new(engine: ScreeningEngine, limiter: RateLimiter) -> Self {
        Self { engine, limiter }
    }

    pub fn engine(&self) -> &ScreeningEngine {
        &self.engine
    }

    fn admit(&self, what: &str) -> bool {
        if self.limiter.try_acquire() {
            return true;
        }
        warn!(
            "rejecting {what} call, retry in {}s",
            self.limiter.wait_duration().as_secs()
        );
        false
    }

    pub async fn scrape_all(&self, request: &SearchRequest) -> ScreeningReport {
        if !self.admit("combined") {
            return ScreeningReport::rate_limited();
        }
        self.engine.scrape_all(request).await
    }

    pub async fn scrape_offshore(&self, request: &SearchRequest) -> SourceResult<OffshoreRecord> {
        if !self.admit(SourceKind::Offshore.label()) {
            return SourceResult::rate_limited();
        }
        self.engine.scrape_offshore(request).await
    }

    pub async fn scrape_worldbank(
        &self,
        request: &SearchRequest,
    ) -> SourceResult<DebarredFirmRecord> {
        if !self.admit(SourceKind::WorldBank.label()) {
            return SourceResult::rate_limited();
        }
        self.engine.scrape_worldbank(request).await
    }

    pub async fn scrape_ofac(&self, request: &SearchRequest) -> SourceResult<SanctionRecord> {
        if !self.admit(SourceKind::Ofac.label()) {
            return SourceResult::rate_limited();
        }
        self.engine.scrape_ofac(request).await
    }

    pub async fn scrape_one(&self, kind: SourceKind, request: &SearchRequest) -> SourceReport {
        if !self.admit(kind.label()) {
            return SourceReport::rate_limited(kind);
        }
        self.engine.scrape_one(kind, request).await
    }
}
