//! Bounded wait-poll synchronization against live DOM state.

use crate::error::{ScrapeError, ScrapeResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Poll `check` every `interval` until it reports `true` or `timeout` elapses.
///
/// Check errors are treated as "not yet" and retried; if the deadline passes
/// the last error is folded into the returned automation failure. A check
/// still running at the deadline is dropped.
pub async fn wait_for<F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> ScrapeResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let deadline = Instant::now() + timeout;
    let mut polls = 0u32;
    let mut last_error: Option<String> = None;

    let timed_out = |last_error: Option<String>| {
        let detail = last_error.map(|e| format!(" (last error: {e})")).unwrap_or_default();
        ScrapeError::Automation(format!(
            "timed out after {}ms waiting for {what}{detail}",
            timeout.as_millis()
        ))
    };

    loop {
        polls += 1;
        match tokio::time::timeout_at(deadline, check()).await {
            Ok(Ok(true)) => {
                debug!("{what}: satisfied after {polls} polls");
                return Ok(());
            }
            Ok(Ok(false)) => last_error = None,
            Ok(Err(e)) => last_error = Some(e.to_string()),
            Err(_) => {
                debug!("{what}: check {polls} still pending at deadline");
                return Err(timed_out(Some("check did not answer".into())));
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out(last_error));
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
