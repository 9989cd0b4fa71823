//! Renderer abstraction for browser-driven scraping.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).

pub mod chromium;
pub mod wait;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that hands out rendering contexts.
///
/// Every context is an exclusive browser session for one scrape. Contexts
/// are never pooled or shared.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Acquire a new, isolated browser session.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser session for rendering and driving one page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Focus the element matching `selector` and type `text` into it as key events.
    async fn type_text(&mut self, selector: &str, text: &str) -> Result<()>;
    /// Close this context and release the browser.
    async fn close(self: Box<Self>) -> Result<()>;

    /// Number of elements currently matching a CSS selector.
    async fn count(&self, selector: &str) -> Result<usize> {
        let script = format!(
            "document.querySelectorAll('{}').length",
            sanitize_js_string(selector)
        );
        let value = self.execute_js(&script).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| anyhow::anyhow!("element count was not a number: {value}"))
    }
}

/// A renderer used when Chromium is unavailable.
///
/// Every context request fails, so browser-backed sources come back empty
/// while the HTTP-only sources keep working.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available (HTTP-only mode)"))
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

/// Escape a string for use inside a single-quoted JavaScript literal.
pub fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_js_string() {
        assert_eq!(sanitize_js_string("#k-grid tr"), "#k-grid tr");
        assert_eq!(sanitize_js_string("a[name='x']"), "a[name=\\'x\\']");
        assert_eq!(sanitize_js_string("</script>"), "\\x3c/script\\x3e");
    }

    #[tokio::test]
    async fn test_noop_renderer_refuses_contexts() {
        let renderer = NoopRenderer;
        assert!(renderer.new_context().await.is_err());
        assert_eq!(renderer.active_contexts(), 0);
    }
}
