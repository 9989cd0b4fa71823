//! Chromium-based renderer using chromiumoxide.
//!
//! Each context launches its own headless Chromium with a throwaway
//! profile directory, so no cookies, cache, or tabs leak between scrapes.

use super::{NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Configured path (flag or RISKSCAN_CHROMIUM_PATH)
    if let Some(p) = explicit {
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }

    // 2. ~/.riskscan/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = [
            home.join(".riskscan/chromium/chrome-linux64/chrome"),
            home.join(".riskscan/chromium/chrome"),
        ];
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common install locations
    let common = if cfg!(target_os = "macos") {
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
    } else {
        PathBuf::from("/usr/bin/chromium-browser")
    };
    if common.exists() {
        return Some(common);
    }

    None
}

/// Launches one dedicated Chromium per context.
pub struct ChromiumRenderer {
    chrome_path: PathBuf,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Locate Chromium. Nothing is launched until a context is requested.
    pub fn new(explicit: Option<&Path>) -> Result<Self> {
        let chrome_path = find_chromium(explicit)
            .context("Chromium not found. Set RISKSCAN_CHROMIUM_PATH or install chromium.")?;
        Ok(Self {
            chrome_path,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let profile_dir =
            std::env::temp_dir().join(format!("riskscan-chromium-{}", uuid::Uuid::new_v4()));

        let config = BrowserConfig::builder()
            .chrome_executable(&self.chrome_path)
            .user_data_dir(&profile_dir)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                let _ = std::fs::remove_dir_all(&profile_dir);
                bail!("failed to create new page: {e}");
            }
        };

        self.active_count.fetch_add(1, Ordering::Relaxed);
        debug!("launched Chromium session in {}", profile_dir.display());

        Ok(Box::new(ChromiumContext {
            browser,
            page,
            handler,
            profile_dir,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A Chromium process and its single page, owned by one scrape.
pub struct ChromiumContext {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_response)) => {
                let _ = self.page.wait_for_navigation().await;

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element not found: {selector}"))?;
        element
            .click()
            .await
            .with_context(|| format!("failed to focus {selector}"))?;
        element
            .type_str(text)
            .await
            .with_context(|| format!("failed to type into {selector}"))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        if let Err(e) = this.browser.close().await {
            warn!("Chromium close failed: {e}");
        }
        let _ = this.browser.wait().await;
        Ok(())
    }
}

impl Drop for ChromiumContext {
    // Runs after `close()` and also when a scrape is cancelled mid-flight;
    // dropping `Browser` kills the child process if it is still running.
    fn drop(&mut self) {
        self.handler.abort();
        let _ = std::fs::remove_dir_all(&self.profile_dir);
        self.active_count.fetch_sub(1, Ordering::Relaxed);
    }
}
