//! Async HTTP client wrapping reqwest.
//!
//! Not a browser, just HTTP requests. Handles redirects, timeouts,
//! retry on 5xx, backoff on 429, and gzip bodies. Clients built with
//! [`HttpClient::with_fresh_jar`] carry their own cookie jar.

use crate::config::HttpSettings;
use crate::error::{ScrapeError, ScrapeResult};
use flate2::read::GzDecoder;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, RETRY_AFTER};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// A fully read and decoded HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Decoded response body.
    pub body: String,
}

impl HttpResponse {
    /// Turn a non-2xx status into a transport failure.
    pub fn error_for_status(self) -> ScrapeResult<Self> {
        if (200..300).contains(&self.status) {
            Ok(self)
        } else {
            Err(ScrapeError::Transport(format!(
                "{} returned HTTP {}",
                self.url, self.status
            )))
        }
    }
}

/// HTTP client for the scrapers.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl HttpClient {
    /// Create a client without cookie storage.
    pub fn new(settings: &HttpSettings) -> ScrapeResult<Self> {
        let client = Self::builder(settings).build()?;
        Ok(Self::from_parts(client, settings))
    }

    /// Create a client that owns a brand-new cookie jar.
    ///
    /// The jar is returned as well so callers can inspect session state.
    /// Never share the result across invocations.
    pub fn with_fresh_jar(settings: &HttpSettings) -> ScrapeResult<(Self, Arc<Jar>)> {
        let jar = Arc::new(Jar::default());
        let client = Self::builder(settings)
            .cookie_provider(Arc::clone(&jar))
            .build()?;
        Ok((Self::from_parts(client, settings), jar))
    }

    fn builder(settings: &HttpSettings) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(settings.user_agent.as_str())
    }

    fn from_parts(client: reqwest::Client, settings: &HttpSettings) -> Self {
        Self {
            client,
            timeout: Duration::from_millis(settings.timeout_ms),
            max_retries: settings.max_retries,
        }
    }

    /// Perform a GET with retry on transport errors and 5xx, and backoff on 429.
    ///
    /// The final response is returned whatever its status; use
    /// [`HttpResponse::error_for_status`] to reject failures.
    pub async fn get(&self, url: &str) -> ScrapeResult<HttpResponse> {
        let mut retries = 0u32;

        loop {
            let resp = self
                .client
                .get(url)
                .timeout(self.timeout)
                .header(ACCEPT, ACCEPT_HTML)
                .header(ACCEPT_ENCODING, "gzip")
                .send()
                .await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        debug!("GET {url} returned {status}, retry {retries}");
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get(RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        debug!("GET {url} throttled, waiting {retry_after}s");
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    return read_response(url, r).await;
                }
                Err(e) => {
                    if retries < self.max_retries {
                        retries += 1;
                        debug!("GET {url} failed: {e}, retry {retries}");
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// POST form data (url-encoded) in the given field order.
    ///
    /// Not retried: a postback may not be idempotent.
    pub async fn post_form(
        &self,
        url: &str,
        form_fields: &[(String, String)],
        extra_headers: &[(String, String)],
    ) -> ScrapeResult<HttpResponse> {
        let mut builder = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_ENCODING, "gzip");

        for (name, value) in extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let r = builder.form(form_fields).send().await?;
        read_response(url, r).await
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1)))
}

async fn read_response(url: &str, r: reqwest::Response) -> ScrapeResult<HttpResponse> {
    let status = r.status().as_u16();
    let final_url = r.url().to_string();
    let encoding = r
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = r.bytes().await?;
    let body = decode_body(encoding.as_deref(), &bytes)?;

    Ok(HttpResponse {
        url: url.to_string(),
        final_url,
        status,
        body,
    })
}

/// Decode a response body, inflating it first when the server gzipped it.
pub fn decode_body(content_encoding: Option<&str>, bytes: &[u8]) -> ScrapeResult<String> {
    let gzipped = content_encoding
        .map(|e| e.to_ascii_lowercase().contains("gzip"))
        .unwrap_or(false);

    if !gzipped {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let mut inflated = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut inflated)
        .map_err(|e| ScrapeError::Transport(format!("failed to inflate gzip body: {e}")))?;
    Ok(String::from_utf8_lossy(&inflated).into_owned())
}
