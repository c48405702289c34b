use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{debug, warn};

use crate::config::FetchMode;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const USER_AGENT: &str = concat!("recon_scraper/", env!("CARGO_PKG_VERSION"));

/// A fetched page, ready for extraction.
pub struct Fetched {
    pub html: String,
    pub status: Option<u16>,
    pub latency_ms: u128,
}

/// Outcome of one attempt. `Retry` carries the reason for the log line.
enum Attempt {
    Done(Fetched),
    Retry(String),
}

pub async fn fetch_page(url: &str, mode: FetchMode) -> Result<Fetched> {
    let client = match mode {
        FetchMode::Direct => Some(
            reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(60))
                .build()?,
        ),
        FetchMode::Spider => None,
    };

    let client = client.as_ref();
    with_retries(url, Duration::from_millis(BASE_BACKOFF_MS), move || fetch_once(url, client)).await
}

/// Up to `MAX_RETRIES` backed-off retries, then one final attempt.
async fn with_retries<F, Fut>(url: &str, base_backoff: Duration, mut attempt_once: F) -> Result<Fetched>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt>>,
{
    for attempt in 0..MAX_RETRIES {
        match attempt_once().await? {
            Attempt::Done(page) => return Ok(page),
            Attempt::Retry(reason) => {
                let backoff = base_backoff * 2u32.pow(attempt);
                warn!(
                    "{} on {} (attempt {}/{}), backing off {:.1}s",
                    reason,
                    url,
                    attempt + 1,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }

    match attempt_once().await? {
        Attempt::Done(page) => Ok(page),
        Attempt::Retry(reason) => Err(anyhow!(
            "Giving up on {} after {} retries: {}",
            url,
            MAX_RETRIES,
            reason
        )),
    }
}

/// One attempt. A client means direct HTTP, none means spider.cloud.
async fn fetch_once(url: &str, client: Option<&reqwest::Client>) -> Result<Attempt> {
    let start = Instant::now();
    let outcome = match client {
        Some(client) => fetch_direct(client, url).await?,
        None => fetch_spider(url).await?,
    };
    Ok(match outcome {
        Attempt::Done(mut page) => {
            page.latency_ms = start.elapsed().as_millis();
            debug!("Fetched {} ({} bytes, {} ms)", url, page.html.len(), page.latency_ms);
            Attempt::Done(page)
        }
        retry => retry,
    })
}

fn is_retryable(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

async fn fetch_direct(client: &reqwest::Client, url: &str) -> Result<Attempt> {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() || e.is_connect() => return Ok(Attempt::Retry(e.to_string())),
        Err(e) => return Err(e).with_context(|| format!("Request to {} failed", url)),
    };

    let status = response.status().as_u16();
    if is_retryable(status) {
        return Ok(Attempt::Retry(format!("HTTP {}", status)));
    }
    let response = response
        .error_for_status()
        .with_context(|| format!("Fetching {}", url))?;
    let html = response.text().await.context("Failed to read response body")?;

    Ok(Attempt::Done(Fetched {
        html,
        status: Some(status),
        latency_ms: 0,
    }))
}

async fn fetch_spider(url: &str) -> Result<Attempt> {
    let api_key = std::env::var("SPIDER_API_KEY")
        .map_err(|_| anyhow!("SPIDER_API_KEY environment variable must be set"))?;
    let spider = Spider::new(Some(api_key))
        .map_err(|e| anyhow!("Failed to create Spider client: {}", e))?;

    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
        ..Default::default()
    };

    let response = match spider.scrape_url(url, Some(params), "application/json").await {
        Ok(v) => v,
        Err(e) => {
            let msg = e.to_string();
            let transient = msg.contains("429")
                || msg.contains("rate")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503");
            if transient {
                return Ok(Attempt::Retry(msg));
            }
            return Err(anyhow!("Spider scrape failed: {}", msg));
        }
    };

    let parsed: serde_json::Value = match response.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
        None => response,
    };
    let first = parsed.as_array().and_then(|arr| arr.first());

    let status = first
        .and_then(|obj| obj.get("status"))
        .and_then(|s| s.as_u64())
        .map(|s| s as u16);
    if let Some(s) = status.filter(|s| is_retryable(*s)) {
        return Ok(Attempt::Retry(format!("HTTP {} from spider", s)));
    }

    let html = first
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("No content in spider response"))?
        .to_string();

    Ok(Attempt::Done(Fetched {
        html,
        status,
        latency_ms: 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(429));
        assert!(is_retryable(503));
        assert!(!is_retryable(404));
        assert!(!is_retryable(200));
    }

    fn page(html: &str) -> Fetched {
        Fetched {
            html: html.to_string(),
            status: Some(200),
            latency_ms: 0,
        }
    }

    #[tokio::test]
    async fn retries_until_done() {
        let mut calls = 0;
        let fetched = with_retries("https://festoolrecon.com", Duration::ZERO, || {
            calls += 1;
            let n = calls;
            async move {
                if n < 3 {
                    Ok(Attempt::Retry("HTTP 503".to_string()))
                } else {
                    Ok(Attempt::Done(page("<html></html>")))
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(fetched.html, "<html></html>");
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn gives_up_after_final_attempt() {
        let mut calls = 0;
        let err = with_retries("https://festoolrecon.com", Duration::ZERO, || {
            calls += 1;
            async { Ok(Attempt::Retry("HTTP 429".to_string())) }
        })
        .await
        .err()
        .unwrap();
        assert_eq!(calls, MAX_RETRIES + 1);
        assert!(err.to_string().contains("HTTP 429"), "{err}");
    }

    #[tokio::test]
    async fn hard_error_is_not_retried() {
        let mut calls = 0;
        let err = with_retries("https://festoolrecon.com", Duration::ZERO, || {
            calls += 1;
            async { Err(anyhow!("SPIDER_API_KEY environment variable must be set")) }
        })
        .await
        .err()
        .unwrap();
        assert_eq!(calls, 1);
        assert!(err.to_string().contains("SPIDER_API_KEY"));
    }
}
