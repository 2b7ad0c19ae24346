//! Rate-limited, retrying HTTP client for the iNaturalist API
//!
//! Every outbound request goes through the owned [`RateLimiter`]. HTTP 429
//! and transport failures are retried with exponential backoff according to
//! the [`RetryPolicy`]; any other failure ends the call immediately.

use crate::api::{endpoints, types::*};
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::rate_limit::RateLimiter;
use crate::retry::{parse_retry_after, RetryPolicy};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use taxtally_common::ObservationId;
use tracing::{debug, warn};

/// Outcome of one HTTP attempt, before the retry policy is applied
enum Attempt {
    Done(Value),
    Throttled { retry_after: Option<Duration> },
    Unreachable(String),
    Failed(String),
}

/// API client for iNaturalist
pub struct InatClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    limiter: RateLimiter,
}

impl InatClient {
    /// Create a client. The limiter is moved in: all calls made through this
    /// client share its spacing and call count.
    pub fn new(config: &Config, retry: RetryPolicy, limiter: RateLimiter) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            retry,
            limiter,
        })
    }

    /// Fetch one observation. `Ok(None)` means the API had no result for it.
    pub async fn get_observation(
        &mut self,
        id: &ObservationId,
    ) -> std::result::Result<Option<Observation>, FetchError> {
        let url = endpoints::observation_url(&self.base_url, id.as_str());
        let page: ResultsPage<Observation> = self.fetch_page(&url).await?;
        Ok(page.into_first())
    }

    /// Fetch one taxon by id. `Ok(None)` means the API had no result for it.
    pub async fn get_taxon(
        &mut self,
        taxon_id: &str,
    ) -> std::result::Result<Option<TaxonRecord>, FetchError> {
        let url = endpoints::taxon_url(&self.base_url, taxon_id);
        let page: ResultsPage<TaxonRecord> = self.fetch_page(&url).await?;
        Ok(page.into_first())
    }

    async fn fetch_page<T: DeserializeOwned>(
        &mut self,
        url: &str,
    ) -> std::result::Result<ResultsPage<T>, FetchError> {
        let document = self.fetch(url).await?;
        serde_json::from_value(document).map_err(|e| {
            FetchError::RequestFailed(format!("unexpected response shape from {}: {}", url, e))
        })
    }

    /// GET `url` and return the parsed JSON document.
    ///
    /// Makes at most `retry.attempts()` requests. A 429 also widens the
    /// limiter's spacing for the rest of the run.
    pub async fn fetch(&mut self, url: &str) -> std::result::Result<Value, FetchError> {
        let attempts = self.retry.attempts();
        let mut attempt = 0;

        loop {
            self.limiter.wait_then_record().await;
            let is_last = attempt + 1 >= attempts;

            match self.attempt(url).await {
                Attempt::Done(document) => {
                    if attempt > 0 {
                        debug!(url, attempts = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(document);
                },
                Attempt::Throttled { retry_after } => {
                    self.limiter.slow_down(self.retry.throttle_factor);
                    if is_last {
                        warn!(url, attempts, "Rate limit exceeded on every attempt, giving up");
                        return Err(FetchError::RateLimited { attempts });
                    }

                    let backoff = self.retry.backoff(attempt, retry_after);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                        "Rate limit exceeded, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                },
                Attempt::Unreachable(message) => {
                    if is_last {
                        warn!(url, attempts, error = %message, "Connection failed on every attempt, giving up");
                        return Err(FetchError::ConnectionFailed { attempts, message });
                    }

                    let backoff = self.retry.backoff(attempt, None);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %message,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                },
                Attempt::Failed(message) => {
                    debug!(url, error = %message, "Request failed, not retrying");
                    return Err(FetchError::RequestFailed(message));
                },
            }

            attempt += 1;
        }
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return Attempt::Failed(e.to_string()),
            Err(e) => return Attempt::Unreachable(e.to_string()),
        };

        log_rate_limit_headers(url, response.headers());

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, chrono::Utc::now()));
            return Attempt::Throttled { retry_after };
        }

        if !status.is_success() {
            return Attempt::Failed(format!("HTTP {} for {}", status, url));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Attempt::Unreachable(e.to_string()),
        };

        match serde_json::from_slice(&body) {
            Ok(document) => Attempt::Done(document),
            Err(e) => Attempt::Failed(format!("malformed JSON from {}: {}", url, e)),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Total outbound requests, including retries.
    pub fn call_count(&self) -> u64 {
        self.limiter.call_count()
    }
}

fn log_rate_limit_headers(url: &str, headers: &HeaderMap) {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(remaining) = header("x-ratelimit-remaining") {
        debug!(
            url,
            remaining,
            reset = header("x-ratelimit-reset").unwrap_or("unknown"),
            "API rate limit status"
        );
    }
}
