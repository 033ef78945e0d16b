//! JSON HTTP client shared by every catalog source and the ingest sink.

use std::time::Duration;

use cestadb_core::AppConfig;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

/// Thin wrapper over `reqwest::Client` that maps HTTP statuses to typed
/// errors and retries transient failures with backoff.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
    request_delay: Duration,
}

impl HttpClient {
    /// Creates a client with the given timeout, `User-Agent`, and retry policy.
    ///
    /// `max_retries` counts attempts after the first one; `0` disables retries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
            request_delay: Duration::ZERO,
        })
    }

    /// Builds a client from the `CESTADB_SCRAPER_*` settings.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Ok(Self::new(
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_secs,
        )?
        .with_request_delay(Duration::from_millis(
            config.scraper_inter_request_delay_ms,
        )))
    }

    /// Sets the politeness delay applied by [`HttpClient::pause`].
    #[must_use]
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    #[must_use]
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Sleeps for the configured inter-request delay.
    pub async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }

    /// GETs `url` and decodes the JSON body as `T`, retrying transient errors.
    ///
    /// `headers` are sent in addition to `Accept: application/json`.
    /// `context` labels decode errors.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`] : HTTP 429 after all retries.
    /// - [`ScraperError::NotFound`] : HTTP 404 (not retried).
    /// - [`ScraperError::UnexpectedStatus`] : other non-2xx (5xx retried).
    /// - [`ScraperError::Http`] : network failure after all retries.
    /// - [`ScraperError::Deserialize`] : body is not the expected JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        context: &str,
    ) -> Result<T, ScraperError> {
        tracing::debug!(url, "GET");
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async move {
            let mut request = self
                .client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            let response = request.send().await?;
            decode_response(response, url, context).await
        })
        .await
    }

    /// POSTs `body` as JSON to `url` and decodes the JSON reply as `T`.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::get_json`].
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        context: &str,
    ) -> Result<T, ScraperError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        tracing::debug!(url, "POST");
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async move {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .json(body)
                .send()
                .await?;
            decode_response(response, url, context).await
        })
        .await
    }
}

async fn decode_response<T: DeserializeOwned>(
    response: Response,
    url: &str,
    context: &str,
) -> Result<T, ScraperError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0);
        return Err(ScraperError::RateLimited {
            domain: domain_of(url),
            retry_after_secs,
        });
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ScraperError::NotFound {
            url: url.to_owned(),
        });
    }

    if !status.is_success() {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str::<T>(&body).map_err(|e| ScraperError::Deserialize {
        context: context.to_owned(),
        source: e,
    })
}

fn domain_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}
