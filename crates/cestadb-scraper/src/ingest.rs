//! Client for the remote batch ingest endpoint.

use cestadb_core::{NormalizedProduct, SinkReport};
use serde::{Deserialize, Serialize};

use crate::client::HttpClient;
use crate::error::ScraperError;

#[derive(Serialize)]
struct IngestRequest<'a> {
    products: &'a [NormalizedProduct],
}

/// Counts returned by the ingest endpoint for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub new: usize,
    #[serde(default)]
    pub updated: usize,
    #[serde(default)]
    pub unchanged: usize,
}

pub struct IngestClient {
    client: HttpClient,
    url: String,
}

impl IngestClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] unless `url` is an absolute
    /// `http(s)` URL.
    pub fn new(client: HttpClient, url: impl Into<String>) -> Result<Self, ScraperError> {
        let url = url.into();
        let parsed = reqwest::Url::parse(&url).map_err(|e| ScraperError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScraperError::InvalidUrl {
                reason: format!("unsupported scheme \"{}\"", parsed.scheme()),
                url,
            });
        }
        Ok(Self { client, url })
    }

    /// POSTs one batch as `{"products": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the request fails after retries or the
    /// reply is not a JSON object.
    pub async fn ingest(
        &self,
        products: &[NormalizedProduct],
    ) -> Result<IngestResponse, ScraperError> {
        let response: IngestResponse = self
            .client
            .post_json(&self.url, &IngestRequest { products }, "ingest response")
            .await?;
        tracing::info!(
            sent = products.len(),
            count = response.count,
            new = response.new,
            updated = response.updated,
            unchanged = response.unchanged,
            "batch ingested"
        );
        Ok(response)
    }

    /// Sends `products` in consecutive batches of `batch_size`.
    ///
    /// A failed batch is counted in `failed` and the remaining batches are
    /// still sent.
    pub async fn ingest_batches(
        &self,
        products: &[NormalizedProduct],
        batch_size: usize,
    ) -> SinkReport {
        let mut report = SinkReport::default();
        if products.is_empty() {
            tracing::warn!("no products to ingest");
            return report;
        }

        let batch_size = batch_size.max(1);
        let batches = products.len().div_ceil(batch_size);
        for (idx, batch) in products.chunks(batch_size).enumerate() {
            tracing::info!(batch = idx + 1, batches, size = batch.len(), "sending batch");
            match self.ingest(batch).await {
                Ok(response) => report.merge(SinkReport {
                    count: response.count,
                    new: response.new,
                    updated: response.updated,
                    unchanged: response.unchanged,
                    failed: 0,
                }),
                Err(e) => {
                    tracing::error!(
                        batch = idx + 1,
                        size = batch.len(),
                        error = %e,
                        "batch failed"
                    );
                    report.failed += batch.len();
                }
            }
        }

        tracing::info!(
            new = report.new,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            "ingest complete"
        );
        report
    }
}
