//! Product delivery for a finished scrape.

use cestadb_core::{AppConfig, Market, NormalizedProduct, SinkReport};
use cestadb_scraper::{HttpClient, IngestClient};

use super::CategoryBatch;

/// Send every product to the remote ingest endpoint in configured batches.
///
/// # Errors
///
/// Returns an error if `CESTADB_INGEST_URL` is unset or invalid. Failed
/// batches are counted in the report, not propagated.
pub(super) async fn deliver_ingest(
    config: &AppConfig,
    client: HttpClient,
    batches: &[CategoryBatch],
) -> anyhow::Result<SinkReport> {
    let url = config
        .ingest_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("CESTADB_INGEST_URL is required for --sink ingest"))?;
    let ingest = IngestClient::new(client, url)?;

    let products: Vec<NormalizedProduct> = batches
        .iter()
        .flat_map(|b| b.products.iter().cloned())
        .collect();
    Ok(ingest
        .ingest_batches(&products, config.ingest_batch_size)
        .await)
}

/// Store each category and its products in Postgres, one transaction per
/// category. A failed category counts its products as failed.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset or the pool cannot connect.
pub(super) async fn deliver_db(
    config: &AppConfig,
    market: Market,
    batches: &[CategoryBatch],
) -> anyhow::Result<SinkReport> {
    let pool = cestadb_db::connect_pool_from_config(config).await?;
    let mut report = SinkReport::default();

    for batch in batches {
        match cestadb_db::store_category_products(
            &pool,
            market,
            &batch.category,
            batch.master_id.as_deref(),
            &batch.products,
        )
        .await
        {
            Ok(stored) => report.merge(stored),
            Err(e) => {
                tracing::error!(
                    market = %market,
                    source_id = %batch.category.id,
                    error = %e,
                    "failed to store category"
                );
                report.failed += batch.products.len();
            }
        }
    }

    pool.close().await;
    tracing::info!(
        market = %market,
        new = report.new,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        "database sink complete"
    );
    Ok(report)
}
