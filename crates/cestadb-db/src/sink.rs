use cestadb_core::{Market, NormalizedProduct, RetailerCategory, SinkReport};
use sqlx::PgPool;

use crate::categories::upsert_category;
use crate::products::{upsert_product, UpsertOutcome};
use crate::DbError;

/// Stores one category and the products scraped from it in a single
/// transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing from this
/// category is kept in that case.
pub async fn store_category_products(
    pool: &PgPool,
    market: Market,
    category: &RetailerCategory,
    master_id: Option<&str>,
    products: &[NormalizedProduct],
) -> Result<SinkReport, DbError> {
    let mut tx = pool.begin().await?;
    let category_id = upsert_category(&mut *tx, market, category, master_id).await?;

    let mut report = SinkReport::default();
    for product in products {
        match upsert_product(&mut tx, category_id, product).await? {
            UpsertOutcome::New => report.new += 1,
            UpsertOutcome::Updated => report.updated += 1,
            UpsertOutcome::Unchanged => report.unchanged += 1,
        }
        report.count += 1;
    }

    tx.commit().await?;
    tracing::debug!(
        market = %market,
        category = %category,
        new = report.new,
        updated = report.updated,
        unchanged = report.unchanged,
        "category stored"
    );
    Ok(report)
}
