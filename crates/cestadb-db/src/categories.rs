//! Database operations for retailer `categories`.

use cestadb_core::{Market, RetailerCategory};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub market: String,
    pub external_id: String,
    pub name: String,
    pub link: String,
    pub parent_category: Option<String>,
    pub master_category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts a retailer category.
///
/// Conflicts on `(market, external_id)` update `name`, `link` and
/// `parent_category`. An existing `master_category_id` is kept when
/// `master_id` is `None`.
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_category<'e, E>(
    executor: E,
    market: Market,
    category: &RetailerCategory,
    master_id: Option<&str>,
) -> Result<i64, DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO categories \
             (market, external_id, name, link, parent_category, master_category_id) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (market, external_id) DO UPDATE SET \
             name               = EXCLUDED.name, \
             link               = EXCLUDED.link, \
             parent_category    = EXCLUDED.parent_category, \
             master_category_id = COALESCE(EXCLUDED.master_category_id, \
                                           categories.master_category_id), \
             updated_at         = NOW() \
         RETURNING id",
    )
    .bind(market.as_str())
    .bind(&category.id)
    .bind(&category.name)
    .bind(&category.link)
    .bind(&category.parent_name)
    .bind(master_id)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Fetches one category by market and retailer id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such category exists, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_category(
    pool: &PgPool,
    market: Market,
    external_id: &str,
) -> Result<CategoryRow, DbError> {
    sqlx::query_as::<_, CategoryRow>(
        "SELECT id, market, external_id, name, link, parent_category, master_category_id, \
                created_at, updated_at \
         FROM categories \
         WHERE market = $1 AND external_id = $2",
    )
    .bind(market.as_str())
    .bind(external_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
