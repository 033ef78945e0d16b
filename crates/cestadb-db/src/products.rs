//! Database operations for `products` and `price_history`.

use cestadb_core::NormalizedProduct;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub market: String,
    /// The namespaced product id (`"{market}_{retailer id}"`).
    pub external_id: String,
    pub category_id: Option<i64>,
    pub display_name: String,
    pub brand: Option<String>,
    pub current_price: Option<Decimal>,
    pub current_price_per_unit: Option<Decimal>,
    pub measure_unit: Option<String>,
    pub url: String,
    pub image_url: String,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A row from the `price_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub product_id: i64,
    pub price: Option<Decimal>,
    pub price_per_unit: Option<Decimal>,
    pub recorded_at: DateTime<Utc>,
}

/// What [`upsert_product`] did with a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    New,
    Updated,
    Unchanged,
}

/// The mutable columns of a product, as compared between runs.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
struct ProductValues {
    category_id: Option<i64>,
    display_name: String,
    brand: Option<String>,
    current_price: Option<Decimal>,
    current_price_per_unit: Option<Decimal>,
    measure_unit: Option<String>,
    url: String,
    image_url: String,
}

impl ProductValues {
    fn from_product(category_id: i64, product: &NormalizedProduct) -> Self {
        Self {
            category_id: Some(category_id),
            display_name: product.name.clone(),
            brand: product.brand.clone(),
            current_price: price_to_decimal(product.price),
            current_price_per_unit: price_to_decimal(product.price_per_unit),
            measure_unit: product.unit.clone(),
            url: product.url.clone(),
            image_url: product.image_url.clone(),
        }
    }

    fn price_differs(&self, other: &Self) -> bool {
        self.current_price != other.current_price
            || self.current_price_per_unit != other.current_price_per_unit
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoredProduct {
    id: i64,
    #[sqlx(flatten)]
    values: ProductValues,
}

/// Decides the outcome of writing `incoming` over `stored`, and whether the
/// write must append a price history row.
fn classify(stored: &ProductValues, incoming: &ProductValues) -> (UpsertOutcome, bool) {
    if stored == incoming {
        (UpsertOutcome::Unchanged, false)
    } else {
        (UpsertOutcome::Updated, stored.price_differs(incoming))
    }
}

/// Converts a scraped euro amount to `NUMERIC(10,2)`.
///
/// Non-finite values become `None`; halves round away from zero.
#[must_use]
pub fn price_to_decimal(value: Option<f64>) -> Option<Decimal> {
    value
        .filter(|v| v.is_finite())
        .and_then(Decimal::from_f64)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

// ---------------------------------------------------------------------------
// products operations
// ---------------------------------------------------------------------------

/// Inserts or updates a product under `category_id`.
///
/// Products are keyed by `(supermarket, id)`. New rows and rows whose price
/// changed get a `price_history` entry; `last_updated` is refreshed on
/// every call. Run it inside a transaction to keep the product and its
/// history consistent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn upsert_product(
    conn: &mut PgConnection,
    category_id: i64,
    product: &NormalizedProduct,
) -> Result<UpsertOutcome, DbError> {
    let incoming = ProductValues::from_product(category_id, product);

    let inserted: Option<i64> = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products \
             (market, external_id, category_id, display_name, brand, current_price, \
              current_price_per_unit, measure_unit, url, image_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (market, external_id) DO NOTHING \
         RETURNING id",
    )
    .bind(&product.supermarket)
    .bind(&product.id)
    .bind(incoming.category_id)
    .bind(&incoming.display_name)
    .bind(&incoming.brand)
    .bind(incoming.current_price)
    .bind(incoming.current_price_per_unit)
    .bind(&incoming.measure_unit)
    .bind(&incoming.url)
    .bind(&incoming.image_url)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        if incoming.current_price.is_some() || incoming.current_price_per_unit.is_some() {
            record_price(conn, id, &incoming).await?;
        }
        return Ok(UpsertOutcome::New);
    }

    let stored = sqlx::query_as::<_, StoredProduct>(
        "SELECT id, category_id, display_name, brand, current_price, \
                current_price_per_unit, measure_unit, url, image_url \
         FROM products \
         WHERE market = $1 AND external_id = $2 \
         FOR UPDATE",
    )
    .bind(&product.supermarket)
    .bind(&product.id)
    .fetch_one(&mut *conn)
    .await?;

    let (outcome, price_changed) = classify(&stored.values, &incoming);

    sqlx::query(
        "UPDATE products SET \
             category_id            = $2, \
             display_name           = $3, \
             brand                  = $4, \
             current_price          = $5, \
             current_price_per_unit = $6, \
             measure_unit           = $7, \
             url                    = $8, \
             image_url              = $9, \
             last_updated           = NOW() \
         WHERE id = $1",
    )
    .bind(stored.id)
    .bind(incoming.category_id)
    .bind(&incoming.display_name)
    .bind(&incoming.brand)
    .bind(incoming.current_price)
    .bind(incoming.current_price_per_unit)
    .bind(&incoming.measure_unit)
    .bind(&incoming.url)
    .bind(&incoming.image_url)
    .execute(&mut *conn)
    .await?;

    if price_changed {
        record_price(conn, stored.id, &incoming).await?;
    }

    Ok(outcome)
}

async fn record_price(
    conn: &mut PgConnection,
    product_id: i64,
    values: &ProductValues,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO price_history (product_id, price, price_per_unit) \
         VALUES ($1, $2, $3)",
    )
    .bind(product_id)
    .bind(values.current_price)
    .bind(values.current_price_per_unit)
    .execute(conn)
    .await?;
    Ok(())
}

/// Price history of one product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_price_history(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<PriceHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, PriceHistoryRow>(
        "SELECT id, product_id, price, price_per_unit, recorded_at \
         FROM price_history \
         WHERE product_id = $1 \
         ORDER BY recorded_at DESC, id DESC",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
