//! Postgres persistence for scraped catalogs: the master taxonomy, retailer
//! categories, products, and their price history.

pub mod categories;
pub mod error;
pub mod pool;
pub mod products;
pub mod seed;
pub mod sink;

pub use categories::{get_category, upsert_category, CategoryRow};
pub use error::DbError;
pub use pool::{connect_pool, connect_pool_from_config, ping, run_migrations, PoolConfig};
pub use products::{
    list_price_history, price_to_decimal, upsert_product, PriceHistoryRow, ProductRow,
    UpsertOutcome,
};
pub use seed::{master_category_rows, seed_master_categories, MasterCategoryRow};
pub use sink::store_category_products;
