pub mod client;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod source;
pub mod sources;
pub mod validate;

mod lenient;
mod rate_limit;

pub use client::HttpClient;
pub use error::ScraperError;
pub use ingest::{IngestClient, IngestResponse};
pub use normalize::normalize_product;
pub use source::CatalogSource;
pub use sources::{ConsumSource, DiaSource, MercadonaSource};
pub use validate::{validate_product, validate_products};
