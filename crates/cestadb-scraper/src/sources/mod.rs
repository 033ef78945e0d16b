//! Per-retailer catalog sources.

pub mod consum;
pub mod dia;
pub mod mercadona;

use cestadb_core::{Market, RawProduct, RetailerCategory};

pub use consum::ConsumSource;
pub use dia::DiaSource;
pub use mercadona::MercadonaSource;

use crate::client::HttpClient;
use crate::error::ScraperError;
use crate::source::CatalogSource;

/// Public shop origin for `market`, used when no markets file overrides it.
#[must_use]
pub fn default_base_url(market: Market) -> &'static str {
    match market {
        Market::Mercadona => mercadona::DEFAULT_BASE_URL,
        Market::Dia => dia::DEFAULT_BASE_URL,
        Market::Consum => consum::DEFAULT_BASE_URL,
    }
}

/// Any of the supported sources, chosen at runtime by market.
pub enum MarketSource {
    Mercadona(MercadonaSource),
    Dia(DiaSource),
    Consum(ConsumSource),
}

impl MarketSource {
    #[must_use]
    pub fn new(market: Market, client: HttpClient, base_url: &str) -> Self {
        match market {
            Market::Mercadona => Self::Mercadona(MercadonaSource::new(client, base_url)),
            Market::Dia => Self::Dia(DiaSource::new(client, base_url)),
            Market::Consum => Self::Consum(ConsumSource::new(client, base_url)),
        }
    }
}

impl CatalogSource for MarketSource {
    fn market(&self) -> Market {
        match self {
            Self::Mercadona(s) => s.market(),
            Self::Dia(s) => s.market(),
            Self::Consum(s) => s.market(),
        }
    }

    async fn fetch_categories(&self) -> Result<Vec<RetailerCategory>, ScraperError> {
        match self {
            Self::Mercadona(s) => s.fetch_categories().await,
            Self::Dia(s) => s.fetch_categories().await,
            Self::Consum(s) => s.fetch_categories().await,
        }
    }

    async fn fetch_category_products(
        &self,
        category: &RetailerCategory,
    ) -> Result<Vec<RawProduct>, ScraperError> {
        match self {
            Self::Mercadona(s) => s.fetch_category_products(category).await,
            Self::Dia(s) => s.fetch_category_products(category).await,
            Self::Consum(s) => s.fetch_category_products(category).await,
        }
    }
}
