use std::future::Future;

use cestadb_core::{Market, RawProduct, RetailerCategory};

use crate::error::ScraperError;

/// A retailer catalog that can list its categories and the products in each.
///
/// Implementations decode their own payloads and hand back only the common
/// shapes from `cestadb-core`.
pub trait CatalogSource {
    fn market(&self) -> Market;

    /// All scrapeable categories, fetched once per source and then served
    /// from memory.
    fn fetch_categories(
        &self,
    ) -> impl Future<Output = Result<Vec<RetailerCategory>, ScraperError>> + Send;

    /// Every product listed under `category`.
    ///
    /// Either the whole listing is returned or an error; a failure on any
    /// page fails the category.
    fn fetch_category_products(
        &self,
        category: &RetailerCategory,
    ) -> impl Future<Output = Result<Vec<RawProduct>, ScraperError>> + Send;
}
