//! Mercadona online shop (`tienda.mercadona.es`).
//!
//! The category tree is two levels deep and every child category's detail
//! endpoint lists all of its products in one response.

use cestadb_core::{Market, RawProduct, RetailerCategory};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::client::HttpClient;
use crate::error::ScraperError;
use crate::lenient::{opt_f64_lenient, opt_string_or_number};
use crate::source::CatalogSource;

pub const DEFAULT_BASE_URL: &str = "https://tienda.mercadona.es";

const QUERY: &str = "lang=es&wh=alc1";
const UNNAMED_PARENT: &str = "Sin nombre";

#[derive(Debug, Deserialize)]
struct CategoryTree {
    #[serde(default)]
    results: Vec<TopCategory>,
}

#[derive(Debug, Deserialize)]
struct TopCategory {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    categories: Vec<ChildCategory>,
}

#[derive(Debug, Deserialize)]
struct ChildCategory {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    published: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CategoryDetail {
    #[serde(default)]
    categories: Vec<ProductSection>,
}

#[derive(Debug, Deserialize)]
struct ProductSection {
    #[serde(default)]
    products: Vec<MercadonaProduct>,
}

#[derive(Debug, Deserialize)]
struct MercadonaProduct {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    price_instructions: Option<PriceInstructions>,
    #[serde(default)]
    share_url: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PriceInstructions {
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    bulk_price: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    unit_price: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    reference_price: Option<f64>,
    #[serde(default)]
    reference_format: Option<String>,
    #[serde(default)]
    size_format: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn parse_categories(tree: CategoryTree) -> Vec<RetailerCategory> {
    let mut categories = Vec::new();
    for parent in tree.results {
        let parent_name = non_blank(parent.name).unwrap_or_else(|| UNNAMED_PARENT.to_owned());
        for child in parent.categories {
            if child.published == Some(false) {
                continue;
            }
            let (Some(id), Some(name)) = (child.id, non_blank(child.name)) else {
                continue;
            };
            categories.push(RetailerCategory {
                link: id.clone(),
                id,
                name,
                parent_name: parent_name.clone(),
            });
        }
    }
    categories
}

fn parse_products(detail: CategoryDetail) -> Vec<RawProduct> {
    detail
        .categories
        .into_iter()
        .flat_map(|section| section.products)
        .filter_map(|item| {
            let raw_id = item.id?;
            let prices = item.price_instructions.unwrap_or_default();
            Some(RawProduct {
                raw_id,
                name: item.display_name,
                price: prices.bulk_price,
                price_per_unit: prices.unit_price.or(prices.reference_price),
                unit: non_blank(prices.reference_format).or(non_blank(prices.size_format)),
                brand: None,
                url: item.share_url,
                image_url: item.thumbnail,
            })
        })
        .collect()
}

pub struct MercadonaSource {
    client: HttpClient,
    base_url: String,
    categories: OnceCell<Vec<RetailerCategory>>,
}

impl MercadonaSource {
    /// `base_url` is the shop origin, e.g. [`DEFAULT_BASE_URL`].
    #[must_use]
    pub fn new(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            categories: OnceCell::new(),
        }
    }

    async fn load_categories(&self) -> Result<Vec<RetailerCategory>, ScraperError> {
        let url = format!("{}/api/categories/?{QUERY}", self.base_url);
        let tree: CategoryTree = self
            .client
            .get_json(&url, &[], "mercadona category tree")
            .await?;
        let categories = parse_categories(tree);
        tracing::info!(market = "mercadona", count = categories.len(), "categories fetched");
        Ok(categories)
    }
}

impl CatalogSource for MercadonaSource {
    fn market(&self) -> Market {
        Market::Mercadona
    }

    async fn fetch_categories(&self) -> Result<Vec<RetailerCategory>, ScraperError> {
        self.categories
            .get_or_try_init(|| self.load_categories())
            .await
            .cloned()
    }

    async fn fetch_category_products(
        &self,
        category: &RetailerCategory,
    ) -> Result<Vec<RawProduct>, ScraperError> {
        let url = format!("{}/api/categories/{}/?{QUERY}", self.base_url, category.link);
        let detail: CategoryDetail = self
            .client
            .get_json(&url, &[], &format!("mercadona category {}", category.id))
            .await?;
        let products = parse_products(detail);
        tracing::debug!(
            market = "mercadona",
            category = %category,
            count = products.len(),
            "category products fetched"
        );
        Ok(products)
    }
}
