//! DIA online shop (`www.dia.es`).

use cestadb_core::{Market, RawProduct, RetailerCategory};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::client::HttpClient;
use crate::error::ScraperError;
use crate::lenient::{opt_f64_lenient, opt_string_or_number};
use crate::source::CatalogSource;

pub const DEFAULT_BASE_URL: &str = "https://www.dia.es";

/// Menu entries named like this aggregate their siblings.
const AGGREGATOR_PREFIX: &str = "Todo ";
const UNNAMED_PARENT: &str = "Sin nombre";

#[derive(Debug, Deserialize)]
struct MenuData {
    #[serde(default)]
    categories: Vec<MenuCategory>,
}

#[derive(Debug, Deserialize)]
struct MenuCategory {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    children: Vec<MenuChild>,
}

#[derive(Debug, Deserialize)]
struct MenuChild {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductListing {
    #[serde(default)]
    plp_items: Vec<DiaProduct>,
}

#[derive(Debug, Deserialize)]
struct DiaProduct {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    product_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    sku: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    prices: Option<DiaPrices>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DiaPrices {
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    price_per_unit: Option<f64>,
    #[serde(default)]
    measure_unit: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Stable id for listings that carry no retailer id: the first 16 hex
/// characters of the SHA-256 of the display name.
fn fallback_id(display_name: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(display_name.as_bytes()));
    digest[..16].to_owned()
}

impl DiaProduct {
    fn raw_id(&self) -> Option<String> {
        self.id
            .clone()
            .or_else(|| self.product_id.clone())
            .or_else(|| self.sku.clone())
            .or_else(|| {
                self.display_name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .map(fallback_id)
            })
    }

    fn into_raw(self) -> Option<RawProduct> {
        let raw_id = self.raw_id()?;
        let prices = self.prices.unwrap_or_default();
        Some(RawProduct {
            raw_id,
            name: self.display_name,
            price: prices.price,
            price_per_unit: prices.price_per_unit,
            unit: prices.measure_unit,
            brand: self.brand,
            url: non_blank(self.url).or(non_blank(self.link)),
            image_url: non_blank(self.image).or(non_blank(self.image_url)),
        })
    }
}

fn parse_categories(menu: MenuData) -> Vec<RetailerCategory> {
    let mut categories = Vec::new();
    for parent in menu.categories {
        let parent_name = non_blank(parent.name).unwrap_or_else(|| UNNAMED_PARENT.to_owned());
        for child in parent.children {
            let (Some(id), Some(name), Some(link)) =
                (child.id, non_blank(child.name), non_blank(child.link))
            else {
                continue;
            };
            if name.starts_with(AGGREGATOR_PREFIX) {
                tracing::debug!(market = "dia", name = %name, "skipping aggregator category");
                continue;
            }
            categories.push(RetailerCategory {
                id,
                name,
                parent_name: parent_name.clone(),
                link,
            });
        }
    }
    categories
}

fn parse_products(listing: ProductListing) -> Vec<RawProduct> {
    listing
        .plp_items
        .into_iter()
        .filter_map(DiaProduct::into_raw)
        .collect()
}

pub struct DiaSource {
    client: HttpClient,
    base_url: String,
    categories: OnceCell<Vec<RetailerCategory>>,
}

impl DiaSource {
    #[must_use]
    pub fn new(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            categories: OnceCell::new(),
        }
    }

    async fn load_categories(&self) -> Result<Vec<RetailerCategory>, ScraperError> {
        let url = format!("{}/api/v1/common-aggregator/menu-data", self.base_url);
        let menu: MenuData = self.client.get_json(&url, &[], "dia menu data").await?;
        let categories = parse_categories(menu);
        tracing::info!(market = "dia", count = categories.len(), "categories fetched");
        Ok(categories)
    }
}

impl CatalogSource for DiaSource {
    fn market(&self) -> Market {
        Market::Dia
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
        // `link` is an absolute path such as `/charcuteria-y-quesos/jamon-cocido/c/L2001`.
        let url = format!("{}/api/v1/plp-back/reduced{}", self.base_url, category.link);
        let listing: ProductListing = self
            .client
            .get_json(&url, &[], &format!("dia listing {}", category.link))
            .await?;
        let products = parse_products(listing);
        tracing::debug!(
            market = "dia",
            category = %category,
            count = products.len(),
            "category products fetched"
        );
        Ok(products)
    }
}
