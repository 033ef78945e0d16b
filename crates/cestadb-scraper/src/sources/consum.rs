//! Consum online shop (`tienda.consum.es`).
//!
//! The category menu is an arbitrarily deep tree; only its leaves are
//! scraped. Product listings are paginated and the API only answers
//! requests that carry the shop-front `X-TOL-*` headers.

use cestadb_core::{Market, RawProduct, RetailerCategory};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::client::HttpClient;
use crate::error::ScraperError;
use crate::lenient::{opt_f64_lenient, opt_string_or_number};
use crate::source::CatalogSource;

pub const DEFAULT_BASE_URL: &str = "https://tienda.consum.es";

/// Hard stop for `hasMore` pagination.
pub const MAX_PAGES: usize = 200;

const ROOT_LABEL: &str = "Consum";
const OFFER_PRICE_ID: &str = "OFFER_PRICE";
const PRODUCT_QUERY: &str =
    "offset=0&orderById=5&showProducts=true&originProduct=undefined&showRecommendations=false";

const SHOP_FRONT_HEADERS: [(&str, &str); 6] = [
    ("X-TOL-LOCALE", "es"),
    ("X-TOL-ZONE", "0"),
    ("X-TOL-CHANNEL", "1"),
    ("X-TOL-CURRENCY", "EUR"),
    ("X-TOL-SHIPPING-ZONE", "0D"),
    ("X-TOL-APP", "shop-front"),
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MenuPayload {
    Wrapped { result: Vec<MenuNode> },
    Nodes(Vec<MenuNode>),
}

#[derive(Debug, Deserialize)]
struct MenuNode {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nombre: Option<String>,
    #[serde(default)]
    subcategories: Option<Vec<MenuNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PagePayload {
    Wrapped { result: ProductPage },
    Page(ProductPage),
}

impl PagePayload {
    fn into_page(self) -> ProductPage {
        match self {
            PagePayload::Wrapped { result } | PagePayload::Page(result) => result,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProductPage {
    #[serde(default)]
    products: Option<Vec<ConsumProduct>>,
    #[serde(default, rename = "hasMore")]
    has_more: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsumProduct {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    product_data: Option<ProductData>,
    #[serde(default)]
    price_data: Option<PriceData>,
    #[serde(default)]
    media: Option<Vec<Media>>,
}

#[derive(Debug, Default, Deserialize)]
struct ProductData {
    #[serde(default)]
    name: Option<String>,
    /// Either `{"name": "..."}` or a bare string.
    #[serde(default)]
    brand: Option<Value>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "imageURL")]
    image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceData {
    #[serde(default)]
    prices: Option<Vec<PriceEntry>>,
    #[serde(default)]
    unit_price_unit_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    value: Option<PriceValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceValue {
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    cent_amount: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64_lenient")]
    cent_unit_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// `centAmount` values are sometimes cents and sometimes euros: integral
/// values of 100 or more are taken as cents.
fn euros(value: f64) -> f64 {
    if value >= 100.0 && value.fract().abs() < f64::EPSILON {
        round_cents(value / 100.0)
    } else {
        value
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn brand_name(brand: Option<Value>) -> Option<String> {
    match brand? {
        Value::Object(mut map) => match map.remove("name") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn collect_leaves(nodes: Vec<MenuNode>, parent_name: &str, out: &mut Vec<RetailerCategory>) {
    for node in nodes {
        let name = non_blank(node.name).or(non_blank(node.nombre));
        let (Some(id), Some(name)) = (node.id, name) else {
            continue;
        };
        match node.subcategories {
            Some(children) if !children.is_empty() => collect_leaves(children, &name, out),
            _ => out.push(RetailerCategory {
                link: id.clone(),
                id,
                name,
                parent_name: parent_name.to_owned(),
            }),
        }
    }
}

fn parse_categories(menu: MenuPayload) -> Vec<RetailerCategory> {
    let nodes = match menu {
        MenuPayload::Wrapped { result } | MenuPayload::Nodes(result) => result,
    };
    let mut categories = Vec::new();
    collect_leaves(nodes, ROOT_LABEL, &mut categories);
    categories
}

impl ConsumProduct {
    fn into_raw(self) -> Option<RawProduct> {
        let raw_id = self.id?;
        let data = self.product_data.unwrap_or_default();
        let price_data = self.price_data.unwrap_or_default();

        let mut prices = price_data.prices.unwrap_or_default();
        let entry = match prices.iter().position(|p| p.id.as_deref() == Some(OFFER_PRICE_ID)) {
            Some(idx) => Some(prices.swap_remove(idx)),
            None if prices.is_empty() => None,
            None => Some(prices.swap_remove(0)),
        };
        let value = entry.and_then(|e| e.value).unwrap_or_default();

        let image_url = non_blank(data.image_url).or_else(|| {
            self.media
                .and_then(|media| media.into_iter().next())
                .and_then(|m| non_blank(m.url))
        });

        Some(RawProduct {
            raw_id,
            name: data.name,
            price: value.cent_amount.map(euros),
            price_per_unit: value.cent_unit_amount.map(euros),
            unit: price_data.unit_price_unit_type,
            brand: brand_name(data.brand),
            url: data.url,
            image_url,
        })
    }
}

pub struct ConsumSource {
    client: HttpClient,
    base_url: String,
    categories: OnceCell<Vec<RetailerCategory>>,
}

impl ConsumSource {
    #[must_use]
    pub fn new(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            categories: OnceCell::new(),
        }
    }

    async fn load_categories(&self) -> Result<Vec<RetailerCategory>, ScraperError> {
        let url = format!("{}/api/rest/V1.0/shopping/category/menu", self.base_url);
        let menu: MenuPayload = self
            .client
            .get_json(&url, &SHOP_FRONT_HEADERS, "consum category menu")
            .await?;
        let categories = parse_categories(menu);
        tracing::info!(market = "consum", count = categories.len(), "leaf categories fetched");
        Ok(categories)
    }

    fn page_url(&self, category_id: &str, page: usize) -> String {
        format!(
            "{}/api/rest/V1.0/catalog/product?page={page}&{PRODUCT_QUERY}&categories={category_id}",
            self.base_url
        )
    }
}

impl CatalogSource for ConsumSource {
    fn market(&self) -> Market {
        Market::Consum
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
        let mut products = Vec::new();
        let context = format!("consum category {}", category.id);

        for page in 1..=MAX_PAGES {
            if page > 1 {
                self.client.pause().await;
            }
            let url = self.page_url(&category.link, page);
            let payload: PagePayload = self
                .client
                .get_json(&url, &SHOP_FRONT_HEADERS, &context)
                .await?;
            let listing = payload.into_page();

            products.extend(
                listing
                    .products
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(ConsumProduct::into_raw),
            );

            if !listing.has_more.unwrap_or(false) {
                tracing::debug!(
                    market = "consum",
                    category = %category,
                    pages = page,
                    count = products.len(),
                    "category products fetched"
                );
                return Ok(products);
            }
        }

        Err(ScraperError::PaginationLimit {
            category: category.id.clone(),
            max_pages: MAX_PAGES,
        })
    }
}
