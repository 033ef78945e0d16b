//! Last-mile cleanup applied to normalized products before they reach a sink.

use cestadb_core::NormalizedProduct;

/// Cleans `product` for delivery, or drops it.
///
/// Products without an id or name are dropped. Blank `brand`/`unit`
/// become `None`, non-finite prices are cleared, and relative `url` /
/// `image_url` values are resolved against `base_url`.
#[must_use]
pub fn validate_product(
    mut product: NormalizedProduct,
    base_url: &str,
) -> Option<NormalizedProduct> {
    if product.id.trim().is_empty() {
        tracing::warn!(name = %product.name, "product discarded: missing id");
        return None;
    }
    if product.name.trim().is_empty() {
        tracing::warn!(id = %product.id, "product discarded: missing name");
        return None;
    }

    product.price = product.price.filter(|p| p.is_finite());
    product.price_per_unit = product.price_per_unit.filter(|p| p.is_finite());
    product.brand = clean_string(product.brand);
    product.unit = clean_string(product.unit);
    product.url = absolute_url(&product.url, base_url);
    product.image_url = absolute_url(&product.image_url, base_url);

    Some(product)
}

/// Validates every product, logging how many were discarded.
#[must_use]
pub fn validate_products(
    products: Vec<NormalizedProduct>,
    base_url: &str,
) -> Vec<NormalizedProduct> {
    let total = products.len();
    let valid: Vec<NormalizedProduct> = products
        .into_iter()
        .filter_map(|p| validate_product(p, base_url))
        .collect();

    let discarded = total - valid.len();
    if discarded > 0 {
        tracing::info!(discarded, kept = valid.len(), "products discarded by validation");
    }
    valid
}

fn clean_string(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn absolute_url(url: &str, base_url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        return url.to_owned();
    }
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{rest}");
    }

    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        return url.to_owned();
    }
    if url.starts_with('/') {
        format!("{base}{url}")
    } else {
        format!("{base}/{url}")
    }
}
