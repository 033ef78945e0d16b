use serde::{Deserialize, Serialize};

/// A product normalized to the common contract shared by every market,
/// ready for validation and delivery to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    /// `"{market}_{retailer product id}"`, unique across all markets.
    pub id: String,
    pub name: String,
    /// Market namespace, e.g. `"mercadona"`.
    pub supermarket: String,
    /// Retailer category label as `"{parent} > {name}"`.
    pub category: String,
    /// Canonical taxonomy id assigned by the category mapper, if resolved.
    pub master_category_id: Option<String>,
    /// Shelf price in euros.
    pub price: Option<f64>,
    /// Reference price per `unit` (e.g. per kg or per litre).
    pub price_per_unit: Option<f64>,
    pub unit: Option<String>,
    pub brand: Option<String>,
    /// Product page URL; empty when the retailer provides none.
    pub url: String,
    pub image_url: String,
}

impl NormalizedProduct {
    /// Returns `true` when the minimum fields required by every sink are set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && !self.supermarket.is_empty()
    }
}

/// Delivery counts reported by a sink after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReport {
    /// Products the sink acknowledged.
    pub count: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Products that could not be delivered.
    pub failed: usize,
}

impl SinkReport {
    /// Adds another report's counts into this one.
    pub fn merge(&mut self, other: SinkReport) {
        self.count += other.count;
        self.new += other.new;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
    }
}
