//! Retailer-facing catalog shapes shared by every catalog source.
//!
//! Each source decodes its own API payloads into typed structs and converts
//! them into these common shapes immediately, so nothing downstream of a
//! source ever sees a retailer-specific field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A supermarket whose catalog can be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Mercadona,
    Dia,
    Consum,
}

impl Market {
    pub const ALL: [Market; 3] = [Market::Mercadona, Market::Dia, Market::Consum];

    /// Namespace used for mapping files, product ids, and database rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Market::Mercadona => "mercadona",
            Market::Dia => "dia",
            Market::Consum => "consum",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mercadona" => Ok(Market::Mercadona),
            "dia" => Ok(Market::Dia),
            "consum" => Ok(Market::Consum),
            other => Err(CoreError::UnknownMarket(other.to_string())),
        }
    }
}

/// A category as exposed by one retailer's own API.
///
/// Re-derived from the live category listing on every run; only its
/// mapping onto the canonical taxonomy is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailerCategory {
    /// Retailer-assigned identifier, unique within one market.
    pub id: String,
    pub name: String,
    /// Display label of the retailer's own parent grouping.
    pub parent_name: String,
    /// Retailer-specific locator used to fetch this category's products
    /// (a path for DIA, the category id for Mercadona and Consum).
    pub link: String,
}

impl RetailerCategory {
    /// Human-readable `"{parent_name} > {name}"` label.
    #[must_use]
    pub fn source_path(&self) -> String {
        format!("{} > {}", self.parent_name, self.name)
    }
}

impl fmt::Display for RetailerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.parent_name, self.name)
    }
}

/// A product listing converted from a retailer payload, before
/// normalization.
///
/// Every field except `raw_id` is optional because retailers omit or null
/// them freely; normalization decides which absences are fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    pub raw_id: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub price_per_unit: Option<f64>,
    pub unit: Option<String>,
    pub brand: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_parses_case_insensitively() {
        assert_eq!("Mercadona".parse::<Market>().unwrap(), Market::Mercadona);
        assert_eq!(" dia ".parse::<Market>().unwrap(), Market::Dia);
        assert_eq!("CONSUM".parse::<Market>().unwrap(), Market::Consum);
    }

    #[test]
    fn market_rejects_unknown_name() {
        let err = "carrefour".parse::<Market>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownMarket(ref m) if m == "carrefour"));
    }

    #[test]
    fn market_display_matches_as_str() {
        for market in Market::ALL {
            assert_eq!(market.to_string(), market.as_str());
        }
    }

    #[test]
    fn market_serializes_lowercase() {
        let json = serde_json::to_string(&Market::Dia).unwrap();
        assert_eq!(json, "\"dia\"");
    }

    #[test]
    fn retailer_category_source_path_joins_parent_and_name() {
        let category = RetailerCategory {
            id: "112".to_string(),
            name: "Leche y bebidas vegetales".to_string(),
            parent_name: "Lácteos".to_string(),
            link: "112".to_string(),
        };
        assert_eq!(category.source_path(), "Lácteos > Leche y bebidas vegetales");
        assert_eq!(category.to_string(), category.source_path());
    }
}
