use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Market;
use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub name: String,
    /// API origin, e.g. `https://tienda.mercadona.es`.
    pub base_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub notes: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl MarketConfig {
    /// The parsed market this entry configures.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if `name` is not a supported market.
    pub fn market(&self) -> Result<Market, ConfigError> {
        self.name
            .parse::<Market>()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// `base_url` without a trailing slash.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketsFile {
    pub markets: Vec<MarketConfig>,
}

impl MarketsFile {
    #[must_use]
    pub fn get(&self, market: Market) -> Option<&MarketConfig> {
        self.markets
            .iter()
            .find(|m| m.name.trim().eq_ignore_ascii_case(market.as_str()))
    }
}

/// Load and validate the markets configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_markets(path: &Path) -> Result<MarketsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::MarketsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let markets_file: MarketsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::MarketsFileParse)?;

    validate_markets(&markets_file)?;

    Ok(markets_file)
}

fn validate_markets(markets_file: &MarketsFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in &markets_file.markets {
        let market = entry.market()?;

        if !seen.insert(market) {
            return Err(ConfigError::Validation(format!(
                "duplicate market: '{}'",
                entry.name
            )));
        }

        if !(entry.base_url.starts_with("http://") || entry.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "market '{}' has invalid base_url '{}'; must start with http:// or https://",
                entry.name, entry.base_url
            )));
        }
    }

    Ok(())
}
