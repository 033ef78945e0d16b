pub mod app_config;
pub mod catalog;
pub mod config;
pub mod markets;
pub mod products;

pub use app_config::{AppConfig, Environment};
pub use catalog::{Market, RawProduct, RetailerCategory};
pub use config::{load_app_config, load_app_config_from_env};
pub use markets::{load_markets, MarketConfig, MarketsFile};
pub use products::{NormalizedProduct, SinkReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read markets file {path}: {source}")]
    MarketsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse markets file: {0}")]
    MarketsFileParse(#[from] serde_yaml::Error),

    #[error("markets validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown market: {0}")]
    UnknownMarket(String),
}
