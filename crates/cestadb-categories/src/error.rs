use thiserror::Error;

/// Failure to build the canonical taxonomy. Fatal for any run that needs
/// categorization.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("failed to read taxonomy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse taxonomy {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate taxonomy category id: '{0}'")]
    DuplicateId(String),

    #[error("taxonomy category '{name}' has an empty id")]
    EmptyId { name: String },
}

/// Rejected manual mapping change. The record is left unmodified.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("retailer category not found: {0}")]
    UnknownSource(String),

    #[error("master category not found: {0}")]
    UnknownMaster(String),

    #[error("status '{status}' requires a master category")]
    MissingMaster { status: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access mappings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mappings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize mappings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to replace mappings file {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: tempfile::PersistError,
    },
}
