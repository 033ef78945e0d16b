//! Category mapping for cestadb.
//!
//! Maps each retailer's free-text category labels onto the canonical
//! taxonomy in `config/master_taxonomy.json`. Mappings are inferred by
//! keyword similarity, auto-accepted above a confidence threshold, and
//! otherwise queued as `pending` for manual review. One mapping file is
//! kept per market.

pub mod error;
pub mod mapper;
pub mod mapping;
pub mod normalize;
pub mod similarity;
pub mod store;
pub mod taxonomy;

pub use error::{MappingError, StoreError, TaxonomyError};
pub use mapper::{CategoryMapper, AUTO_CONFIDENCE_THRESHOLD};
pub use mapping::{CategoryMapping, MappingFile, MappingStats, MappingStatus};
pub use normalize::normalize;
pub use similarity::{CategoryProfile, Inference, KeywordScorer, SimilarityScorer, SourceText};
pub use store::{JsonFileStore, MappingStore};
pub use taxonomy::{CanonicalCategory, Taxonomy};
