//! Per-market category mapper: stored decision, else inference, else queue.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use cestadb_core::{Market, RetailerCategory};
use chrono::Utc;

use crate::error::{MappingError, StoreError};
use crate::mapping::{
    CategoryMapping, MappingFile, MappingStats, MappingStatus, MAPPING_FILE_VERSION,
};
use crate::similarity::{
    infer, CategoryProfile, Inference, KeywordScorer, SimilarityScorer, SourceText,
};
use crate::store::{JsonFileStore, MappingStore};
use crate::taxonomy::Taxonomy;

/// Inferences at or above this confidence are accepted without review.
pub const AUTO_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Maps one market's retailer categories onto the canonical taxonomy.
///
/// Holds the market's whole mapping set in memory, in first-seen order,
/// and writes it back through the store only when it changed.
pub struct CategoryMapper<S = JsonFileStore, K = KeywordScorer> {
    market: String,
    taxonomy: Arc<Taxonomy>,
    profiles: Vec<CategoryProfile>,
    scorer: K,
    store: S,
    records: Vec<CategoryMapping>,
    index: HashMap<String, usize>,
    dirty: bool,
}

impl CategoryMapper {
    /// Open the mapper for `market`, backed by `{mappings_dir}/{market}.json`.
    #[must_use]
    pub fn open(market: Market, taxonomy: Arc<Taxonomy>, mappings_dir: &Path) -> Self {
        let store = JsonFileStore::for_market(mappings_dir, market.as_str());
        Self::with_parts(market.as_str(), taxonomy, store, KeywordScorer)
    }
}

impl<S: MappingStore, K: SimilarityScorer> CategoryMapper<S, K> {
    /// Build a mapper from explicit parts and load the stored mapping set.
    ///
    /// A missing or unreadable snapshot starts the mapper empty: mappings
    /// can always be regenerated by inference.
    pub fn with_parts(
        market: impl Into<String>,
        taxonomy: Arc<Taxonomy>,
        store: S,
        scorer: K,
    ) -> Self {
        let market = market.into();
        let profiles = taxonomy
            .all()
            .iter()
            .map(CategoryProfile::from_category)
            .collect();

        let mut mapper = Self {
            market,
            taxonomy,
            profiles,
            scorer,
            store,
            records: Vec::new(),
            index: HashMap::new(),
            dirty: false,
        };

        match mapper.store.load() {
            Ok(Some(file)) => {
                for record in file.mappings {
                    mapper.insert_loaded(record);
                }
                tracing::info!(
                    market = %mapper.market,
                    count = mapper.records.len(),
                    "mappings loaded"
                );
            }
            Ok(None) => {
                tracing::warn!(
                    market = %mapper.market,
                    location = %mapper.store.location(),
                    "mappings file not found; starting empty"
                );
            }
            Err(e) => {
                tracing::error!(
                    market = %mapper.market,
                    error = %e,
                    "failed to load mappings; starting empty"
                );
            }
        }

        mapper
    }

    fn insert_loaded(&mut self, mut record: CategoryMapping) {
        if record.status.has_master() && record.master_id.is_none() {
            tracing::warn!(
                source_id = %record.source_id,
                status = %record.status,
                "stored mapping has no master category; demoting to pending"
            );
            record.status = MappingStatus::Pending;
        } else if !record.status.has_master() && record.master_id.is_some() {
            tracing::warn!(
                source_id = %record.source_id,
                status = %record.status,
                "stored mapping carries a master category its status does not allow; dropping it"
            );
            record.master_id = None;
        }
        self.upsert(record);
    }

    /// Replace the record with the same `source_id`, keeping its position.
    fn upsert(&mut self, record: CategoryMapping) {
        if let Some(&idx) = self.index.get(&record.source_id) {
            self.records[idx] = record;
        } else {
            self.index.insert(record.source_id.clone(), self.records.len());
            self.records.push(record);
        }
    }

    fn record_mut(&mut self, source_id: &str) -> Option<&mut CategoryMapping> {
        self.index.get(source_id).map(|&idx| &mut self.records[idx])
    }

    #[must_use]
    pub fn market(&self) -> &str {
        &self.market
    }

    #[must_use]
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Resolve the canonical category id for a retailer category.
    ///
    /// Stored `confirmed`/`auto` mappings return their id and `rejected`
    /// returns `None`, all without scoring. Otherwise, with `auto_map`,
    /// the category is inferred, the record replaced, and the id returned
    /// only when the confidence reaches [`AUTO_CONFIDENCE_THRESHOLD`].
    pub fn get_master_category(
        &mut self,
        category: &RetailerCategory,
        auto_map: bool,
    ) -> Option<String> {
        if let Some(existing) = self.get(&category.id) {
            match existing.status {
                MappingStatus::Confirmed | MappingStatus::Auto => {
                    return existing.master_id.clone();
                }
                MappingStatus::Rejected => return None,
                MappingStatus::Pending => {}
            }
        }

        if !auto_map {
            return None;
        }

        self.infer_and_record(category)
    }

    fn infer_and_record(&mut self, category: &RetailerCategory) -> Option<String> {
        let inference = self.infer(category);
        let mut record = CategoryMapping::pending(&category.id, category.source_path());
        record.confidence = Some(inference.confidence);
        record.suggestions = inference.suggestions;

        let accepted = inference
            .master_id
            .filter(|_| inference.confidence >= AUTO_CONFIDENCE_THRESHOLD);

        if let Some(master_id) = &accepted {
            record.status = MappingStatus::Auto;
            record.master_id = Some(master_id.clone());
            tracing::info!(
                market = %self.market,
                source_id = %category.id,
                source_path = %record.source_path,
                master_id = %master_id,
                confidence = inference.confidence,
                "category auto-mapped"
            );
        } else {
            tracing::debug!(
                market = %self.market,
                source_id = %category.id,
                source_path = %record.source_path,
                confidence = inference.confidence,
                "category left pending"
            );
        }

        self.upsert(record);
        self.dirty = true;
        accepted
    }

    /// Score a retailer category against the taxonomy without recording anything.
    #[must_use]
    pub fn infer(&self, category: &RetailerCategory) -> Inference {
        let source = SourceText::new(&format!("{} {}", category.parent_name, category.name));
        infer(&self.scorer, &source, &self.profiles)
    }

    /// Record a manual decision for an already-seen retailer category.
    ///
    /// `confirmed` and `auto` need a `master_id` that exists in the
    /// taxonomy. `pending` and `rejected` clear it. Stamps `reviewed_at`
    /// and replaces `notes`.
    ///
    /// # Errors
    ///
    /// Returns `MappingError` if the source was never seen, the master id
    /// does not exist, or the status needs a master id and none was given.
    /// The record is left unmodified.
    pub fn set_mapping(
        &mut self,
        source_id: &str,
        master_id: Option<&str>,
        status: MappingStatus,
        notes: Option<String>,
    ) -> Result<(), MappingError> {
        if !self.index.contains_key(source_id) {
            tracing::warn!(market = %self.market, source_id, "retailer category not found");
            return Err(MappingError::UnknownSource(source_id.to_string()));
        }

        if let Some(id) = master_id {
            if self.taxonomy.get(id).is_none() {
                tracing::warn!(
                    market = %self.market,
                    source_id,
                    master_id = id,
                    "master category not found"
                );
                return Err(MappingError::UnknownMaster(id.to_string()));
            }
        }

        if status.has_master() && master_id.is_none() {
            return Err(MappingError::MissingMaster {
                status: status.to_string(),
            });
        }

        let market = self.market.clone();
        let Some(record) = self.record_mut(source_id) else {
            return Err(MappingError::UnknownSource(source_id.to_string()));
        };
        record.status = status;
        record.master_id = if status.has_master() {
            master_id.map(str::to_string)
        } else {
            None
        };
        record.reviewed_at = Some(Utc::now());
        record.notes = notes;

        tracing::info!(
            market = %market,
            source_id,
            source_path = %record.source_path,
            master_id = record.master_id.as_deref().unwrap_or("-"),
            status = %status,
            "mapping set"
        );

        self.dirty = true;
        Ok(())
    }

    /// Confirm `source_id` as mapping to `master_id`.
    ///
    /// # Errors
    ///
    /// See [`CategoryMapper::set_mapping`].
    pub fn confirm(
        &mut self,
        source_id: &str,
        master_id: &str,
        notes: Option<String>,
    ) -> Result<(), MappingError> {
        self.set_mapping(source_id, Some(master_id), MappingStatus::Confirmed, notes)
    }

    /// Reject any mapping for `source_id`; it will resolve to `None` from now on.
    ///
    /// # Errors
    ///
    /// See [`CategoryMapper::set_mapping`].
    pub fn reject(&mut self, source_id: &str, notes: Option<String>) -> Result<(), MappingError> {
        self.set_mapping(source_id, None, MappingStatus::Rejected, notes)
    }

    #[must_use]
    pub fn get(&self, source_id: &str) -> Option<&CategoryMapping> {
        self.index.get(source_id).map(|&idx| &self.records[idx])
    }

    /// All records in first-seen order.
    #[must_use]
    pub fn mappings(&self) -> &[CategoryMapping] {
        &self.records
    }

    #[must_use]
    pub fn get_pending(&self) -> Vec<&CategoryMapping> {
        self.records
            .iter()
            .filter(|r| r.status == MappingStatus::Pending)
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> MappingStats {
        let mut stats = MappingStats::default();
        for record in &self.records {
            stats.record(record.status);
        }
        stats
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the whole mapping set if it changed since the last save.
    ///
    /// Returns `Ok(false)` when there was nothing to write.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store rejects the snapshot; the mapper
    /// stays dirty so the save can be retried.
    pub fn save(&mut self) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }

        let file = MappingFile {
            market: self.market.clone(),
            version: MAPPING_FILE_VERSION.to_string(),
            updated_at: Some(Utc::now()),
            mappings: self.records.clone(),
        };
        self.store.save(&file)?;
        self.dirty = false;

        tracing::info!(
            market = %self.market,
            count = self.records.len(),
            location = %self.store.location(),
            "mappings saved"
        );
        Ok(true)
    }
}

#[cfg(test)]
#[path = "mapper_test.rs"]
mod tests;
