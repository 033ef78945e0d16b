use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::*;

const FIXTURE: &str = r#"{
  "categories": [
    {
      "id": "1",
      "name": "Alimentación",
      "children": [
        { "id": "1.1", "name": "Leche", "keywords": ["lacteos", "lactosa"] },
        { "id": "1.2", "name": "Quesos", "keywords": ["queso curado"] }
      ]
    },
    { "id": "2", "name": "Bebidas", "keywords": ["refrescos"] },
    { "id": "9", "name": "Especias", "keywords": ["sal", "ajo"] }
  ]
}"#;

fn taxonomy() -> Arc<Taxonomy> {
    Arc::new(Taxonomy::from_json(FIXTURE).expect("fixture taxonomy should parse"))
}

fn category(id: &str, parent_name: &str, name: &str) -> RetailerCategory {
    RetailerCategory {
        id: id.to_string(),
        name: name.to_string(),
        parent_name: parent_name.to_string(),
        link: id.to_string(),
    }
}

fn leche() -> RetailerCategory {
    category("112", "Lácteos", "Leche y derivados lácteos")
}

/// In-memory store whose handles share state with the mapper's copy.
#[derive(Clone, Default)]
struct MemoryStore {
    snapshot: Rc<RefCell<Option<MappingFile>>>,
    fail_saves: Rc<Cell<bool>>,
    saves: Rc<Cell<usize>>,
}

impl MappingStore for MemoryStore {
    fn load(&self) -> Result<Option<MappingFile>, StoreError> {
        Ok(self.snapshot.borrow().clone())
    }

    fn save(&self, file: &MappingFile) -> Result<(), StoreError> {
        if self.fail_saves.get() {
            return Err(StoreError::Io {
                path: "memory".to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.saves.set(self.saves.get() + 1);
        *self.snapshot.borrow_mut() = Some(file.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Keyword scorer that counts how often it is consulted.
#[derive(Clone, Default)]
struct CountingScorer {
    calls: Rc<Cell<usize>>,
}

impl SimilarityScorer for CountingScorer {
    fn score(&self, source: &SourceText, profile: &CategoryProfile) -> f64 {
        self.calls.set(self.calls.get() + 1);
        KeywordScorer.score(source, profile)
    }
}

/// Scores every category identically.
struct FixedScorer(f64);

impl SimilarityScorer for FixedScorer {
    fn score(&self, _source: &SourceText, _profile: &CategoryProfile) -> f64 {
        self.0
    }
}

fn mapper() -> CategoryMapper<MemoryStore, KeywordScorer> {
    CategoryMapper::with_parts("mercadona", taxonomy(), MemoryStore::default(), KeywordScorer)
}

fn counting_mapper() -> (CategoryMapper<MemoryStore, CountingScorer>, Rc<Cell<usize>>) {
    let scorer = CountingScorer::default();
    let calls = Rc::clone(&scorer.calls);
    let mapper = CategoryMapper::with_parts("mercadona", taxonomy(), MemoryStore::default(), scorer);
    (mapper, calls)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn leche_scenario_is_auto_mapped() {
    let mut mapper = mapper();
    assert_eq!(mapper.get_master_category(&leche(), true).as_deref(), Some("1.1"));

    let record = mapper.get("112").expect("record should be created");
    assert_eq!(record.status, MappingStatus::Auto);
    assert_eq!(record.master_id.as_deref(), Some("1.1"));
    assert_eq!(record.source_path, "Lácteos > Leche y derivados lácteos");
    assert!(record.confidence.is_some_and(|c| c >= AUTO_CONFIDENCE_THRESHOLD));
    assert_eq!(record.suggestions.first().map(String::as_str), Some("1.1"));
    assert!(mapper.is_dirty());
}

#[test]
fn score_of_exactly_the_threshold_is_auto_mapped() {
    let mut mapper = mapper();
    let refrescos = category("20", "Zona", "Refrescoszero");

    assert_eq!(mapper.get_master_category(&refrescos, true).as_deref(), Some("2"));
    let record = mapper.get("20").unwrap();
    assert_eq!(record.status, MappingStatus::Auto);
    assert!(record.confidence.is_some_and(|c| approx(c, 0.7)));
}

#[test]
fn score_just_below_the_threshold_stays_pending() {
    let mut mapper =
        CategoryMapper::with_parts("dia", taxonomy(), MemoryStore::default(), FixedScorer(0.6999));

    assert_eq!(mapper.get_master_category(&leche(), true), None);
    let record = mapper.get("112").unwrap();
    assert_eq!(record.status, MappingStatus::Pending);
    assert_eq!(record.master_id, None);
    assert!(record.confidence.is_some_and(|c| approx(c, 0.6999)));
    // Every category scores above the suggestion floor; ties keep taxonomy order.
    assert_eq!(record.suggestions, ["1", "1.1", "1.2", "2", "9"]);
}

#[test]
fn fixed_scorer_at_threshold_auto_maps_first_category() {
    let mut mapper =
        CategoryMapper::with_parts("dia", taxonomy(), MemoryStore::default(), FixedScorer(0.7));
    assert_eq!(mapper.get_master_category(&leche(), true).as_deref(), Some("1"));
}

#[test]
fn partial_word_overlap_is_suggested_but_pending() {
    let mut mapper = mapper();
    let especias = category("31", "Sal", "Ajo Mix");

    assert_eq!(mapper.get_master_category(&especias, true), None);
    let record = mapper.get("31").unwrap();
    assert_eq!(record.status, MappingStatus::Pending);
    assert!(record.confidence.is_some_and(|c| approx(c, 2.0 / 3.0)));
    assert_eq!(record.suggestions, ["9"]);
}

#[test]
fn unmatched_category_is_pending_without_suggestions() {
    let mut mapper = mapper();
    let raras = category("99", "Varios", "Cosas Raras");

    assert_eq!(mapper.get_master_category(&raras, true), None);
    let record = mapper.get("99").unwrap();
    assert_eq!(record.status, MappingStatus::Pending);
    assert_eq!(record.master_id, None);
    assert_eq!(record.confidence, Some(0.0));
    assert!(record.suggestions.is_empty());
}

#[test]
fn confirmed_mapping_is_never_re_inferred() {
    let (mut mapper, calls) = counting_mapper();
    let raras = category("99", "Varios", "Cosas Raras");
    mapper.get_master_category(&raras, true);
    mapper.confirm("99", "1.2", None).unwrap();
    let calls_after_confirm = calls.get();

    for _ in 0..3 {
        assert_eq!(mapper.get_master_category(&raras, true).as_deref(), Some("1.2"));
    }

    assert_eq!(calls.get(), calls_after_confirm);
    let record = mapper.get("99").unwrap();
    assert_eq!(record.status, MappingStatus::Confirmed);
    assert_eq!(record.master_id.as_deref(), Some("1.2"));
}

#[test]
fn rejected_mapping_is_never_re_inferred() {
    let (mut mapper, calls) = counting_mapper();
    mapper.get_master_category(&leche(), true);
    mapper.reject("112", Some("leche vegetal, no láctea".to_string())).unwrap();
    let calls_after_reject = calls.get();

    for _ in 0..3 {
        assert_eq!(mapper.get_master_category(&leche(), true), None);
    }

    assert_eq!(calls.get(), calls_after_reject);
    let record = mapper.get("112").unwrap();
    assert_eq!(record.status, MappingStatus::Rejected);
    assert_eq!(record.master_id, None);
}

#[test]
fn rejection_wins_over_a_high_scoring_inference() {
    let mut mapper = mapper();
    assert_eq!(mapper.get_master_category(&leche(), true).as_deref(), Some("1.1"));

    mapper.set_mapping("112", Some("1.1"), MappingStatus::Rejected, None).unwrap();

    assert_eq!(mapper.get_master_category(&leche(), true), None);
    assert_eq!(mapper.get("112").unwrap().master_id, None);
}

#[test]
fn auto_mapping_returns_stored_id_without_scoring() {
    let (mut mapper, calls) = counting_mapper();
    mapper.get_master_category(&leche(), true);
    let calls_after_first = calls.get();
    assert!(calls_after_first > 0);

    assert_eq!(mapper.get_master_category(&leche(), true).as_deref(), Some("1.1"));
    assert_eq!(calls.get(), calls_after_first);
}

#[test]
fn pending_mapping_is_re_inferred_and_replaced() {
    let (mut mapper, calls) = counting_mapper();
    let raras = category("99", "Varios", "Cosas Raras");
    mapper.get_master_category(&raras, true);
    mapper
        .set_mapping("99", None, MappingStatus::Pending, Some("revisar".to_string()))
        .unwrap();
    let calls_before = calls.get();

    let renamed = category("99", "Varios", "Cosas Raras y Bebidas");
    assert_eq!(mapper.get_master_category(&renamed, true).as_deref(), Some("2"));

    assert!(calls.get() > calls_before);
    let record = mapper.get("99").unwrap();
    assert_eq!(record.status, MappingStatus::Auto);
    assert_eq!(record.source_path, "Varios > Cosas Raras y Bebidas");
    assert_eq!(record.notes, None);
    assert_eq!(record.reviewed_at, None);
    assert_eq!(mapper.mappings().len(), 1);
}

#[test]
fn auto_map_disabled_has_no_side_effects() {
    let (mut mapper, calls) = counting_mapper();
    assert_eq!(mapper.get_master_category(&leche(), false), None);
    assert_eq!(calls.get(), 0);
    assert!(mapper.get("112").is_none());
    assert!(!mapper.is_dirty());
}

#[test]
fn infer_does_not_record_anything() {
    let mapper = mapper();
    let inference = mapper.infer(&leche());
    assert_eq!(inference.master_id.as_deref(), Some("1.1"));
    assert!(mapper.mappings().is_empty());
    assert!(!mapper.is_dirty());
}

#[test]
fn set_mapping_for_unknown_source_fails_without_creating_a_record() {
    let mut mapper = mapper();
    let err = mapper
        .set_mapping("xyz", Some("1.1"), MappingStatus::Confirmed, None)
        .unwrap_err();

    assert_eq!(err, MappingError::UnknownSource("xyz".to_string()));
    assert!(mapper.get("xyz").is_none());
    assert_eq!(mapper.stats().total(), 0);
    assert!(!mapper.is_dirty());
}

#[test]
fn set_mapping_with_unknown_master_leaves_record_untouched() {
    let mut mapper = mapper();
    mapper.get_master_category(&leche(), true);
    let before = mapper.get("112").cloned();

    let err = mapper.confirm("112", "42.42", None).unwrap_err();

    assert_eq!(err, MappingError::UnknownMaster("42.42".to_string()));
    assert_eq!(mapper.get("112").cloned(), before);
}

#[test]
fn confirmed_status_requires_a_master() {
    let mut mapper = mapper();
    mapper.get_master_category(&leche(), true);

    let err = mapper
        .set_mapping("112", None, MappingStatus::Confirmed, None)
        .unwrap_err();

    assert!(matches!(err, MappingError::MissingMaster { ref status } if status == "confirmed"));
    assert_eq!(mapper.get("112").unwrap().status, MappingStatus::Auto);
}

#[test]
fn confirm_stamps_review_time_and_notes() {
    let mut mapper = mapper();
    let raras = category("99", "Varios", "Cosas Raras");
    mapper.get_master_category(&raras, true);
    let before = Utc::now();

    mapper
        .confirm("99", "9", Some("revisado por operador".to_string()))
        .unwrap();

    let record = mapper.get("99").unwrap();
    assert_eq!(record.status, MappingStatus::Confirmed);
    assert_eq!(record.master_id.as_deref(), Some("9"));
    assert_eq!(record.notes.as_deref(), Some("revisado por operador"));
    assert!(record.reviewed_at.is_some_and(|ts| ts >= before));
    // Inference metadata is kept for reference.
    assert_eq!(record.confidence, Some(0.0));
}

#[test]
fn get_pending_lists_only_pending_records() {
    let mut mapper = mapper();
    mapper.get_master_category(&leche(), true);
    mapper.get_master_category(&category("99", "Varios", "Cosas Raras"), true);
    mapper.get_master_category(&category("31", "Sal", "Ajo Mix"), true);

    let pending: Vec<&str> = mapper
        .get_pending()
        .iter()
        .map(|r| r.source_id.as_str())
        .collect();
    assert_eq!(pending, ["99", "31"]);
}

#[test]
fn stats_always_sum_to_record_count() {
    let mut mapper = mapper();
    assert_eq!(mapper.stats(), MappingStats::default());

    mapper.get_master_category(&leche(), true);
    mapper.get_master_category(&category("99", "Varios", "Cosas Raras"), true);
    mapper.get_master_category(&category("31", "Sal", "Ajo Mix"), true);
    mapper.get_master_category(&category("20", "Zona", "Refrescoszero"), true);
    mapper.confirm("31", "9", None).unwrap();
    mapper.reject("20", None).unwrap();

    let stats = mapper.stats();
    assert_eq!(
        stats,
        MappingStats {
            pending: 1,
            auto: 1,
            confirmed: 1,
            rejected: 1,
        }
    );
    assert_eq!(stats.total(), mapper.mappings().len());
}

#[test]
fn save_is_a_no_op_when_clean() {
    let store = MemoryStore::default();
    let mut mapper =
        CategoryMapper::with_parts("consum", taxonomy(), store.clone(), KeywordScorer);

    assert!(!mapper.save().unwrap());
    assert_eq!(store.saves.get(), 0);

    mapper.get_master_category(&leche(), true);
    assert!(mapper.save().unwrap());
    assert!(!mapper.save().unwrap());
    assert_eq!(store.saves.get(), 1);

    let snapshot = store.snapshot.borrow().clone().unwrap();
    assert_eq!(snapshot.market, "consum");
    assert_eq!(snapshot.version, MAPPING_FILE_VERSION);
    assert!(snapshot.updated_at.is_some());
    assert_eq!(snapshot.mappings.len(), 1);
}

#[test]
fn failed_save_keeps_the_mapper_dirty() {
    let store = MemoryStore::default();
    let mut mapper =
        CategoryMapper::with_parts("consum", taxonomy(), store.clone(), KeywordScorer);
    mapper.get_master_category(&leche(), true);

    store.fail_saves.set(true);
    assert!(mapper.save().is_err());
    assert!(mapper.is_dirty());

    store.fail_saves.set(false);
    assert!(mapper.save().unwrap());
    assert!(!mapper.is_dirty());
}

#[test]
fn loading_repairs_records_that_break_the_master_invariant() {
    let store = MemoryStore::default();
    let mut pending_with_master = CategoryMapping::pending("1", "A > B");
    pending_with_master.master_id = Some("1.1".to_string());
    let mut auto_without_master = CategoryMapping::pending("2", "C > D");
    auto_without_master.status = MappingStatus::Auto;
    *store.snapshot.borrow_mut() = Some(MappingFile {
        market: "dia".to_string(),
        version: MAPPING_FILE_VERSION.to_string(),
        updated_at: None,
        mappings: vec![pending_with_master, auto_without_master],
    });

    let mapper = CategoryMapper::with_parts("dia", taxonomy(), store, KeywordScorer);

    assert_eq!(mapper.get("1").unwrap().master_id, None);
    assert_eq!(mapper.get("2").unwrap().status, MappingStatus::Pending);
    assert!(!mapper.is_dirty());
}

#[test]
fn loading_duplicate_source_ids_keeps_the_last_in_first_position() {
    let store = MemoryStore::default();
    let first = CategoryMapping::pending("1", "Old > Path");
    let second = CategoryMapping::pending("2", "Other > Path");
    let mut replacement = CategoryMapping::pending("1", "New > Path");
    replacement.status = MappingStatus::Rejected;
    *store.snapshot.borrow_mut() = Some(MappingFile {
        market: "dia".to_string(),
        version: MAPPING_FILE_VERSION.to_string(),
        updated_at: None,
        mappings: vec![first, second, replacement],
    });

    let mapper = CategoryMapper::with_parts("dia", taxonomy(), store, KeywordScorer);

    let order: Vec<&str> = mapper.mappings().iter().map(|r| r.source_path.as_str()).collect();
    assert_eq!(order, ["New > Path", "Other > Path"]);
    assert_eq!(mapper.get("1").unwrap().status, MappingStatus::Rejected);
}

#[test]
fn file_backed_mapper_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut mapper = CategoryMapper::open(Market::Mercadona, taxonomy(), dir.path());
    mapper.get_master_category(&leche(), true);
    mapper.get_master_category(&category("99", "Varios", "Cosas Raras"), true);
    mapper.get_master_category(&category("31", "Sal", "Ajo Mix"), true);
    mapper.confirm("31", "9", Some("ok".to_string())).unwrap();
    assert!(mapper.save().unwrap());

    let reopened = CategoryMapper::open(Market::Mercadona, taxonomy(), dir.path());

    assert_eq!(reopened.mappings(), mapper.mappings());
    assert_eq!(reopened.stats(), mapper.stats());
    assert!(!reopened.is_dirty());
}

#[test]
fn record_with_unknown_status_does_not_discard_reviewed_mappings() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("mercadona.json"),
        r#"{"market": "mercadona", "version": "1.0", "mappings": [
            {"source_id": "1", "source_path": "Lácteos > Leche", "status": "confirmed", "master_id": "1.1"},
            {"source_id": "2", "source_path": "Bebidas > Zumos", "status": "Confirmed", "master_id": "2"}
        ]}"#,
    )
    .unwrap();

    let mut mapper = CategoryMapper::open(Market::Mercadona, taxonomy(), dir.path());
    assert_eq!(mapper.mappings().len(), 2);
    assert_eq!(mapper.get("2").unwrap().status, MappingStatus::Pending);

    let confirmed = category("1", "Lácteos", "Leche");
    assert_eq!(
        mapper.get_master_category(&confirmed, true).as_deref(),
        Some("1.1")
    );
    mapper.get_master_category(&category("9", "Sal", "Ajo Mix"), true);
    assert!(mapper.save().unwrap());

    let reopened = CategoryMapper::open(Market::Mercadona, taxonomy(), dir.path());
    let kept = reopened.get("1").unwrap();
    assert_eq!(kept.status, MappingStatus::Confirmed);
    assert_eq!(kept.master_id.as_deref(), Some("1.1"));
    assert!(reopened.get("2").is_some());
    assert!(reopened.get("9").is_some());
}

#[test]
fn unreadable_mapping_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dia.json"), "{ definitely not json").unwrap();

    let mut mapper = CategoryMapper::open(Market::Dia, taxonomy(), dir.path());
    assert!(mapper.mappings().is_empty());

    mapper.get_master_category(&leche(), true);
    assert!(mapper.save().unwrap());
    assert_eq!(
        CategoryMapper::open(Market::Dia, taxonomy(), dir.path())
            .mappings()
            .len(),
        1
    );
}
