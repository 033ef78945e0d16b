//! Conversion from a source's [`RawProduct`] to the common
//! [`NormalizedProduct`] contract.
//!
//! Category resolution is delegated to the market's [`CategoryMapper`];
//! this module only shapes fields.

use cestadb_categories::{CategoryMapper, MappingStore, SimilarityScorer};
use cestadb_core::{Market, NormalizedProduct, RawProduct, RetailerCategory};

/// Normalizes one raw listing scraped from `category`.
///
/// Returns `None` when the listing has no usable name. Otherwise the
/// category is resolved through `mapper` with inference enabled, so a
/// first sighting of `category` may create a mapping record.
pub fn normalize_product<S, K>(
    raw: RawProduct,
    category: &RetailerCategory,
    market: Market,
    mapper: &mut CategoryMapper<S, K>,
) -> Option<NormalizedProduct>
where
    S: MappingStore,
    K: SimilarityScorer,
{
    let name = raw
        .name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty())?;

    let master_category_id = mapper.get_master_category(category, true);

    Some(NormalizedProduct {
        id: format!("{market}_{}", raw.raw_id),
        name,
        supermarket: market.as_str().to_owned(),
        category: category.source_path(),
        master_category_id,
        price: raw.price,
        price_per_unit: raw.price_per_unit,
        unit: raw.unit,
        brand: raw.brand,
        url: raw.url.unwrap_or_default(),
        image_url: raw.image_url.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cestadb_categories::{MappingStatus, Taxonomy};

    use super::*;

    const TAXONOMY: &str = r#"{
        "categories": [
            {"id": "1", "name": "Alimentación", "children": [
                {"id": "1.1", "name": "Leche", "keywords": ["leche entera", "leche"]}
            ]}
        ]
    }"#;

    fn mapper(dir: &std::path::Path) -> CategoryMapper {
        let taxonomy = Arc::new(Taxonomy::from_json(TAXONOMY).unwrap());
        CategoryMapper::open(Market::Mercadona, taxonomy, dir)
    }

    fn milk_category() -> RetailerCategory {
        RetailerCategory {
            id: "72".to_string(),
            name: "Leche y bebidas vegetales".to_string(),
            parent_name: "Lácteos".to_string(),
            link: "72".to_string(),
        }
    }

    fn raw(name: Option<&str>) -> RawProduct {
        RawProduct {
            raw_id: "4241".to_string(),
            name: name.map(str::to_string),
            price: Some(0.89),
            price_per_unit: Some(0.89),
            unit: Some("L".to_string()),
            brand: None,
            url: Some("https://tienda.mercadona.es/product/4241".to_string()),
            image_url: None,
        }
    }

    #[test]
    fn builds_namespaced_product_with_master_category() {
        let dir = tempfile::tempdir().unwrap();
        let mut mapper = mapper(dir.path());

        let product = normalize_product(
            raw(Some("Leche semidesnatada Hacendado")),
            &milk_category(),
            Market::Mercadona,
            &mut mapper,
        )
        .unwrap();

        assert_eq!(product.id, "mercadona_4241");
        assert_eq!(product.supermarket, "mercadona");
        assert_eq!(product.category, "Lácteos > Leche y bebidas vegetales");
        assert_eq!(product.master_category_id.as_deref(), Some("1.1"));
        assert_eq!(product.image_url, "");
        assert_eq!(mapper.get("72").map(|m| m.status), Some(MappingStatus::Auto));
    }

    #[test]
    fn missing_or_blank_name_is_dropped_without_touching_mapper() {
        let dir = tempfile::tempdir().unwrap();
        let mut mapper = mapper(dir.path());

        for name in [None, Some(""), Some("   ")] {
            assert!(
                normalize_product(raw(name), &milk_category(), Market::Mercadona, &mut mapper)
                    .is_none()
            );
        }
        assert!(mapper.mappings().is_empty());
        assert!(!mapper.is_dirty());
    }

    #[test]
    fn rejected_category_yields_no_master() {
        let dir = tempfile::tempdir().unwrap();
        let mut mapper = mapper(dir.path());
        let category = milk_category();
        mapper.get_master_category(&category, true);
        mapper.reject("72", None).unwrap();

        let product =
            normalize_product(raw(Some("Leche")), &category, Market::Dia, &mut mapper).unwrap();
        assert_eq!(product.id, "dia_4241");
        assert!(product.master_category_id.is_none());
    }
}
