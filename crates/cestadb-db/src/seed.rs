use cestadb_categories::Taxonomy;
use sqlx::PgPool;

use crate::DbError;

/// A `master_categories` row derived from one taxonomy node.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MasterCategoryRow {
    pub code: String,
    pub name: String,
    pub parent_code: Option<String>,
    pub level: i16,
}

/// Flatten `taxonomy` into rows, parents before children.
#[must_use]
pub fn master_category_rows(taxonomy: &Taxonomy) -> Vec<MasterCategoryRow> {
    taxonomy
        .all()
        .iter()
        .map(|category| MasterCategoryRow {
            code: category.id.clone(),
            name: category.name.clone(),
            parent_code: category.parent_id.clone(),
            level: i16::try_from(category.level()).unwrap_or(i16::MAX),
        })
        .collect()
}

/// Upsert every taxonomy node into `master_categories` by `code`.
///
/// Returns the number of rows processed. All upserts run inside a single
/// transaction; if any fails the whole seed is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_master_categories(
    pool: &PgPool,
    taxonomy: &Taxonomy,
) -> Result<usize, DbError> {
    let rows = master_category_rows(taxonomy);
    let mut tx = pool.begin().await?;

    for row in &rows {
        sqlx::query(
            "INSERT INTO master_categories (code, name, parent_code, level) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (code) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 parent_code = EXCLUDED.parent_code, \
                 level = EXCLUDED.level, \
                 updated_at = NOW()",
        )
        .bind(&row.code)
        .bind(&row.name)
        .bind(&row.parent_code)
        .bind(row.level)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(count = rows.len(), "master categories seeded");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_keep_parent_order_and_dot_levels() {
        let taxonomy = Taxonomy::from_json(
            r#"{"categories": [
                {"id": "7", "name": "Despensa", "children": [
                    {"id": "7.2", "name": "Arroz y legumbres", "children": [
                        {"id": "7.2.1", "name": "Arroz"}
                    ]}
                ]},
                {"id": "8", "name": "Desayuno y dulces"}
            ]}"#,
        )
        .unwrap();

        let rows = master_category_rows(&taxonomy);
        let summary: Vec<(&str, Option<&str>, i16)> = rows
            .iter()
            .map(|r| (r.code.as_str(), r.parent_code.as_deref(), r.level))
            .collect();
        assert_eq!(
            summary,
            [
                ("7", None, 0),
                ("7.2", Some("7"), 1),
                ("7.2.1", Some("7.2"), 2),
                ("8", None, 0),
            ]
        );
    }
}
