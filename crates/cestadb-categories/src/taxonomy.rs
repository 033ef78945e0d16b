//! Canonical category tree.
//!
//! Built once from `config/master_taxonomy.json` and read-only afterwards;
//! share it between mappers behind an `Arc`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::TaxonomyError;

/// A node of the canonical taxonomy.
///
/// `children` holds child ids in definition order; resolve them through
/// [`Taxonomy::children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCategory {
    pub id: String,
    pub name: String,
    pub keywords: Vec<String>,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
}

impl CanonicalCategory {
    /// Depth in the tree, derived from the dotted id (`"1"` is 0, `"1.2"` is 1).
    #[must_use]
    pub fn level(&self) -> usize {
        self.id.matches('.').count()
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CategoryDefinition {
    id: String,
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    children: Vec<CategoryDefinition>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyDefinition {
    #[serde(default)]
    categories: Vec<CategoryDefinition>,
}

/// The canonical taxonomy, flattened depth-first in definition order.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    nodes: Vec<CanonicalCategory>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
}

const SEARCH_EXACT_NAME: f64 = 1.0;
const SEARCH_EXACT_KEYWORD: f64 = 0.9;
const SEARCH_NAME_CONTAINS: f64 = 0.8;
const SEARCH_KEYWORD_OVERLAP: f64 = 0.6;

impl Taxonomy {
    /// Load the taxonomy from a JSON definition file.
    ///
    /// # Errors
    ///
    /// Returns `TaxonomyError` if the file cannot be read or parsed, or if
    /// any category id is empty or duplicated.
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let content = std::fs::read_to_string(path).map_err(|e| TaxonomyError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let taxonomy = Self::parse(&content, &path.display().to_string())?;
        tracing::info!(
            path = %path.display(),
            categories = taxonomy.len(),
            "taxonomy loaded"
        );
        Ok(taxonomy)
    }

    /// Build a taxonomy from an in-memory JSON definition.
    ///
    /// # Errors
    ///
    /// Same as [`Taxonomy::load`], minus the I/O failure.
    pub fn from_json(json: &str) -> Result<Self, TaxonomyError> {
        Self::parse(json, "<inline>")
    }

    fn parse(json: &str, origin: &str) -> Result<Self, TaxonomyError> {
        let definition: TaxonomyDefinition =
            serde_json::from_str(json).map_err(|e| TaxonomyError::Parse {
                path: origin.to_string(),
                source: e,
            })?;

        let mut taxonomy = Taxonomy::default();
        for root in definition.categories {
            let idx = taxonomy.register(root, None)?;
            taxonomy.roots.push(idx);
        }
        Ok(taxonomy)
    }

    fn register(
        &mut self,
        definition: CategoryDefinition,
        parent_id: Option<&str>,
    ) -> Result<usize, TaxonomyError> {
        let id = definition.id.trim().to_string();
        if id.is_empty() {
            return Err(TaxonomyError::EmptyId {
                name: definition.name,
            });
        }
        if self.index.contains_key(&id) {
            return Err(TaxonomyError::DuplicateId(id));
        }

        let idx = self.nodes.len();
        self.nodes.push(CanonicalCategory {
            id: id.clone(),
            name: definition.name,
            keywords: definition.keywords,
            parent_id: parent_id.map(str::to_string),
            children: Vec::with_capacity(definition.children.len()),
        });
        self.index.insert(id.clone(), idx);

        for child in definition.children {
            let child_idx = self.register(child, Some(&id))?;
            let child_id = self.nodes[child_idx].id.clone();
            self.nodes[idx].children.push(child_id);
        }

        Ok(idx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CanonicalCategory> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Every category, depth-first in definition order.
    #[must_use]
    pub fn all(&self) -> &[CanonicalCategory] {
        &self.nodes
    }

    #[must_use]
    pub fn roots(&self) -> Vec<&CanonicalCategory> {
        self.roots.iter().map(|&idx| &self.nodes[idx]).collect()
    }

    #[must_use]
    pub fn leaves(&self) -> Vec<&CanonicalCategory> {
        self.nodes.iter().filter(|c| c.is_leaf()).collect()
    }

    #[must_use]
    pub fn children(&self, id: &str) -> Vec<&CanonicalCategory> {
        self.get(id)
            .map(|c| c.children.iter().filter_map(|child| self.get(child)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parent(&self, id: &str) -> Option<&CanonicalCategory> {
        self.get(id)
            .and_then(|c| c.parent_id.as_deref())
            .and_then(|parent_id| self.get(parent_id))
    }

    /// Display names from the root down to `id`, joined with `" > "`.
    ///
    /// Returns an empty string for an unknown id.
    #[must_use]
    pub fn path(&self, id: &str) -> String {
        let mut parts = Vec::new();
        let mut current = self.get(id);
        while let Some(category) = current {
            parts.push(category.name.as_str());
            current = category
                .parent_id
                .as_deref()
                .and_then(|parent_id| self.get(parent_id));
        }
        parts.reverse();
        parts.join(" > ")
    }

    /// Rank categories against a free-text query.
    ///
    /// Matching is case-insensitive but otherwise literal. Ties keep
    /// taxonomy order. A blank query matches nothing.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&CanonicalCategory> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(&CanonicalCategory, f64)> = self
            .nodes
            .iter()
            .map(|c| (c, search_score(&query, c)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(limit).map(|(c, _)| c).collect()
    }
}

fn search_score(query: &str, category: &CanonicalCategory) -> f64 {
    let name = category.name.to_lowercase();
    if query == name {
        return SEARCH_EXACT_NAME;
    }

    let mut score: f64 = 0.0;
    if name.contains(query) {
        score = score.max(SEARCH_NAME_CONTAINS);
    }

    let keywords = std::iter::once(name.clone())
        .chain(category.keywords.iter().map(|k| k.to_lowercase()))
        .filter(|k| !k.is_empty());
    for keyword in keywords {
        if query == keyword {
            score = score.max(SEARCH_EXACT_KEYWORD);
        } else if keyword.contains(query) || query.contains(keyword.as_str()) {
            score = score.max(SEARCH_KEYWORD_OVERLAP);
        }
    }

    score
}

#[cfg(test)]
#[path = "taxonomy_test.rs"]
mod tests;
