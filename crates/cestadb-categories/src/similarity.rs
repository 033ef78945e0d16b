//! Scoring retailer category text against canonical categories.

use std::collections::HashSet;

use crate::normalize::normalize;
use crate::taxonomy::CanonicalCategory;

/// Score floor a category must exceed to be offered as a suggestion.
pub const SUGGESTION_THRESHOLD: f64 = 0.3;
pub const MAX_SUGGESTIONS: usize = 5;

const NAME_MATCH_SCORE: f64 = 0.8;
const KEYWORD_MATCH_SCORE: f64 = 0.7;
/// Keywords this short are too ambiguous for substring matching.
const MIN_SUBSTRING_KEYWORD_LEN: usize = 3;

/// Normalized retailer text and its word set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub text: String,
    pub words: HashSet<String>,
}

impl SourceText {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let text = normalize(raw);
        let words = text
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, words }
    }
}

/// Precomputed comparison profile of one canonical category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryProfile {
    pub id: String,
    /// Normalized display name.
    pub name: String,
    /// Normalized name plus every normalized keyword.
    pub keywords: HashSet<String>,
}

impl CategoryProfile {
    #[must_use]
    pub fn from_category(category: &CanonicalCategory) -> Self {
        let name = normalize(&category.name);
        let keywords = std::iter::once(name.clone())
            .chain(category.keywords.iter().map(|k| normalize(k)))
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            id: category.id.clone(),
            name,
            keywords,
        }
    }
}

/// A similarity measure in `[0, 1]` between retailer text and a category.
pub trait SimilarityScorer {
    fn score(&self, source: &SourceText, profile: &CategoryProfile) -> f64;
}

/// Word-overlap score raised by name and keyword containment.
///
/// 1. `|common words| / max(|source words|, |keywords|)`
/// 2. at least 0.8 if the category name is a substring of the text
/// 3. at least 0.7 if any keyword longer than 3 chars is a substring
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

impl SimilarityScorer for KeywordScorer {
    fn score(&self, source: &SourceText, profile: &CategoryProfile) -> f64 {
        let mut score: f64 = 0.0;

        let denominator = source.words.len().max(profile.keywords.len());
        if denominator > 0 {
            let common = source.words.intersection(&profile.keywords).count();
            #[allow(clippy::cast_precision_loss)]
            let overlap = common as f64 / denominator as f64;
            score = overlap;
        }

        if !profile.name.is_empty() && source.text.contains(profile.name.as_str()) {
            score = score.max(NAME_MATCH_SCORE);
        }

        if profile
            .keywords
            .iter()
            .any(|k| k.len() > MIN_SUBSTRING_KEYWORD_LEN && source.text.contains(k.as_str()))
        {
            score = score.max(KEYWORD_MATCH_SCORE);
        }

        score
    }
}

/// Outcome of scoring one retailer category against the whole taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    /// Highest-scoring category; `None` when nothing scored above zero.
    pub master_id: Option<String>,
    pub confidence: f64,
    /// Up to [`MAX_SUGGESTIONS`] ids scoring above
    /// [`SUGGESTION_THRESHOLD`], best first.
    pub suggestions: Vec<String>,
}

/// Score `source` against every profile.
///
/// The best match is the first profile reaching the highest score, so
/// ties resolve in taxonomy order. Suggestions are sorted stably.
pub fn infer<K>(scorer: &K, source: &SourceText, profiles: &[CategoryProfile]) -> Inference
where
    K: SimilarityScorer + ?Sized,
{
    let mut best: Option<&CategoryProfile> = None;
    let mut best_score = 0.0;
    let mut candidates: Vec<(&str, f64)> = Vec::new();

    for profile in profiles {
        let score = scorer.score(source, profile);
        if score > SUGGESTION_THRESHOLD {
            candidates.push((profile.id.as_str(), score));
        }
        if score > best_score {
            best_score = score;
            best = Some(profile);
        }
    }

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    let suggestions = candidates
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(id, _)| id.to_string())
        .collect();

    match best {
        Some(profile) => Inference {
            master_id: Some(profile.id.clone()),
            confidence: best_score,
            suggestions,
        },
        None => Inference {
            master_id: None,
            confidence: 0.0,
            suggestions,
        },
    }
}
