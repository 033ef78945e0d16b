use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Review state of a retailer category mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    #[default]
    Pending,
    Auto,
    Confirmed,
    Rejected,
}

impl MappingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MappingStatus::Pending => "pending",
            MappingStatus::Auto => "auto",
            MappingStatus::Confirmed => "confirmed",
            MappingStatus::Rejected => "rejected",
        }
    }

    /// Whether a mapping in this state carries a master category id.
    #[must_use]
    pub fn has_master(self) -> bool {
        matches!(self, MappingStatus::Auto | MappingStatus::Confirmed)
    }
}

impl std::fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join between one retailer category and at most one canonical category.
///
/// `master_id` is only set while `status` is `auto` or `confirmed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub source_id: String,
    /// `"{parent_name} > {name}"` when the mapping was last inferred.
    pub source_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_id: Option<String>,
    #[serde(default)]
    pub status: MappingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_timestamp"
    )]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CategoryMapping {
    /// A fresh record for a category seen for the first time.
    #[must_use]
    pub fn pending(source_id: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source_path: source_path.into(),
            master_id: None,
            status: MappingStatus::Pending,
            confidence: None,
            suggestions: Vec::new(),
            reviewed_at: None,
            notes: None,
        }
    }
}

/// Counts per status. Every status is always reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MappingStats {
    pub pending: usize,
    pub auto: usize,
    pub confirmed: usize,
    pub rejected: usize,
}

impl MappingStats {
    pub fn record(&mut self, status: MappingStatus) {
        match status {
            MappingStatus::Pending => self.pending += 1,
            MappingStatus::Auto => self.auto += 1,
            MappingStatus::Confirmed => self.confirmed += 1,
            MappingStatus::Rejected => self.rejected += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.pending + self.auto + self.confirmed + self.rejected
    }
}

pub const MAPPING_FILE_VERSION: &str = "1.0";

/// On-disk shape of one market's mapping set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingFile {
    #[serde(default)]
    pub market: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_mappings")]
    pub mappings: Vec<CategoryMapping>,
}

fn default_version() -> String {
    MAPPING_FILE_VERSION.to_string()
}

/// Decode records one by one so a single malformed entry cannot discard
/// the rest of the file.
///
/// A record that fails to decode but still names a `source_id` comes back
/// as `pending` so it is reviewed again; one without a `source_id` is
/// dropped.
fn deserialize_mappings<'de, D>(deserializer: D) -> Result<Vec<CategoryMapping>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    let mut mappings = Vec::with_capacity(raw.len());
    for value in raw {
        match CategoryMapping::deserialize(&value) {
            Ok(record) => mappings.push(record),
            Err(e) => {
                let text = |key: &str| value.get(key).and_then(serde_json::Value::as_str);
                let Some(source_id) = text("source_id") else {
                    tracing::warn!(error = %e, "dropping stored mapping without a source_id");
                    continue;
                };
                tracing::warn!(
                    source_id,
                    error = %e,
                    "stored mapping could not be read; demoting to pending"
                );
                mappings.push(CategoryMapping::pending(
                    source_id,
                    text("source_path").unwrap_or_default(),
                ));
            }
        }
    }
    Ok(mappings)
}

/// Accept RFC 3339 timestamps, and naive ISO-8601 ones taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}
