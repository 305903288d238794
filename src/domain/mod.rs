use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Raw record as delivered by an external fetcher
pub type RawRecord = serde_json::Value;

/// Dataset categories; the lowercase form doubles as the on-disk directory name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Conflict,
    Infrastructure,
    Water,
    Health,
    Refugee,
    Displacement,
    Education,
    Emergency,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Conflict => "conflict",
            Category::Infrastructure => "infrastructure",
            Category::Water => "water",
            Category::Health => "health",
            Category::Refugee => "refugee",
            Category::Displacement => "displacement",
            Category::Education => "education",
            Category::Emergency => "emergency",
        }
    }

    pub fn all() -> &'static [Category] {
        &[
            Category::Conflict,
            Category::Infrastructure,
            Category::Water,
            Category::Health,
            Category::Refugee,
            Category::Displacement,
            Category::Education,
            Category::Emergency,
        ]
    }

    pub fn parse(s: &str) -> Option<Category> {
        Category::all().iter().copied().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured place reference; region degrades to "Unknown" rather than dropping the record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admin_levels: Vec<String>,
}

impl Location {
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            region: "Unknown".to_string(),
            coordinates: None,
            admin_levels: Vec::new(),
        }
    }
}

/// Provenance of a unified record: which feed, which fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub organization: String,
    pub fetched_at: DateTime<Utc>,
    pub url: String,
}

/// Reliability sub-scores; `score` is always equal to `confidence` and is a
/// deterministic function of the other fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub score: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub accuracy: f64,
    pub confidence: f64,
    pub verified: bool,
}

/// The canonical cross-source entity every transformer emits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedRecord {
    /// Stable across regenerations of the same source record
    pub id: String,
    pub category: Category,
    pub date: NaiveDate,
    pub title: String,
    pub location: Location,
    /// Category-specific numeric fields; absent values are 0.0, never null
    pub metrics: BTreeMap<String, f64>,
    /// Category enrichment such as event_type or indicator_family
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    pub source: SourceInfo,
    pub quality: QualityProfile,
    /// Bounded copy of ambiguous original fields, kept for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_excerpt: Option<String>,
}

/// Metadata handed over by the (out-of-scope) fetcher alongside each raw batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub name: String,
    pub organization: String,
    pub url: String,
}

/// Derive a stable record id from the source id and a natural key.
/// Re-ingesting the same source record always yields the same id.
pub fn record_id(source_id: &str, natural_key: &str) -> String {
    let seed = format!("{}:{}", source_id, natural_key);
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, seed.as_bytes()).to_string()
}

/// Digest a natural key out of record fields when the source has no id of its own.
pub fn digest_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_strings() {
        for category in Category::all() {
            assert_eq!(Category::parse(category.as_str()), Some(*category));
        }
        assert_eq!(Category::parse("weather"), None);
    }

    #[test]
    fn record_id_is_stable() {
        let a = record_id("acled", "GAZ12345");
        let b = record_id("acled", "GAZ12345");
        assert_eq!(a, b);
        // Different source, same key: distinct ids
        assert_ne!(a, record_id("unhcr", "GAZ12345"));
    }

    #[test]
    fn digest_key_separates_fields() {
        // ("ab", "c") and ("a", "bc") must not collide
        assert_ne!(digest_key(&["ab", "c"]), digest_key(&["a", "bc"]));
        assert_eq!(digest_key(&["2023-10-07", "Gaza"]), digest_key(&["2023-10-07", "Gaza"]));
    }

    #[test]
    fn unified_record_serializes_without_empty_optionals() {
        let record = UnifiedRecord {
            id: record_id("acled", "x"),
            category: Category::Conflict,
            date: NaiveDate::from_ymd_opt(2023, 10, 7).unwrap(),
            title: "Incident".to_string(),
            location: Location::unknown(),
            metrics: BTreeMap::new(),
            attributes: BTreeMap::new(),
            source: SourceInfo {
                name: "acled".to_string(),
                organization: "ACLED".to_string(),
                fetched_at: Utc::now(),
                url: "https://example.org".to_string(),
            },
            quality: QualityProfile {
                score: 0.5,
                completeness: 0.5,
                consistency: 1.0,
                accuracy: 0.5,
                confidence: 0.5,
                verified: false,
            },
            raw_excerpt: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["category"], "conflict");
        assert_eq!(json["date"], "2023-10-07");
        assert!(json.get("raw_excerpt").is_none());
        assert!(json.get("attributes").is_none());
    }
}
