use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::constants::UNOSAT_SOURCE;
use crate::domain::{Category, RawRecord, SourceMetadata};
use crate::pipeline::processing::mapper::{MappingRuleSet, MetricRule};
use crate::pipeline::processing::quality::{QualityScorer, SourceContext};
use crate::pipeline::processing::transform::{transform_batch, SourceTransformer, TransformOutcome};

/// UNOSAT-style satellite damage assessments
pub struct InfrastructureTransformer {
    scorer: QualityScorer,
    ctx: SourceContext,
}

static INFRASTRUCTURE_RULES: MappingRuleSet = MappingRuleSet {
    date: &["assessment_date", "analysis_date", "date", "sensor_date"],
    title: &["site_name", "name", "title"],
    location_name: &["location", "site", "city"],
    region: &["admin1", "governorate", "region"],
    latitude: &["latitude", "lat"],
    longitude: &["longitude", "lon"],
    actor: &[],
    record_id: &["site_id", "osm_id", "id"],
    metrics: &[
        MetricRule {
            canonical: "structures_damaged",
            candidates: &["structures_damaged", "damaged_structures", "damaged"],
        },
        MetricRule {
            canonical: "structures_destroyed",
            candidates: &["structures_destroyed", "destroyed_structures", "destroyed"],
        },
    ],
};

static DAMAGE_CLASS_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)destroy|collaps|razed").unwrap(), "destroyed"),
        (Regex::new(r"(?i)severe|major|heavy").unwrap(), "severe"),
        (Regex::new(r"(?i)moderate|partial").unwrap(), "moderate"),
        (Regex::new(r"(?i)minor|light|superficial").unwrap(), "minor"),
    ]
});

fn classify_damage(raw: &RawRecord) -> &'static str {
    let haystack = ["damage_level", "damage", "status", "main_damage_site"]
        .iter()
        .filter_map(|field| raw.get(field).and_then(|v| v.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    DAMAGE_CLASS_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&haystack))
        .map(|(_, label)| *label)
        .unwrap_or("unknown")
}

impl InfrastructureTransformer {
    pub fn new(ctx: SourceContext) -> Self {
        Self { scorer: QualityScorer::new(), ctx }
    }
}

impl SourceTransformer for InfrastructureTransformer {
    fn source_id(&self) -> &'static str {
        UNOSAT_SOURCE
    }

    fn category(&self) -> Category {
        Category::Infrastructure
    }

    fn transform(&self, batch: &[RawRecord], meta: &SourceMetadata) -> TransformOutcome {
        transform_batch(
            batch,
            meta,
            self.source_id(),
            self.category(),
            &INFRASTRUCTURE_RULES,
            &self.scorer,
            &self.ctx,
            &|raw, _fields| {
                let mut attributes = BTreeMap::new();
                attributes.insert("damage_class".to_string(), classify_damage(raw).to_string());
                if let Some(facility) = raw
                    .get("facility_type")
                    .or_else(|| raw.get("infrastructure_type"))
                    .or_else(|| raw.get("type"))
                    .and_then(|v| v.as_str())
                {
                    attributes.insert(
                        "facility_type".to_string(),
                        facility.trim().to_lowercase(),
                    );
                }
                attributes
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> SourceMetadata {
        SourceMetadata {
            name: "unosat".to_string(),
            organization: "UNITAR".to_string(),
            url: "https://unosat.org".to_string(),
        }
    }

    #[test]
    fn classifies_damage_and_facility_type() {
        let batch = vec![json!({
            "site_id": "S-44",
            "assessment_date": "2023-11-02",
            "site_name": "Al-Shifa complex",
            "location": "Gaza City",
            "admin1": "Gaza",
            "damage_level": "Severely damaged",
            "facility_type": "Hospital",
            "structures_damaged": 14
        })];
        let transformer = InfrastructureTransformer::new(SourceContext::new(0.8, true));
        let outcome = transformer.transform(&batch, &meta());

        let record = &outcome.records[0];
        assert_eq!(record.attributes["damage_class"], "severe");
        assert_eq!(record.attributes["facility_type"], "hospital");
        assert_eq!(record.metrics["structures_damaged"], 14.0);
        assert_eq!(record.metrics["structures_destroyed"], 0.0);
    }

    #[test]
    fn unlabelled_damage_reads_unknown() {
        let batch = vec![json!({ "assessment_date": "2023-11-02", "location": "Rafah" })];
        let transformer = InfrastructureTransformer::new(SourceContext::new(0.8, true));
        let outcome = transformer.transform(&batch, &meta());
        assert_eq!(outcome.records[0].attributes["damage_class"], "unknown");
    }
}
