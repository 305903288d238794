use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::constants::IOM_DTM_SOURCE;
use crate::domain::{Category, RawRecord, SourceMetadata};
use crate::pipeline::processing::mapper::{MappingRuleSet, MetricRule};
use crate::pipeline::processing::quality::{QualityScorer, SourceContext};
use crate::pipeline::processing::transform::{transform_batch, SourceTransformer, TransformOutcome};

/// IOM DTM-style displacement tracking rounds
pub struct DisplacementTransformer {
    scorer: QualityScorer,
    ctx: SourceContext,
}

static DISPLACEMENT_RULES: MappingRuleSet = MappingRuleSet {
    date: &["date", "round_date", "reporting_date"],
    title: &["site_name", "title"],
    location_name: &["location", "site", "site_name"],
    region: &["admin1", "governorate", "region"],
    latitude: &["latitude", "lat"],
    longitude: &["longitude", "lon"],
    actor: &[],
    record_id: &["site_id", "location_id"],
    metrics: &[
        MetricRule {
            canonical: "displaced",
            candidates: &["idp_individuals", "displaced", "individuals"],
        },
        MetricRule { canonical: "households", candidates: &["idp_households", "households"] },
    ],
};

static CROSS_BORDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)cross.?border|abroad|international").unwrap());

fn classify_displacement(raw: &RawRecord) -> &'static str {
    let haystack = ["displacement_type", "movement_type"]
        .iter()
        .filter_map(|field| raw.get(field).and_then(|v| v.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    if CROSS_BORDER_PATTERN.is_match(&haystack) {
        "cross_border"
    } else {
        "internal"
    }
}

impl DisplacementTransformer {
    pub fn new(ctx: SourceContext) -> Self {
        Self { scorer: QualityScorer::new(), ctx }
    }
}

impl SourceTransformer for DisplacementTransformer {
    fn source_id(&self) -> &'static str {
        IOM_DTM_SOURCE
    }

    fn category(&self) -> Category {
        Category::Displacement
    }

    fn transform(&self, batch: &[RawRecord], meta: &SourceMetadata) -> TransformOutcome {
        transform_batch(
            batch,
            meta,
            self.source_id(),
            self.category(),
            &DISPLACEMENT_RULES,
            &self.scorer,
            &self.ctx,
            &|raw, _fields| {
                let mut attributes = BTreeMap::new();
                attributes.insert(
                    "displacement_type".to_string(),
                    classify_displacement(raw).to_string(),
                );
                if let Some(round) = raw.get("round").or_else(|| raw.get("dtm_round")) {
                    let label = match round {
                        serde_json::Value::String(s) => s.trim().to_string(),
                        other => other.to_string(),
                    };
                    attributes.insert("round".to_string(), label);
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
            name: "iom_dtm".to_string(),
            organization: "IOM".to_string(),
            url: "https://dtm.iom.int".to_string(),
        }
    }

    #[test]
    fn tracks_rounds_and_movement_type() {
        let batch = vec![json!({
            "site_id": "KY-031",
            "round_date": "2023-12-15",
            "site_name": "Khan Younis camp 3",
            "admin1": "Khan Younis",
            "round": 4,
            "idp_individuals": 18250,
            "idp_households": 3650
        })];
        let transformer = DisplacementTransformer::new(SourceContext::new(0.75, false));
        let outcome = transformer.transform(&batch, &meta());

        let record = &outcome.records[0];
        assert_eq!(record.attributes["displacement_type"], "internal");
        assert_eq!(record.attributes["round"], "4");
        assert_eq!(record.metrics["displaced"], 18250.0);
    }

    #[test]
    fn cross_border_movement_is_detected() {
        let batch = vec![json!({
            "date": "2023-12-15",
            "location": "Rafah crossing",
            "movement_type": "Cross-border movement to Egypt",
            "individuals": 1200
        })];
        let transformer = DisplacementTransformer::new(SourceContext::new(0.75, false));
        let outcome = transformer.transform(&batch, &meta());
        assert_eq!(outcome.records[0].attributes["displacement_type"], "cross_border");
    }
}
