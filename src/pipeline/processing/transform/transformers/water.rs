use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::constants::WASH_CLUSTER_SOURCE;
use crate::domain::{Category, RawRecord, SourceMetadata};
use crate::pipeline::processing::mapper::{MappedFields, MappingRuleSet, MetricRule};
use crate::pipeline::processing::quality::{QualityScorer, SourceContext};
use crate::pipeline::processing::transform::{transform_batch, SourceTransformer, TransformOutcome};

/// WASH cluster water/sanitation indicator series
pub struct WaterTransformer {
    scorer: QualityScorer,
    ctx: SourceContext,
}

static WATER_RULES: MappingRuleSet = MappingRuleSet {
    date: &["date", "survey_date", "period", "year"],
    title: &["indicator_name", "indicator"],
    location_name: &["location", "community", "site"],
    region: &["region", "admin1", "governorate"],
    latitude: &[],
    longitude: &[],
    actor: &[],
    record_id: &[],
    metrics: &[
        MetricRule { canonical: "value", candidates: &["value", "percent", "coverage"] },
        MetricRule {
            canonical: "beneficiaries",
            candidates: &["beneficiaries", "people_served", "people_reached"],
        },
    ],
};

static INDICATOR_FAMILY_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)sanitation|latrine|sewage|toilet").unwrap(), "sanitation"),
        (Regex::new(r"(?i)hygiene|soap|handwash").unwrap(), "hygiene"),
        (Regex::new(r"(?i)quality|contamin|chlorin|turbid").unwrap(), "quality"),
        (Regex::new(r"(?i)access|coverage|supply|network").unwrap(), "access"),
    ]
});

fn classify_indicator(raw: &RawRecord, fields: &MappedFields) -> &'static str {
    let mut haystack = fields.title.clone().unwrap_or_default();
    if let Some(code) = raw.get("indicator_code").and_then(|v| v.as_str()) {
        haystack.push(' ');
        haystack.push_str(code);
    }
    INDICATOR_FAMILY_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&haystack))
        .map(|(_, label)| *label)
        .unwrap_or("general")
}

impl WaterTransformer {
    pub fn new(ctx: SourceContext) -> Self {
        Self { scorer: QualityScorer::new(), ctx }
    }
}

impl SourceTransformer for WaterTransformer {
    fn source_id(&self) -> &'static str {
        WASH_CLUSTER_SOURCE
    }

    fn category(&self) -> Category {
        Category::Water
    }

    fn transform(&self, batch: &[RawRecord], meta: &SourceMetadata) -> TransformOutcome {
        transform_batch(
            batch,
            meta,
            self.source_id(),
            self.category(),
            &WATER_RULES,
            &self.scorer,
            &self.ctx,
            &|raw, fields| {
                let mut attributes = BTreeMap::new();
                attributes.insert(
                    "indicator_family".to_string(),
                    classify_indicator(raw, fields).to_string(),
                );
                attributes
            },
        )
    }
}
