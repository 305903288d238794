use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::constants::WHO_SOURCE;
use crate::domain::{Category, RawRecord, SourceMetadata};
use crate::pipeline::processing::mapper::{MappedFields, MappingRuleSet, MetricRule};
use crate::pipeline::processing::quality::{QualityScorer, SourceContext};
use crate::pipeline::processing::transform::{transform_batch, SourceTransformer, TransformOutcome};

/// WHO-style health indicator rows
pub struct HealthTransformer {
    scorer: QualityScorer,
    ctx: SourceContext,
}

static HEALTH_RULES: MappingRuleSet = MappingRuleSet {
    date: &["date", "period", "reporting_period", "year"],
    title: &["indicator_name", "indicator", "gho_name"],
    location_name: &["location", "country", "area"],
    region: &["region", "who_region", "admin1"],
    latitude: &[],
    longitude: &[],
    actor: &[],
    record_id: &[],
    metrics: &[
        MetricRule {
            canonical: "value",
            candidates: &["value", "numeric_value", "display_value"],
        },
        MetricRule { canonical: "cases", candidates: &["cases", "case_count"] },
        MetricRule { canonical: "deaths", candidates: &["deaths", "death_count"] },
    ],
};

static INDICATOR_FAMILY_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)mortality|death").unwrap(), "mortality"),
        (Regex::new(r"(?i)vaccin|immuni").unwrap(), "vaccination"),
        (Regex::new(r"(?i)nutrition|stunting|wasting|malnutrition").unwrap(), "nutrition"),
        (Regex::new(r"(?i)hospital|clinic|facility|bed").unwrap(), "facility"),
        (
            Regex::new(r"(?i)cholera|measles|malaria|morbidity|incidence|outbreak").unwrap(),
            "morbidity",
        ),
    ]
});

fn classify_indicator(raw: &RawRecord, fields: &MappedFields) -> &'static str {
    let mut haystack = fields.title.clone().unwrap_or_default();
    for field in ["indicator_code", "gho_code"] {
        if let Some(code) = raw.get(field).and_then(|v| v.as_str()) {
            haystack.push(' ');
            haystack.push_str(code);
        }
    }
    INDICATOR_FAMILY_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&haystack))
        .map(|(_, label)| *label)
        .unwrap_or("general")
}

impl HealthTransformer {
    pub fn new(ctx: SourceContext) -> Self {
        Self { scorer: QualityScorer::new(), ctx }
    }
}

impl SourceTransformer for HealthTransformer {
    fn source_id(&self) -> &'static str {
        WHO_SOURCE
    }

    fn category(&self) -> Category {
        Category::Health
    }

    fn transform(&self, batch: &[RawRecord], meta: &SourceMetadata) -> TransformOutcome {
        transform_batch(
            batch,
            meta,
            self.source_id(),
            self.category(),
            &HEALTH_RULES,
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
