use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::constants::UNHCR_SOURCE;
use crate::domain::{Category, RawRecord, SourceMetadata};
use crate::pipeline::processing::mapper::{MappingRuleSet, MetricRule};
use crate::pipeline::processing::quality::{QualityScorer, SourceContext};
use crate::pipeline::processing::transform::{transform_batch, SourceTransformer, TransformOutcome};

/// UNHCR-style population statistics
pub struct RefugeeTransformer {
    scorer: QualityScorer,
    ctx: SourceContext,
}

static REFUGEE_RULES: MappingRuleSet = MappingRuleSet {
    date: &["date", "reporting_date", "year"],
    title: &[],
    location_name: &["country_of_asylum", "asylum_country", "location", "country"],
    region: &["region", "subregion"],
    latitude: &[],
    longitude: &[],
    actor: &[],
    record_id: &[],
    metrics: &[
        MetricRule { canonical: "refugees", candidates: &["refugees", "refugee_population"] },
        MetricRule { canonical: "asylum_seekers", candidates: &["asylum_seekers", "asylum_applications"] },
        MetricRule { canonical: "returnees", candidates: &["returnees", "returned_refugees"] },
    ],
};

static POPULATION_GROUP_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)asylum").unwrap(), "asylum_seekers"),
        (Regex::new(r"(?i)return").unwrap(), "returnees"),
        (Regex::new(r"(?i)stateless").unwrap(), "stateless"),
        (Regex::new(r"(?i)idp|internal").unwrap(), "idps"),
        (Regex::new(r"(?i)refugee").unwrap(), "refugees"),
    ]
});

fn classify_population_group(raw: &RawRecord) -> &'static str {
    let haystack = ["population_type", "population_group", "group"]
        .iter()
        .filter_map(|field| raw.get(field).and_then(|v| v.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    POPULATION_GROUP_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&haystack))
        .map(|(_, label)| *label)
        .unwrap_or("refugees")
}

impl RefugeeTransformer {
    pub fn new(ctx: SourceContext) -> Self {
        Self { scorer: QualityScorer::new(), ctx }
    }
}

impl SourceTransformer for RefugeeTransformer {
    fn source_id(&self) -> &'static str {
        UNHCR_SOURCE
    }

    fn category(&self) -> Category {
        Category::Refugee
    }

    fn transform(&self, batch: &[RawRecord], meta: &SourceMetadata) -> TransformOutcome {
        transform_batch(
            batch,
            meta,
            self.source_id(),
            self.category(),
            &REFUGEE_RULES,
            &self.scorer,
            &self.ctx,
            &|raw, _fields| {
                let mut attributes = BTreeMap::new();
                attributes.insert(
                    "population_group".to_string(),
                    classify_population_group(raw).to_string(),
                );
                if let Some(origin) = raw
                    .get("country_of_origin")
                    .or_else(|| raw.get("origin"))
                    .and_then(|v| v.as_str())
                {
                    attributes.insert("country_of_origin".to_string(), origin.trim().to_string());
                }
                attributes
            },
        )
    }
}
