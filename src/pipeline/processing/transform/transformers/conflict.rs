use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::constants::ACLED_SOURCE;
use crate::domain::{Category, RawRecord, SourceMetadata};
use crate::pipeline::processing::mapper::{MappedFields, MappingRuleSet, MetricRule};
use crate::pipeline::processing::quality::{QualityScorer, SourceContext};
use crate::pipeline::processing::transform::{transform_batch, SourceTransformer, TransformOutcome};

/// ACLED-style conflict incident feeds
pub struct ConflictTransformer {
    scorer: QualityScorer,
    ctx: SourceContext,
}

static CONFLICT_RULES: MappingRuleSet = MappingRuleSet {
    date: &["event_date", "date", "report_date", "pubDate"],
    title: &["title", "headline", "notes"],
    location_name: &["location", "city", "site"],
    region: &["admin1", "region", "governorate", "province"],
    latitude: &["latitude", "lat"],
    longitude: &["longitude", "lon", "lng"],
    actor: &["actor1", "actor", "perpetrator"],
    record_id: &["event_id_cnty", "event_id", "data_id", "id"],
    metrics: &[
        MetricRule { canonical: "fatalities", candidates: &["fatalities", "deaths", "killed"] },
        MetricRule { canonical: "injuries", candidates: &["injuries", "wounded", "injured"] },
    ],
};

static EVENT_TYPE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)air ?strike|shelling|artillery|bomb|missile").unwrap(), "airstrike"),
        (Regex::new(r"(?i)battle|clash|armed engagement|fighting").unwrap(), "battle"),
        (Regex::new(r"(?i)protest|demonstration|riot").unwrap(), "protest"),
        (
            Regex::new(r"(?i)civilian|massacre|execution|abduction").unwrap(),
            "violence_against_civilians",
        ),
    ]
});

fn classify_event_type(raw: &RawRecord, fields: &MappedFields) -> &'static str {
    let mut haystack = String::new();
    for field in ["event_type", "sub_event_type", "notes"] {
        if let Some(text) = raw.get(field).and_then(|v| v.as_str()) {
            haystack.push_str(text);
            haystack.push(' ');
        }
    }
    if let Some(title) = &fields.title {
        haystack.push_str(title);
    }
    EVENT_TYPE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&haystack))
        .map(|(_, label)| *label)
        .unwrap_or("other")
}

impl ConflictTransformer {
    pub fn new(ctx: SourceContext) -> Self {
        Self { scorer: QualityScorer::new(), ctx }
    }
}

impl SourceTransformer for ConflictTransformer {
    fn source_id(&self) -> &'static str {
        ACLED_SOURCE
    }

    fn category(&self) -> Category {
        Category::Conflict
    }

    fn transform(&self, batch: &[RawRecord], meta: &SourceMetadata) -> TransformOutcome {
        transform_batch(
            batch,
            meta,
            self.source_id(),
            self.category(),
            &CONFLICT_RULES,
            &self.scorer,
            &self.ctx,
            &|raw, fields| {
                let mut attributes = BTreeMap::new();
                attributes.insert(
                    "event_type".to_string(),
                    classify_event_type(raw, fields).to_string(),
                );
                if let Some(actor) = &fields.actor {
                    attributes.insert("actor".to_string(), actor.clone());
                }
                attributes
            },
        )
    }
}
