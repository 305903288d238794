use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::{
    digest_key, record_id, Category, RawRecord, SourceInfo, SourceMetadata, UnifiedRecord,
};
use crate::pipeline::processing::mapper::{map_record, MappedFields, MappingRuleSet};
use crate::pipeline::processing::quality::{QualityScorer, SourceContext};

pub mod registry;
pub mod transformers;

pub use registry::TransformerRegistry;

/// Result of transforming one raw batch: emitted records plus drop statistics.
/// Drop counters are explicit return values, not shared state.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub records: Vec<UnifiedRecord>,
    pub dropped: usize,
    pub drop_reasons: Vec<String>,
}

/// One transformer per source family. Transformers never touch the
/// filesystem; emitting the record list is their only effect.
pub trait SourceTransformer: Send + Sync {
    /// Registry key and batch-file name for this source
    fn source_id(&self) -> &'static str;

    /// The category every record from this source lands in
    fn category(&self) -> Category;

    /// Transform a raw batch into unified records, preserving input order.
    /// A malformed record is dropped and counted, never escalated.
    fn transform(&self, batch: &[RawRecord], meta: &SourceMetadata) -> TransformOutcome;
}

/// Shared mapping loop used by every transformer: map, score, enrich, emit.
pub(crate) fn transform_batch(
    batch: &[RawRecord],
    meta: &SourceMetadata,
    source_id: &str,
    category: Category,
    rules: &MappingRuleSet,
    scorer: &QualityScorer,
    ctx: &SourceContext,
    enrich: &dyn Fn(&RawRecord, &MappedFields) -> BTreeMap<String, String>,
) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();
    let fetched_at = Utc::now();

    for raw in batch {
        let fields = match map_record(raw, rules) {
            Ok(fields) => fields,
            Err(e) => {
                debug!(source = source_id, "dropping record: {}", e);
                outcome.dropped += 1;
                outcome.drop_reasons.push(e.to_string());
                continue;
            }
        };

        let quality = scorer.score(&fields, ctx);
        let attributes = enrich(raw, &fields);
        let id = record_id(source_id, &natural_key(&fields));
        let title = fields
            .title
            .clone()
            .unwrap_or_else(|| format!("Untitled {} record", category));

        outcome.records.push(UnifiedRecord {
            id,
            category,
            date: fields.date,
            title,
            location: fields.location,
            metrics: fields.metrics,
            attributes,
            source: SourceInfo {
                name: meta.name.clone(),
                organization: meta.organization.clone(),
                fetched_at,
                url: meta.url.clone(),
            },
            quality,
            raw_excerpt: fields.raw_excerpt,
        });
    }

    outcome
}

/// Natural key for id derivation: the source's own record id when present,
/// otherwise a digest of the identifying fields.
fn natural_key(fields: &MappedFields) -> String {
    if let Some(id) = &fields.source_record_id {
        return id.clone();
    }
    let mut parts: Vec<String> = vec![fields.date.to_string(), fields.location.name.clone()];
    if let Some(title) = &fields.title {
        parts.push(title.clone());
    }
    for (name, value) in &fields.metrics {
        parts.push(format!("{}={}", name, value));
    }
    let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
    digest_key(&refs)
}
