use serde::{Deserialize, Serialize};

use crate::domain::QualityProfile;
use crate::pipeline::processing::mapper::MappedFields;

/// Per-source scoring context, resolved once per transformer from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceContext {
    /// Source-trust prior in [0,1]
    pub trust: f64,
    /// Whether the source is on the verified list
    pub verified: bool,
    /// Number of other sources corroborating this feed's figures
    pub corroboration: u32,
}

impl SourceContext {
    pub fn new(trust: f64, verified: bool) -> Self {
        Self { trust, verified, corroboration: 0 }
    }
}

/// Fixed combination weights; completeness + consistency + accuracy sum to 1.0
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub completeness: f64,
    pub consistency: f64,
    pub accuracy: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        // Accuracy weighs heaviest: source trust is the only signal that
        // survives when a record is sparse.
        Self { completeness: 0.35, consistency: 0.25, accuracy: 0.40 }
    }
}

/// Population ceilings for cross-field consistency checks, keyed off how deep
/// the admin hierarchy resolves. Deeper hierarchy means a smaller place.
const CEILING_COUNTRY: f64 = 200_000_000.0;
const CEILING_REGION: f64 = 50_000_000.0;
const CEILING_DISTRICT: f64 = 10_000_000.0;

/// Metrics that count people and therefore obey population ceilings
const PEOPLE_METRICS: &[&str] = &[
    "fatalities",
    "injuries",
    "affected",
    "displaced",
    "refugees",
    "beneficiaries",
    "population",
    "cases",
];

const CORROBORATION_STEP: f64 = 0.05;
const CEILING_PENALTY: f64 = 0.3;
const CONTRADICTION_PENALTY: f64 = 0.2;

/// Computes a reliability profile for a mapped record. Pure: identical inputs
/// always produce identical scores.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: ScoringWeights,
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, fields: &MappedFields, ctx: &SourceContext) -> QualityProfile {
        let completeness = fields.completeness().clamp(0.0, 1.0);
        let consistency = self.consistency(fields);
        let accuracy =
            (ctx.trust + CORROBORATION_STEP * f64::from(ctx.corroboration)).clamp(0.0, 1.0);

        let confidence = (self.weights.completeness * completeness
            + self.weights.consistency * consistency
            + self.weights.accuracy * accuracy)
            .clamp(0.0, 1.0);

        QualityProfile {
            score: confidence,
            completeness,
            consistency,
            accuracy,
            confidence,
            verified: ctx.verified,
        }
    }

    /// 1.0 minus penalties for detected contradictions; 1.0 when no
    /// cross-field check applies.
    fn consistency(&self, fields: &MappedFields) -> f64 {
        let mut penalty = 0.0;

        let ceiling = match fields.location.admin_levels.len() {
            0 => CEILING_COUNTRY,
            1 => CEILING_REGION,
            _ => CEILING_DISTRICT,
        };

        if fields
            .metrics
            .iter()
            .any(|(name, value)| PEOPLE_METRICS.contains(&name.as_str()) && *value > ceiling)
        {
            penalty += CEILING_PENALTY;
        }

        // Fatalities exceeding the overall affected count is a contradiction
        if let (Some(&fatalities), Some(&affected)) =
            (fields.metrics.get("fatalities"), fields.metrics.get("affected"))
        {
            if affected > 0.0 && fatalities > affected {
                penalty += CONTRADICTION_PENALTY;
            }
        }

        (1.0 - penalty).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::mapper::{map_record, MappingRuleSet, MetricRule};
    use serde_json::json;

    const RULES: MappingRuleSet = MappingRuleSet {
        date: &["date"],
        title: &["title"],
        location_name: &["location"],
        region: &["region"],
        latitude: &[],
        longitude: &[],
        actor: &[],
        record_id: &[],
        metrics: &[
            MetricRule { canonical: "fatalities", candidates: &["fatalities"] },
            MetricRule { canonical: "affected", candidates: &["affected"] },
        ],
    };

    fn mapped(raw: serde_json::Value) -> MappedFields {
        map_record(&raw, &RULES).unwrap()
    }

    #[test]
    fn scoring_is_deterministic() {
        let fields = mapped(json!({
            "date": "2023-10-07", "title": "Strike", "location": "Gaza City",
            "region": "Gaza", "fatalities": 5, "affected": 40
        }));
        let scorer = QualityScorer::new();
        let ctx = SourceContext::new(0.85, true);

        let a = scorer.score(&fields, &ctx);
        let b = scorer.score(&fields, &ctx);
        assert_eq!(a, b);
        assert_eq!(a.score, a.confidence);
        assert!(a.verified);
    }

    #[test]
    fn consistency_defaults_to_one_without_contradictions() {
        let fields = mapped(json!({ "date": "2023-10-07", "fatalities": 5 }));
        let profile = QualityScorer::new().score(&fields, &SourceContext::new(0.5, false));
        assert_eq!(profile.consistency, 1.0);
    }

    #[test]
    fn fatalities_beyond_population_ceiling_are_penalized() {
        let fields = mapped(json!({
            "date": "2023-10-07", "admin1": "Gaza Strip", "admin2": "Khan Younis",
            "fatalities": 11_000_000.0
        }));
        let profile = QualityScorer::new().score(&fields, &SourceContext::new(0.5, false));
        assert!(profile.consistency < 1.0);
    }

    #[test]
    fn fatalities_exceeding_affected_is_a_contradiction() {
        let fields = mapped(json!({
            "date": "2023-10-07", "fatalities": 50, "affected": 10
        }));
        let profile = QualityScorer::new().score(&fields, &SourceContext::new(0.5, false));
        assert!((profile.consistency - 0.8).abs() < 1e-9);
    }

    #[test]
    fn corroboration_lifts_accuracy_up_to_the_cap() {
        let fields = mapped(json!({ "date": "2023-10-07" }));
        let scorer = QualityScorer::new();

        let lone = scorer.score(&fields, &SourceContext { trust: 0.6, verified: false, corroboration: 0 });
        let backed = scorer.score(&fields, &SourceContext { trust: 0.6, verified: false, corroboration: 2 });
        assert!(backed.accuracy > lone.accuracy);

        let capped = scorer.score(&fields, &SourceContext { trust: 0.9, verified: false, corroboration: 10 });
        assert_eq!(capped.accuracy, 1.0);
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        let fields = mapped(json!({ "date": "2023-10-07" }));
        let profile = QualityScorer::new().score(&fields, &SourceContext::new(1.0, true));
        assert!(profile.confidence <= 1.0 && profile.confidence >= 0.0);
    }
}
