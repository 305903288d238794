use std::collections::HashMap;

use super::transformers::{
    ConflictTransformer, DisplacementTransformer, HealthTransformer, InfrastructureTransformer,
    RefugeeTransformer, WaterTransformer,
};
use super::{SourceTransformer, TransformOutcome};
use crate::config::Config;
use crate::domain::{RawRecord, SourceMetadata};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::quality::SourceContext;

/// Registry mapping source ids to their transformer implementations
pub struct TransformerRegistry {
    transformers: HashMap<String, Box<dyn SourceTransformer>>,
}

impl TransformerRegistry {
    /// Create a registry with all built-in source transformers, each wired
    /// to its configured trust prior and verification flag.
    pub fn new(config: &Config) -> Self {
        let ctx = |source: &str| {
            SourceContext::new(config.trust_for(source), config.is_verified(source))
        };

        let built_in: Vec<Box<dyn SourceTransformer>> = vec![
            Box::new(ConflictTransformer::new(ctx(crate::constants::ACLED_SOURCE))),
            Box::new(InfrastructureTransformer::new(ctx(crate::constants::UNOSAT_SOURCE))),
            Box::new(WaterTransformer::new(ctx(crate::constants::WASH_CLUSTER_SOURCE))),
            Box::new(HealthTransformer::new(ctx(crate::constants::WHO_SOURCE))),
            Box::new(RefugeeTransformer::new(ctx(crate::constants::UNHCR_SOURCE))),
            Box::new(DisplacementTransformer::new(ctx(crate::constants::IOM_DTM_SOURCE))),
        ];

        let mut transformers: HashMap<String, Box<dyn SourceTransformer>> = HashMap::new();
        for transformer in built_in {
            transformers.insert(transformer.source_id().to_string(), transformer);
        }

        Self { transformers }
    }

    /// Register a transformer for a specific source
    pub fn register(&mut self, source_id: String, transformer: Box<dyn SourceTransformer>) {
        self.transformers.insert(source_id, transformer);
    }

    pub fn get(&self, source_id: &str) -> Option<&dyn SourceTransformer> {
        self.transformers.get(source_id).map(|t| t.as_ref())
    }

    /// Transform a batch with the transformer registered for the source
    pub fn transform(
        &self,
        source_id: &str,
        batch: &[RawRecord],
        meta: &SourceMetadata,
    ) -> Result<TransformOutcome> {
        let transformer = self
            .get(source_id)
            .ok_or_else(|| PipelineError::UnknownSource(source_id.to_string()))?;
        Ok(transformer.transform(batch, meta))
    }

    /// List all registered source ids
    pub fn list_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.transformers.keys().map(|k| k.as_str()).collect();
        sources.sort_unstable();
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_has_all_built_in_transformers() {
        let registry = TransformerRegistry::new(&Config::default());
        let sources = registry.list_sources();
        for source in crate::constants::supported_sources() {
            assert!(sources.contains(&source), "missing transformer for {}", source);
        }
    }

    #[test]
    fn registry_rejects_unknown_sources() {
        let registry = TransformerRegistry::new(&Config::default());
        let meta = SourceMetadata {
            name: "mystery".to_string(),
            organization: "Nobody".to_string(),
            url: "https://example.org".to_string(),
        };
        let result = registry.transform("mystery", &[json!({ "date": "2023-01-01" })], &meta);
        assert!(matches!(result, Err(PipelineError::UnknownSource(_))));
    }

    #[test]
    fn configured_trust_flows_into_scores() {
        let registry = TransformerRegistry::new(&Config::default());
        let meta = SourceMetadata {
            name: "unhcr".to_string(),
            organization: "UNHCR".to_string(),
            url: "https://data.unhcr.org".to_string(),
        };
        let outcome = registry
            .transform(
                crate::constants::UNHCR_SOURCE,
                &[json!({ "year": 2023, "country_of_asylum": "Chad", "refugees": 1000 })],
                &meta,
            )
            .unwrap();
        // Default config gives UNHCR a 0.9 prior and verified status
        assert_eq!(outcome.records[0].quality.accuracy, 0.9);
        assert!(outcome.records[0].quality.verified);
    }
}
