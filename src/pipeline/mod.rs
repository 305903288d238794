// Data unification pipeline: per-source transformation, partitioned storage,
// and corpus summaries

pub mod manifest;
pub mod processing;
pub mod search;
pub mod storage;
pub mod validate;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::Config;
use crate::constants::CHUNK_DIR;
use crate::domain::{Category, RawRecord, SourceMetadata};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::transform::TransformerRegistry;
use crate::pipeline::storage::chunk::{ChunkIndex, ChunkWriter};
use crate::pipeline::storage::partition::{load_index, read_partition};
use crate::pipeline::storage::Partitioner;

/// Raw batch file layout: the hand-off format written by the out-of-scope
/// fetchers into the input directory
#[derive(Debug, Deserialize)]
pub struct BatchFile {
    pub source: SourceMetadata,
    pub records: Vec<RawRecord>,
}

pub fn load_batch(path: &Path) -> Result<BatchFile> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Outcome of one source's pipeline run
#[derive(Debug, Clone)]
pub struct RunStats {
    pub source: String,
    pub category: Category,
    pub input: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub partitions: usize,
}

/// Drives transform + partition per source. Categories are independent: a
/// failed category keeps its previous partition set and the run moves on.
pub struct PipelineRun {
    config: Config,
    registry: TransformerRegistry,
}

impl PipelineRun {
    pub fn new(config: Config) -> Self {
        let registry = TransformerRegistry::new(&config);
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    /// Where root-level artifacts (search index, validation report) live:
    /// the parent of the unified tree
    pub fn data_root(&self) -> PathBuf {
        match self.config.unified_root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Transform one raw batch and regenerate its category's partition set
    pub fn run_source(
        &self,
        source_id: &str,
        batch: &[RawRecord],
        meta: &SourceMetadata,
    ) -> Result<RunStats> {
        let transformer = self
            .registry
            .get(source_id)
            .ok_or_else(|| PipelineError::UnknownSource(source_id.to_string()))?;

        let outcome = transformer.transform(batch, meta);
        if outcome.dropped > 0 {
            warn!(
                source = source_id,
                dropped = outcome.dropped,
                "records dropped during transformation"
            );
        }

        let partitioner =
            Partitioner::new(&self.config.unified_root, self.config.recent_days);
        let index = partitioner.partition(transformer.category(), &outcome.records)?;

        Ok(RunStats {
            source: source_id.to_string(),
            category: transformer.category(),
            input: batch.len(),
            emitted: outcome.records.len(),
            dropped: outcome.dropped,
            partitions: index.partitions.len(),
        })
    }

    /// Run one source from its batch file in the input directory
    pub fn run_from_input(&self, source_id: &str) -> Result<RunStats> {
        let path = self.config.input_dir.join(format!("{}.json", source_id));
        let batch = load_batch(&path)?;
        self.run_source(source_id, &batch.records, &batch.source)
    }

    /// Run every listed source, containing per-source failures
    pub fn run_sources(&self, sources: &[String]) -> Vec<(String, Result<RunStats>)> {
        let mut results = Vec::new();
        for source_id in sources {
            let span = tracing::info_span!("source run", source = %source_id);
            let _enter = span.enter();
            results.push((source_id.clone(), self.run_from_input(source_id)));
        }
        results
    }

    /// Re-lay an already-partitioned category as fixed-size chunks for
    /// streaming reads
    pub fn chunk_category(&self, category: Category, chunk_size: usize) -> Result<ChunkIndex> {
        let index = load_index(&self.config.unified_root, category)?.ok_or_else(|| {
            PipelineError::Config(format!("category '{}' has no partition set", category))
        })?;

        let dir = self.config.unified_root.join(category.as_str());
        let mut records = Vec::new();
        for partition in &index.partitions {
            records.extend(read_partition(&dir.join(&partition.file))?);
        }

        ChunkWriter::new(dir.join(CHUNK_DIR), chunk_size).write(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::storage::chunk::ChunkReader;
    use serde_json::json;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> Config {
        Config {
            unified_root: dir.join("unified"),
            input_dir: dir.join("input"),
            ..Config::default()
        }
    }

    fn conflict_meta() -> SourceMetadata {
        SourceMetadata {
            name: "acled".to_string(),
            organization: "ACLED".to_string(),
            url: "https://acleddata.com".to_string(),
        }
    }

    #[test]
    fn run_source_partitions_a_transformed_batch() {
        let dir = tempdir().unwrap();
        let run = PipelineRun::new(config_in(dir.path()));

        let batch = vec![
            json!({ "event_id": "1", "date": "2023-10-07", "location": "Gaza", "fatalities": 5 }),
            json!({ "event_id": "2", "date": "2024-01-15", "location": "Rafah", "fatalities": 2 }),
            json!({ "no_date": true }),
        ];
        let stats = run
            .run_source(crate::constants::ACLED_SOURCE, &batch, &conflict_meta())
            .unwrap();

        assert_eq!(stats.input, 3);
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.partitions, 2); // 2023-Q4 and 2024-Q1

        let index = load_index(&run.config().unified_root, Category::Conflict)
            .unwrap()
            .unwrap();
        assert_eq!(index.total_records, 2);
    }

    #[test]
    fn unknown_source_is_rejected_before_any_write() {
        let dir = tempdir().unwrap();
        let run = PipelineRun::new(config_in(dir.path()));
        let result = run.run_source("mystery", &[], &conflict_meta());
        assert!(matches!(result, Err(PipelineError::UnknownSource(_))));
        assert!(!run.config().unified_root.exists());
    }

    #[test]
    fn batch_files_round_trip_from_the_input_dir() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(&config.input_dir).unwrap();
        fs::write(
            config.input_dir.join("acled.json"),
            serde_json::to_vec(&json!({
                "source": { "name": "acled", "organization": "ACLED", "url": "https://acleddata.com" },
                "records": [{ "event_id": "1", "date": "2023-10-07", "location": "Gaza" }]
            }))
            .unwrap(),
        )
        .unwrap();

        let run = PipelineRun::new(config);
        let results = run.run_sources(&["acled".to_string(), "unhcr".to_string()]);
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        // No batch file for unhcr: that source fails without affecting acled
        assert!(results[1].1.is_err());
    }

    #[test]
    fn chunking_replays_the_partitioned_category() {
        let dir = tempdir().unwrap();
        let run = PipelineRun::new(config_in(dir.path()));

        let batch: Vec<_> = (1..=9)
            .map(|n| json!({ "event_id": n.to_string(), "date": format!("2023-10-{:02}", n), "location": "Gaza" }))
            .collect();
        run.run_source(crate::constants::ACLED_SOURCE, &batch, &conflict_meta())
            .unwrap();

        let chunk_index = run.chunk_category(Category::Conflict, 4).unwrap();
        assert_eq!(chunk_index.total_records, 9);
        assert_eq!(chunk_index.total_chunks, 3);

        let reader = ChunkReader::open(
            &run.config().unified_root.join("conflict").join(CHUNK_DIR),
        )
        .unwrap();
        let replayed: Vec<_> = reader.iter().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(replayed.len(), 9);
    }
}
