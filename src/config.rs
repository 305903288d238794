use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline configuration, loaded from `config.toml` when present.
/// Every field has a default so the pipeline runs without a config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the unified on-disk corpus
    pub unified_root: PathBuf,
    /// Directory holding per-source raw batch files
    pub input_dir: PathBuf,
    /// Trailing window (days) captured in recent.json, anchored to the newest record date
    pub recent_days: i64,
    /// Target record count per chunk for fixed-size chunking
    pub chunk_size: usize,
    /// Validator ceiling on partition file size
    pub max_file_bytes: u64,
    /// Validator window that every record date must fall inside
    pub baseline: BaselineWindow,
    /// Per-source accuracy priors in [0,1]; unknown sources score 0.5
    pub trust: BTreeMap<String, f64>,
    /// Sources whose records carry quality.verified = true
    pub verified_sources: Vec<String>,
}

/// Dates are quoted strings in the TOML file, e.g. start = "2020-01-01"
#[derive(Debug, Clone, Deserialize)]
pub struct BaselineWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for Config {
    fn default() -> Self {
        let mut trust = BTreeMap::new();
        trust.insert(crate::constants::ACLED_SOURCE.to_string(), 0.85);
        trust.insert(crate::constants::UNOSAT_SOURCE.to_string(), 0.8);
        trust.insert(crate::constants::WASH_CLUSTER_SOURCE.to_string(), 0.6);
        trust.insert(crate::constants::WHO_SOURCE.to_string(), 0.9);
        trust.insert(crate::constants::UNHCR_SOURCE.to_string(), 0.9);
        trust.insert(crate::constants::IOM_DTM_SOURCE.to_string(), 0.75);

        Self {
            unified_root: PathBuf::from("unified"),
            input_dir: PathBuf::from("input"),
            recent_days: 30,
            chunk_size: 5000,
            max_file_bytes: 50 * 1024 * 1024,
            baseline: BaselineWindow {
                start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2035, 12, 31).unwrap(),
            },
            trust,
            verified_sources: vec![
                crate::constants::WHO_SOURCE.to_string(),
                crate::constants::UNHCR_SOURCE.to_string(),
                crate::constants::UNOSAT_SOURCE.to_string(),
            ],
        }
    }
}

impl Config {
    /// Load from ./config.toml, falling back to defaults when the file is absent.
    pub fn load() -> Result<Self> {
        let config_path = Path::new("config.toml");
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Accuracy prior for a source; unknown sources get a neutral 0.5.
    pub fn trust_for(&self, source_id: &str) -> f64 {
        self.trust.get(source_id).copied().unwrap_or(0.5)
    }

    pub fn is_verified(&self, source_id: &str) -> bool {
        self.verified_sources.iter().any(|s| s == source_id)
    }
}
