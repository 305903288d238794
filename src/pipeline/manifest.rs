use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::constants::MANIFEST_FILE;
use crate::domain::Category;
use crate::error::Result;
use crate::pipeline::storage::partition::{load_index, DateRange};

/// Corpus-wide summary entry for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub record_count: usize,
    pub date_range: Option<DateRange>,
    pub regions: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub categories: Vec<CategorySummary>,
}

impl Manifest {
    pub fn category(&self, category: Category) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Summarize every category present under the unified root by reading its
/// partition index only. Categories with an empty index are listed with
/// count 0; omitting them would hide a broken pipeline run.
pub fn build_manifest(unified_root: &Path) -> Result<Manifest> {
    let mut categories = Vec::new();
    let mut total_records = 0;

    for category in Category::all() {
        let Some(index) = load_index(unified_root, *category)? else {
            continue;
        };
        debug!(category = category.as_str(), records = index.total_records, "manifest entry");
        total_records += index.total_records;
        categories.push(CategorySummary {
            category: *category,
            record_count: index.total_records,
            date_range: index.date_range.clone(),
            regions: index.regions.clone(),
            last_updated: index.generated_at,
        });
    }

    Ok(Manifest { generated_at: Utc::now(), total_records, categories })
}

pub fn write_manifest(unified_root: &Path, manifest: &Manifest) -> Result<()> {
    fs::create_dir_all(unified_root)?;
    fs::write(
        unified_root.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(manifest)?,
    )?;
    Ok(())
}
