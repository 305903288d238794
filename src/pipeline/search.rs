use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::constants::{CHUNK_DIR, CHUNK_INDEX_FILE, SEARCH_INDEX_FILE};
use crate::domain::{Category, UnifiedRecord};
use crate::error::Result;
use crate::pipeline::storage::chunk::ChunkReader;
use crate::pipeline::storage::partition::{load_index, read_partition};

/// What a search hit shows before the full record is fetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPreview {
    pub title: String,
    pub location: String,
}

/// One flattened entry per unified record. Trades field completeness for
/// per-entry size so the whole index stays loadable at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
    pub id: String,
    pub category: Category,
    /// Lowercased free text built from the record's most descriptive fields
    pub text: String,
    pub preview: SearchPreview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndex {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<SearchEntry>,
}

impl SearchIndex {
    /// Case-insensitive substring scan over the flattened text
    pub fn search(&self, query: &str) -> Vec<&SearchEntry> {
        let needle = query.to_lowercase();
        self.entries.iter().filter(|e| e.text.contains(&needle)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry_for(record: &UnifiedRecord) -> SearchEntry {
    let location = if record.location.name == record.location.region {
        record.location.name.clone()
    } else {
        format!("{}, {}", record.location.name, record.location.region)
    };

    let mut text = format!(
        "{} {} {}",
        record.title, record.location.name, record.location.region
    );
    for value in record.attributes.values() {
        text.push(' ');
        text.push_str(value);
    }

    SearchEntry {
        id: record.id.clone(),
        category: record.category,
        text: text.to_lowercase(),
        preview: SearchPreview { title: record.title.clone(), location },
    }
}

/// Flatten every partitioned record under the unified root into search
/// entries. `recent.json` is skipped (its records duplicate quarter files);
/// a chunked layout is walked only when a category has no quarter files.
pub fn build_search_index(unified_root: &Path) -> Result<SearchIndex> {
    let mut entries = Vec::new();

    for category in Category::all() {
        let Some(index) = load_index(unified_root, *category)? else {
            continue;
        };
        let dir = unified_root.join(category.as_str());

        if index.partitions.is_empty() {
            let chunk_dir = dir.join(CHUNK_DIR);
            if chunk_dir.join(CHUNK_INDEX_FILE).exists() {
                let reader = ChunkReader::open(&chunk_dir)?;
                for record in reader.iter() {
                    entries.push(entry_for(&record?));
                }
            }
            continue;
        }

        for partition in &index.partitions {
            for record in read_partition(&dir.join(&partition.file))? {
                entries.push(entry_for(&record));
            }
        }
        debug!(category = category.as_str(), "search entries flattened");
    }

    Ok(SearchIndex { generated_at: Utc::now(), entries })
}

/// The search index lives at the data root, next to the unified tree
pub fn write_search_index(data_root: &Path, index: &SearchIndex) -> Result<()> {
    fs::create_dir_all(data_root)?;
    fs::write(
        data_root.join(SEARCH_INDEX_FILE),
        serde_json::to_vec_pretty(index)?,
    )?;
    Ok(())
}
