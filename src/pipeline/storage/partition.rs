use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::{PARTITION_INDEX_FILE, RECENT_FILE};
use crate::domain::{Category, UnifiedRecord};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One partition file as listed in a category index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    pub file: String,
    pub period: String,
    pub record_count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Per-category partition metadata. Invariant: the sum of per-partition
/// record counts equals `total_records` (checked by the validator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionIndex {
    pub category: Category,
    pub partitions: Vec<PartitionDescriptor>,
    pub total_records: usize,
    pub date_range: Option<DateRange>,
    /// Distinct regions, kept here so the manifest never opens partition files
    pub regions: Vec<String>,
    /// The trailing-window file; its records duplicate quarter files and are
    /// not counted in total_records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent: Option<PartitionDescriptor>,
    pub generated_at: DateTime<Utc>,
}

/// Calendar quarter bucket, e.g. "2023-Q4"
pub fn quarter_label(date: NaiveDate) -> String {
    format!("{}-Q{}", date.year(), date.month0() / 3 + 1)
}

/// Canonical corpus order: ascending by date, ties broken by id
pub fn sort_records(records: &mut [UnifiedRecord]) {
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
}

/// Writes one category's records as quarterly partition files plus a
/// trailing-window `recent.json`, index last. The whole set is staged and
/// swapped in atomically: a failed run leaves the previous partition set
/// untouched.
pub struct Partitioner {
    root: PathBuf,
    recent_days: i64,
}

impl Partitioner {
    pub fn new(root: impl Into<PathBuf>, recent_days: i64) -> Self {
        Self { root: root.into(), recent_days }
    }

    pub fn partition(
        &self,
        category: Category,
        records: &[UnifiedRecord],
    ) -> Result<PartitionIndex> {
        let staging = self.root.join(format!("{}.staging", category.as_str()));

        let index = self
            .write_partition_set(&staging, category, records)
            .and_then(|index| {
                self.commit(&staging, category)?;
                Ok(index)
            })
            .map_err(|e| {
                let _ = fs::remove_dir_all(&staging);
                PipelineError::PartitionWrite {
                    category: category.to_string(),
                    message: e.to_string(),
                }
            })?;

        info!(
            category = category.as_str(),
            partitions = index.partitions.len(),
            records = index.total_records,
            "partition set committed"
        );
        Ok(index)
    }

    fn write_partition_set(
        &self,
        staging: &Path,
        category: Category,
        records: &[UnifiedRecord],
    ) -> Result<PartitionIndex> {
        if staging.exists() {
            fs::remove_dir_all(staging)?;
        }
        fs::create_dir_all(staging)?;

        let mut sorted = records.to_vec();
        sort_records(&mut sorted);

        let mut quarters: BTreeMap<String, Vec<&UnifiedRecord>> = BTreeMap::new();
        for record in &sorted {
            quarters.entry(quarter_label(record.date)).or_default().push(record);
        }

        let mut partitions = Vec::with_capacity(quarters.len());
        for (period, group) in &quarters {
            let file = format!("{}.json", period);
            fs::write(staging.join(&file), serde_json::to_vec_pretty(group)?)?;
            // Groups are created on first push, never empty
            partitions.push(PartitionDescriptor {
                file,
                period: period.clone(),
                record_count: group.len(),
                first_date: group[0].date,
                last_date: group[group.len() - 1].date,
            });
        }

        // Trailing window for fast-path access, anchored to the newest record
        // date so regeneration on identical input is reproducible
        let recent = match sorted.last() {
            Some(newest) => {
                let cutoff = newest.date - Duration::days(self.recent_days);
                let window: Vec<&UnifiedRecord> =
                    sorted.iter().filter(|r| r.date >= cutoff).collect();
                fs::write(staging.join(RECENT_FILE), serde_json::to_vec_pretty(&window)?)?;
                Some(PartitionDescriptor {
                    file: RECENT_FILE.to_string(),
                    period: "recent".to_string(),
                    record_count: window.len(),
                    first_date: window.first().map(|r| r.date).unwrap_or(newest.date),
                    last_date: newest.date,
                })
            }
            None => None,
        };

        let regions: BTreeSet<String> =
            sorted.iter().map(|r| r.location.region.clone()).collect();

        let date_range = match (sorted.first(), sorted.last()) {
            (Some(first), Some(last)) => {
                Some(DateRange { start: first.date, end: last.date })
            }
            _ => None,
        };

        let index = PartitionIndex {
            category,
            partitions,
            total_records: sorted.len(),
            date_range,
            regions: regions.into_iter().collect(),
            recent,
            generated_at: Utc::now(),
        };

        // The index is written only after every partition file is on disk
        fs::write(
            staging.join(PARTITION_INDEX_FILE),
            serde_json::to_vec_pretty(&index)?,
        )?;
        Ok(index)
    }

    /// Swap the staged set in, keeping the previous set recoverable until the
    /// new one is in place.
    fn commit(&self, staging: &Path, category: Category) -> Result<()> {
        let live = self.root.join(category.as_str());
        let backup = self.root.join(format!("{}.old", category.as_str()));

        if backup.exists() {
            fs::remove_dir_all(&backup)?;
        }
        if live.exists() {
            fs::rename(&live, &backup)?;
        }
        if let Err(e) = fs::rename(staging, &live) {
            if backup.exists() {
                let _ = fs::rename(&backup, &live);
            }
            return Err(e.into());
        }
        if backup.exists() {
            let _ = fs::remove_dir_all(&backup);
        }
        Ok(())
    }
}

/// Read a category's partition index, or None when the category has never
/// been written.
pub fn load_index(root: &Path, category: Category) -> Result<Option<PartitionIndex>> {
    let path = root.join(category.as_str()).join(PARTITION_INDEX_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Read one partition file back into records
pub fn read_partition(path: &Path) -> Result<Vec<UnifiedRecord>> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
