use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::config::Config;
use crate::constants::{CHUNK_DIR, CHUNK_INDEX_FILE, VALIDATION_REPORT_FILE};
use crate::domain::Category;
use crate::error::Result;
use crate::pipeline::storage::chunk::ChunkIndex;
use crate::pipeline::storage::partition::{load_index, read_partition, PartitionDescriptor};

/// One violated check. Validation failures are findings, never errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub check: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ValidationSummary,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.summary.status == "passed"
    }
}

struct Checks {
    total: usize,
    errors: Vec<ValidationError>,
}

impl Checks {
    fn new() -> Self {
        Self { total: 0, errors: Vec::new() }
    }

    fn run(
        &mut self,
        check: &str,
        category: Category,
        file: Option<&str>,
        ok: bool,
        message: impl FnOnce() -> String,
    ) {
        self.total += 1;
        if !ok {
            self.errors.push(ValidationError {
                check: check.to_string(),
                category: category.to_string(),
                file: file.map(str::to_string),
                message: message(),
            });
        }
    }
}

/// Check the structural invariants of the on-disk layout. Failures
/// accumulate into a full report; earlier failures never stop later checks.
pub fn validate(unified_root: &Path, config: &Config) -> ValidationReport {
    let mut checks = Checks::new();

    for category in Category::all() {
        let index = match load_index(unified_root, *category) {
            Ok(Some(index)) => index,
            Ok(None) => continue,
            Err(e) => {
                checks.run("partition index parses", *category, None, false, || e.to_string());
                continue;
            }
        };
        let dir = unified_root.join(category.as_str());

        let mut listed: Vec<&PartitionDescriptor> = index.partitions.iter().collect();
        if let Some(recent) = &index.recent {
            listed.push(recent);
        }

        for descriptor in &listed {
            let path = dir.join(&descriptor.file);
            let exists = path.is_file();
            checks.run(
                "partition file exists",
                *category,
                Some(&descriptor.file),
                exists,
                || "listed in index but missing on disk".to_string(),
            );
            if !exists {
                continue;
            }

            // Size ceiling
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            checks.run(
                "partition file size",
                *category,
                Some(&descriptor.file),
                size <= config.max_file_bytes,
                || format!("{} bytes exceeds ceiling of {}", size, config.max_file_bytes),
            );

            let records = match read_partition(&path) {
                Ok(records) => records,
                Err(e) => {
                    checks.run(
                        "partition file parses",
                        *category,
                        Some(&descriptor.file),
                        false,
                        || e.to_string(),
                    );
                    continue;
                }
            };
            checks.run(
                "partition file parses",
                *category,
                Some(&descriptor.file),
                true,
                String::new,
            );

            // Every date inside the configured baseline window
            let out_of_window = records
                .iter()
                .filter(|r| r.date < config.baseline.start || r.date > config.baseline.end)
                .count();
            checks.run(
                "record dates in baseline window",
                *category,
                Some(&descriptor.file),
                out_of_window == 0,
                || {
                    format!(
                        "{} record(s) outside {}..{}",
                        out_of_window, config.baseline.start, config.baseline.end
                    )
                },
            );

            // Non-decreasing by (date, id) for binary-searchable range reads
            let ordered = records
                .windows(2)
                .all(|pair| (pair[0].date, &pair[0].id) <= (pair[1].date, &pair[1].id));
            checks.run(
                "records sorted by date",
                *category,
                Some(&descriptor.file),
                ordered,
                || "records are not in ascending (date, id) order".to_string(),
            );
        }

        // Declared total matches the sum of per-partition counts
        let sum: usize = index.partitions.iter().map(|p| p.record_count).sum();
        checks.run(
            "record count consistency",
            *category,
            None,
            sum == index.total_records,
            || format!("partition counts sum to {}, index declares {}", sum, index.total_records),
        );

        // Chunked layouts carry the same count invariant
        let chunk_index_path = dir.join(CHUNK_DIR).join(CHUNK_INDEX_FILE);
        if chunk_index_path.is_file() {
            match fs::read(&chunk_index_path)
                .map_err(crate::error::PipelineError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<ChunkIndex>(&bytes)?))
            {
                Ok(chunk_index) => {
                    let chunk_sum: usize =
                        chunk_index.chunks.iter().map(|c| c.record_count).sum();
                    checks.run(
                        "chunk count consistency",
                        *category,
                        Some(CHUNK_INDEX_FILE),
                        chunk_sum == chunk_index.total_records,
                        || {
                            format!(
                                "chunk counts sum to {}, index declares {}",
                                chunk_sum, chunk_index.total_records
                            )
                        },
                    );
                    for chunk in &chunk_index.chunks {
                        checks.run(
                            "chunk file exists",
                            *category,
                            Some(&chunk.file),
                            dir.join(CHUNK_DIR).join(&chunk.file).is_file(),
                            || "listed in chunk index but missing on disk".to_string(),
                        );
                    }
                }
                Err(e) => {
                    checks.run(
                        "chunk index parses",
                        *category,
                        Some(CHUNK_INDEX_FILE),
                        false,
                        || e.to_string(),
                    );
                }
            }
        }
    }

    let failed = checks.errors.len();
    let total_tests = checks.total;
    let passed = total_tests - failed;
    let success_rate = if total_tests == 0 {
        1.0
    } else {
        passed as f64 / total_tests as f64
    };
    let status = if failed == 0 { "passed" } else { "failed" };
    if failed > 0 {
        warn!(failed, total_tests, "validation found violations");
    }

    ValidationReport {
        generated_at: Utc::now(),
        summary: ValidationSummary {
            total_tests,
            passed,
            failed,
            success_rate,
            status: status.to_string(),
        },
        errors: checks.errors,
    }
}

/// The report lives at the data root, next to the unified tree
pub fn write_report(data_root: &Path, report: &ValidationReport) -> Result<()> {
    fs::create_dir_all(data_root)?;
    fs::write(
        data_root.join(VALIDATION_REPORT_FILE),
        serde_json::to_vec_pretty(report)?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, QualityProfile, SourceInfo, UnifiedRecord};
    use crate::pipeline::storage::Partitioner;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn test_record(id: &str, date: (i32, u32, u32)) -> UnifiedRecord {
        UnifiedRecord {
            id: id.to_string(),
            category: Category::Conflict,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            title: format!("record {}", id),
            location: Location::unknown(),
            metrics: BTreeMap::new(),
            attributes: BTreeMap::new(),
            source: SourceInfo {
                name: "test".to_string(),
                organization: "Test".to_string(),
                fetched_at: Utc::now(),
                url: "https://example.org".to_string(),
            },
            quality: QualityProfile {
                score: 0.5,
                completeness: 0.5,
                consistency: 1.0,
                accuracy: 0.5,
                confidence: 0.5,
                verified: false,
            },
            raw_excerpt: None,
        }
    }

    #[test]
    fn clean_corpus_passes() {
        let dir = tempdir().unwrap();
        let partitioner = Partitioner::new(dir.path(), 30);
        partitioner
            .partition(
                Category::Conflict,
                &[test_record("a", (2023, 2, 1)), test_record("b", (2023, 8, 1))],
            )
            .unwrap();

        let report = validate(dir.path(), &Config::default());
        assert!(report.passed());
        assert!(report.errors.is_empty());
        assert!(report.summary.total_tests > 0);
        assert_eq!(report.summary.passed, report.summary.total_tests);
    }

    #[test]
    fn missing_partition_file_is_exactly_one_failure() {
        let dir = tempdir().unwrap();
        let partitioner = Partitioner::new(dir.path(), 30);
        partitioner
            .partition(
                Category::Conflict,
                &[test_record("a", (2023, 2, 1)), test_record("b", (2023, 8, 1))],
            )
            .unwrap();

        // Remove one quarter file out from under the index
        fs::remove_file(dir.path().join("conflict").join("2023-Q1.json")).unwrap();

        let report = validate(dir.path(), &Config::default());
        assert_eq!(report.summary.status, "failed");
        let existence_failures: Vec<_> = report
            .errors
            .iter()
            .filter(|e| e.check == "partition file exists")
            .collect();
        assert_eq!(existence_failures.len(), 1);
        assert_eq!(existence_failures[0].file.as_deref(), Some("2023-Q1.json"));
        // Other checks still ran on the surviving files
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn count_mismatch_is_reported() {
        let dir = tempdir().unwrap();
        let partitioner = Partitioner::new(dir.path(), 30);
        partitioner
            .partition(Category::Conflict, &[test_record("a", (2023, 2, 1))])
            .unwrap();

        // Corrupt the declared total
        let index_path = dir.path().join("conflict").join("index.json");
        let mut index: serde_json::Value =
            serde_json::from_slice(&fs::read(&index_path).unwrap()).unwrap();
        index["total_records"] = serde_json::json!(99);
        fs::write(&index_path, serde_json::to_vec_pretty(&index).unwrap()).unwrap();

        let report = validate(dir.path(), &Config::default());
        assert!(!report.passed());
        assert!(report.errors.iter().any(|e| e.check == "record count consistency"));
    }

    #[test]
    fn dates_outside_baseline_fail() {
        let dir = tempdir().unwrap();
        let partitioner = Partitioner::new(dir.path(), 30);
        partitioner
            .partition(Category::Conflict, &[test_record("a", (1998, 2, 1))])
            .unwrap();

        let report = validate(dir.path(), &Config::default());
        assert!(report
            .errors
            .iter()
            .any(|e| e.check == "record dates in baseline window"));
    }

    #[test]
    fn empty_corpus_yields_a_passing_report() {
        let dir = tempdir().unwrap();
        let report = validate(dir.path(), &Config::default());
        assert!(report.passed());
        assert_eq!(report.summary.total_tests, 0);
        assert_eq!(report.summary.success_rate, 1.0);

        write_report(dir.path(), &report).unwrap();
        assert!(dir.path().join(VALIDATION_REPORT_FILE).exists());
    }
}
