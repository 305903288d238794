use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::CHUNK_INDEX_FILE;
use crate::domain::UnifiedRecord;
use crate::error::{PipelineError, Result};
use crate::pipeline::storage::partition::sort_records;

/// One chunk file's boundaries as recorded in the chunk index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub file: String,
    pub record_count: usize,
    pub first_id: String,
    pub last_id: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

/// Metadata for an oversized collection laid out as fixed-size chunks.
/// Invariant: per-chunk record counts sum to `total_records`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkIndex {
    pub total_records: usize,
    pub total_chunks: usize,
    pub chunk_size: usize,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<ChunkDescriptor>,
}

/// Splits a sorted record list into contiguous fixed-size chunk files,
/// writing the chunk index last.
pub struct ChunkWriter {
    dir: PathBuf,
    chunk_size: usize,
}

impl ChunkWriter {
    pub fn new(dir: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self { dir: dir.into(), chunk_size }
    }

    pub fn write(&self, records: &[UnifiedRecord]) -> Result<ChunkIndex> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be nonzero".to_string()));
        }
        fs::create_dir_all(&self.dir)?;

        let mut sorted = records.to_vec();
        sort_records(&mut sorted);

        let mut chunks = Vec::new();
        for (n, group) in sorted.chunks(self.chunk_size).enumerate() {
            let file = format!("chunk-{:03}.json", n);
            fs::write(self.dir.join(&file), serde_json::to_vec_pretty(group)?)?;
            // chunks() never yields an empty slice, so first/last are present
            chunks.push(ChunkDescriptor {
                file,
                record_count: group.len(),
                first_id: group[0].id.clone(),
                last_id: group[group.len() - 1].id.clone(),
                first_date: group[0].date,
                last_date: group[group.len() - 1].date,
            });
        }

        let index = ChunkIndex {
            total_records: sorted.len(),
            total_chunks: chunks.len(),
            chunk_size: self.chunk_size,
            created_at: Utc::now(),
            chunks,
        };

        // Chunk files first, index last
        fs::write(self.dir.join(CHUNK_INDEX_FILE), serde_json::to_vec_pretty(&index)?)?;
        info!(
            chunks = index.total_chunks,
            records = index.total_records,
            "chunk set written"
        );
        Ok(index)
    }
}

/// Streams a chunked collection without ever materializing more than one
/// chunk at a time.
pub struct ChunkReader {
    dir: PathBuf,
    index: ChunkIndex,
}

impl ChunkReader {
    pub fn open(dir: &Path) -> Result<Self> {
        let bytes = fs::read(dir.join(CHUNK_INDEX_FILE))?;
        let index: ChunkIndex = serde_json::from_slice(&bytes)?;
        Ok(Self { dir: dir.to_path_buf(), index })
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    pub fn total_chunks(&self) -> usize {
        self.index.total_chunks
    }

    pub fn read_chunk(&self, n: usize) -> Result<Vec<UnifiedRecord>> {
        let descriptor = self.index.chunks.get(n).ok_or(PipelineError::OutOfRange {
            requested: n,
            total: self.index.total_chunks,
        })?;
        let bytes = fs::read(self.dir.join(&descriptor.file))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Records in original total order, loaded chunk by chunk
    pub fn iter(&self) -> ChunkRecordIter<'_> {
        ChunkRecordIter { reader: self, next_chunk: 0, buffer: Vec::new().into_iter() }
    }
}

pub struct ChunkRecordIter<'a> {
    reader: &'a ChunkReader,
    next_chunk: usize,
    buffer: std::vec::IntoIter<UnifiedRecord>,
}

impl Iterator for ChunkRecordIter<'_> {
    type Item = Result<UnifiedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }
            if self.next_chunk >= self.reader.total_chunks() {
                return None;
            }
            match self.reader.read_chunk(self.next_chunk) {
                Ok(records) => {
                    self.next_chunk += 1;
                    self.buffer = records.into_iter();
                }
                Err(e) => {
                    self.next_chunk = self.reader.total_chunks();
                    return Some(Err(e));
                }
            }
        }
    }
}
