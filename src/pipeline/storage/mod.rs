// On-disk layout: quarterly partitions per category, fixed-size chunks for
// oversized collections

pub mod chunk;
pub mod partition;

pub use chunk::{ChunkIndex, ChunkReader, ChunkWriter};
pub use partition::{load_index, read_partition, PartitionIndex, Partitioner};
