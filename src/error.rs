use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Field mapping failed: {0}")]
    Mapping(String),

    #[error("Partition write failed for category '{category}': {message}")]
    PartitionWrite { category: String, message: String },

    #[error("Chunk {requested} out of range (0..{total})")]
    OutOfRange { requested: usize, total: usize },

    #[error("No transformer registered for source: {0}")]
    UnknownSource(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
