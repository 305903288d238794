/// Source id constants to ensure consistency across the codebase
/// These identify the per-source batch files and the transformer registry keys

pub const ACLED_SOURCE: &str = "acled";
pub const UNOSAT_SOURCE: &str = "unosat";
pub const WASH_CLUSTER_SOURCE: &str = "wash_cluster";
pub const WHO_SOURCE: &str = "who_indicators";
pub const UNHCR_SOURCE: &str = "unhcr";
pub const IOM_DTM_SOURCE: &str = "iom_dtm";

// Root file names at the top of the unified tree
pub const MANIFEST_FILE: &str = "unified-manifest.json";
pub const SEARCH_INDEX_FILE: &str = "search-index.json";
pub const VALIDATION_REPORT_FILE: &str = "validation-report.json";

// Per-category file names
pub const PARTITION_INDEX_FILE: &str = "index.json";
pub const RECENT_FILE: &str = "recent.json";
pub const CHUNK_INDEX_FILE: &str = "chunk-index.json";
pub const CHUNK_DIR: &str = "chunks";

/// Get all supported source ids
pub fn supported_sources() -> Vec<&'static str> {
    vec![
        ACLED_SOURCE,
        UNOSAT_SOURCE,
        WASH_CLUSTER_SOURCE,
        WHO_SOURCE,
        UNHCR_SOURCE,
        IOM_DTM_SOURCE,
    ]
}
