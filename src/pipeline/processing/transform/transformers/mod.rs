// Individual transformer implementations, one per source family
pub mod conflict;
pub mod displacement;
pub mod health;
pub mod infrastructure;
pub mod refugee;
pub mod water;

// Re-export the main components
pub use conflict::ConflictTransformer;
pub use displacement::DisplacementTransformer;
pub use health::HealthTransformer;
pub use infrastructure::InfrastructureTransformer;
pub use refugee::RefugeeTransformer;
pub use water::WaterTransformer;
