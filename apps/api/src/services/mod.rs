pub mod catalog;
pub mod random_baseline;
pub mod recommendation;
pub mod registry;
pub mod store;

// Re-export public types
pub use catalog::{CsvCatalog, EntityCatalog, SqlCatalog};
pub use random_baseline::RandomBaseline;
pub use recommendation::RecommendationService;
pub use registry::{ModelKind, ModelRun, ModelRunner, ModelSpec, RunRequest};
pub use store::RecommendationStore;
