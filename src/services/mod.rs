pub mod artifacts;
pub mod catalog;
pub mod recommendation;

// Re-export public types
pub use artifacts::{load_serving_context, write_artifacts, ServingContext};
pub use catalog::Catalog;
pub use recommendation::RecommendationService;
