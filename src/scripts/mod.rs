pub mod build_index;
pub mod normalize_catalog;

pub use build_index::build_index;
pub use normalize_catalog::normalize_catalog;
