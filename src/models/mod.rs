use serde::{Deserialize, Serialize};

pub use catalog::CatalogRecord;

pub mod catalog;

/// Query parameters for `GET /recommend/similar`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarQuery {
    pub item_id: String,
    /// Number of recommendations; falls back to the configured default.
    pub k: Option<i64>,
    /// Relevance/diversity trade-off override in `[0, 1]`.
    pub lambda: Option<f32>,
}

/// Query parameters for `GET /recommend/complete-look`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteLookQuery {
    pub seed_item_id: String,
    pub target_category: Option<String>,
    pub k: Option<i64>,
    pub lambda: Option<f32>,
}

/// A recommended item joined with its display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: String,
    /// Inner product between the item's vector and the query vector.
    pub score: f32,
    pub brand: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub current_price: Option<f64>,
}

/// Health check response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Number of items in the active snapshot
    pub items: usize,
    pub timestamp: String,
}
