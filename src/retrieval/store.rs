use crate::{
    error::{ApiError, Result},
    ml::l2_normalize_rows,
};
use ndarray::{Array2, ArrayView1, ArrayView2};
use std::{collections::HashMap, sync::Arc};

/// Read-only table of unit-length item vectors, one row per item id.
///
/// Row `i` of the matrix belongs to `ids[i]`; that position is the handle used
/// by the index, the candidate filter and the MMR selector. The matrix is
/// shared with the index rather than copied.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
    vectors: Arc<Array2<f32>>,
}

impl EmbeddingStore {
    pub fn new(ids: Vec<String>, mut vectors: Array2<f32>) -> Result<Self> {
        if ids.len() != vectors.nrows() {
            return Err(ApiError::InvalidInput(format!(
                "{} item ids but {} vectors",
                ids.len(),
                vectors.nrows()
            )));
        }
        if vectors.ncols() == 0 {
            return Err(ApiError::InvalidInput(
                "embedding dimension must be positive".to_string(),
            ));
        }

        let mut positions = HashMap::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            if positions.insert(id.clone(), position).is_some() {
                return Err(ApiError::InvalidInput(format!("duplicate item id {}", id)));
            }
        }

        l2_normalize_rows(&mut vectors);

        Ok(Self {
            ids,
            positions,
            vectors: Arc::new(vectors),
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id_at(&self, position: usize) -> &str {
        &self.ids[position]
    }

    pub fn position_of(&self, item_id: &str) -> Result<usize> {
        self.positions
            .get(item_id)
            .copied()
            .ok_or_else(|| ApiError::NotFound(format!("Item with ID {} not found", item_id)))
    }

    pub fn vector_for(&self, item_id: &str) -> Result<ArrayView1<'_, f32>> {
        let position = self.position_of(item_id)?;
        Ok(self.vector_at(position))
    }

    pub fn vector_at(&self, position: usize) -> ArrayView1<'_, f32> {
        self.vectors.row(position)
    }

    /// All vectors in id order.
    pub fn all_vectors(&self) -> ArrayView2<'_, f32> {
        self.vectors.view()
    }

    /// Handle to the normalized matrix for building an index over it.
    pub fn shared_vectors(&self) -> Arc<Array2<f32>> {
        Arc::clone(&self.vectors)
    }

    pub fn relevance(&self, position: usize, query: &ArrayView1<f32>) -> f32 {
        self.vector_at(position).dot(query)
    }

    pub fn similarity(&self, a: usize, b: usize) -> f32 {
        self.vector_at(a).dot(&self.vector_at(b))
    }
}
