use ndarray::{Array2, ArrayView1};
use std::{cmp::Ordering, sync::Arc};

/// One nearest-neighbour hit: a row position and its inner product with the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub score: f32,
}

/// Top-n inner-product search over a fixed set of vectors.
///
/// Implementations are immutable after construction and shared across
/// request threads. Results are ordered by score descending, ties by lowest
/// position.
pub trait VectorIndex: Send + Sync {
    fn search(&self, query: &ArrayView1<f32>, n: usize) -> Vec<Neighbor>;

    fn len(&self) -> usize;

    fn dimension(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str;
}

/// Exact brute-force inner-product index over a matrix shared with the
/// embedding store.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    vectors: Arc<Array2<f32>>,
}

impl FlatIpIndex {
    pub const KIND: &'static str = "flat_ip";

    pub fn build(vectors: Arc<Array2<f32>>) -> Self {
        Self { vectors }
    }
}

pub(crate) fn by_score_then_position(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

impl VectorIndex for FlatIpIndex {
    fn search(&self, query: &ArrayView1<f32>, n: usize) -> Vec<Neighbor> {
        let n = n.min(self.vectors.nrows());
        if n == 0 {
            return Vec::new();
        }

        let scores = self.vectors.dot(query);
        let mut hits: Vec<Neighbor> = scores
            .iter()
            .enumerate()
            .map(|(position, &score)| Neighbor { position, score })
            .collect();

        if n < hits.len() {
            hits.select_nth_unstable_by(n - 1, by_score_then_position);
            hits.truncate(n);
        }
        hits.sort_unstable_by(by_score_then_position);
        hits
    }

    fn len(&self) -> usize {
        self.vectors.nrows()
    }

    fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn positions(hits: &[Neighbor]) -> Vec<usize> {
        hits.iter().map(|h| h.position).collect()
    }

    #[test]
    fn test_search_orders_by_inner_product() {
        let vectors = array![[1.0, 0.0], [0.0, 1.0], [0.6, 0.8], [-1.0, 0.0]];
        let index = FlatIpIndex::build(Arc::new(vectors));
        let query = array![1.0, 0.0];

        let hits = index.search(&query.view(), 4);
        assert_eq!(positions(&hits), vec![0, 2, 1, 3]);
        assert!((hits[1].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_ties_break_by_lowest_position() {
        let vectors = array![[0.0, 1.0], [1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        let index = FlatIpIndex::build(Arc::new(vectors));
        let query = array![1.0, 0.0];

        let hits = index.search(&query.view(), 2);
        assert_eq!(positions(&hits), vec![1, 2]);
    }

    #[test]
    fn test_n_larger_than_index_is_truncated() {
        let vectors = array![[1.0, 0.0], [0.0, 1.0]];
        let index = FlatIpIndex::build(Arc::new(vectors));
        let query = array![0.0, 1.0];

        assert_eq!(index.search(&query.view(), 200).len(), 2);
        assert!(index.search(&query.view(), 0).is_empty());
    }

    #[test]
    fn test_search_is_idempotent() {
        let vectors = array![[0.3, 0.4], [0.5, 0.5], [0.9, 0.1], [0.2, 0.2]];
        let index = FlatIpIndex::build(Arc::new(vectors));
        let query = array![0.7, 0.3];

        let first = index.search(&query.view(), 3);
        let second = index.search(&query.view(), 3);
        assert_eq!(first, second);
    }
}
