use super::index::{by_score_then_position, Neighbor};
use super::store::EmbeddingStore;
use crate::services::catalog::Catalog;
use ndarray::ArrayView1;

/// Narrows neighbour lists down to the positions MMR is allowed to pick from.
pub struct CandidateFilter;

impl CandidateFilter {
    /// Drop the query item's own position, keeping the index order.
    pub fn exclude_self(neighbors: &[Neighbor], self_position: usize) -> Vec<usize> {
        neighbors
            .iter()
            .map(|n| n.position)
            .filter(|&position| position != self_position)
            .collect()
    }

    /// Every position whose category equals `category` exactly, minus
    /// `exclude`, sorted by descending similarity to `query` (ties by position).
    ///
    /// An empty result is a normal outcome, not an error.
    pub fn restrict_to_category(
        store: &EmbeddingStore,
        catalog: &Catalog,
        query: &ArrayView1<f32>,
        category: &str,
        exclude: Option<usize>,
    ) -> Vec<usize> {
        let mut allowed: Vec<Neighbor> = (0..store.len())
            .filter(|&position| catalog.category_at(position) == Some(category))
            .filter(|&position| Some(position) != exclude)
            .map(|position| Neighbor {
                position,
                score: store.relevance(position, query),
            })
            .collect();

        allowed.sort_by(by_score_then_position);
        allowed.into_iter().map(|n| n.position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::test_record;
    use ndarray::array;

    fn fixture() -> (EmbeddingStore, Catalog) {
        let ids: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let store = EmbeddingStore::new(
            ids,
            array![[1.0, 0.0], [0.0, 1.0], [0.8, 0.6], [0.6, 0.8]],
        )
        .unwrap();
        let catalog = Catalog::from_records(vec![
            test_record("a", "tops"),
            test_record("b", "shoes"),
            test_record("c", "shoes"),
            test_record("d", "Shoes"),
        ])
        .unwrap();
        (store, catalog)
    }

    #[test]
    fn test_exclude_self_keeps_order() {
        let neighbors = vec![
            Neighbor { position: 3, score: 0.9 },
            Neighbor { position: 0, score: 0.8 },
            Neighbor { position: 2, score: 0.1 },
        ];
        assert_eq!(CandidateFilter::exclude_self(&neighbors, 0), vec![3, 2]);
    }

    #[test]
    fn test_category_match_is_exact_and_sorted() {
        let (store, catalog) = fixture();
        let query = store.vector_at(0);

        let allowed =
            CandidateFilter::restrict_to_category(&store, &catalog, &query, "shoes", Some(0));
        // "Shoes" (d) differs in case and is excluded; c is closer to a than b.
        assert_eq!(allowed, vec![2, 1]);
    }

    #[test]
    fn test_seed_is_excluded_from_its_own_category() {
        let (store, catalog) = fixture();
        let query = store.vector_at(1);

        let allowed =
            CandidateFilter::restrict_to_category(&store, &catalog, &query, "shoes", Some(1));
        assert_eq!(allowed, vec![2]);
    }

    #[test]
    fn test_unknown_category_is_empty() {
        let (store, catalog) = fixture();
        let query = store.vector_at(0);

        let allowed =
            CandidateFilter::restrict_to_category(&store, &catalog, &query, "hats", None);
        assert!(allowed.is_empty());
    }
}
