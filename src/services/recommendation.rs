use crate::{
    config::Config,
    error::{ApiError, Result},
    models::Recommendation,
    retrieval::{mmr, CandidateFilter, MmrConfig, Selection},
    services::artifacts::{load_serving_context, ServingContext},
};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Serves `similar` and `complete_look` over the active catalog snapshot.
///
/// The snapshot sits behind an `Arc`; a request clones it once and then works
/// without holding any lock. Replacing the snapshot swaps the `Arc`, so
/// in-flight requests keep reading the one they started with.
pub struct RecommendationService {
    context: RwLock<Arc<ServingContext>>,
    candidate_pool: usize,
    default_mmr: MmrConfig,
}

impl RecommendationService {
    pub fn new(context: ServingContext, candidate_pool: usize, default_mmr: MmrConfig) -> Self {
        Self {
            context: RwLock::new(Arc::new(context)),
            candidate_pool,
            default_mmr,
        }
    }

    pub fn from_config(context: ServingContext, config: &Config) -> Result<Self> {
        let default_mmr = MmrConfig::new(config.mmr_lambda)?;
        Ok(Self::new(context, config.candidate_pool, default_mmr))
    }

    /// The snapshot currently being served.
    pub fn context(&self) -> Arc<ServingContext> {
        let guard = self
            .context
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn item_count(&self) -> usize {
        self.context().len()
    }

    /// Atomically replace the active snapshot, returning the previous one.
    pub fn swap_context(&self, next: ServingContext) -> Arc<ServingContext> {
        let next = Arc::new(next);
        let mut guard = self
            .context
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, next)
    }

    /// Rebuild the snapshot from `config.data_dir` and swap it in. On failure
    /// the current snapshot stays active.
    pub fn reload(&self, config: &Config) -> Result<usize> {
        let next = match load_serving_context(&config.data_dir) {
            Ok(context) => context,
            Err(e) => {
                warn!("Reload from {} failed: {}", config.data_dir.display(), e);
                return Err(e);
            }
        };
        let items = next.len();
        self.swap_context(next);
        info!(items, "Swapped in reloaded serving context");
        Ok(items)
    }

    fn resolve(&self, k: i64, lambda: Option<f32>) -> Result<(usize, MmrConfig)> {
        if k <= 0 {
            return Err(ApiError::InvalidInput(format!(
                "k must be a positive integer, got {}",
                k
            )));
        }
        let mmr_config = match lambda {
            Some(lambda) => MmrConfig::new(lambda)?,
            None => self.default_mmr,
        };
        Ok((k as usize, mmr_config))
    }

    /// Items similar to `item_id`, diversified with MMR. Never contains `item_id`.
    pub fn similar(
        &self,
        item_id: &str,
        k: i64,
        lambda: Option<f32>,
    ) -> Result<Vec<Recommendation>> {
        let (k, mmr_config) = self.resolve(k, lambda)?;
        let context = self.context();

        let position = context.store.position_of(item_id)?;
        let query = context.store.vector_at(position);

        let neighbors = context.index.search(&query, self.candidate_pool);
        let candidates = CandidateFilter::exclude_self(&neighbors, position);
        debug!(
            item_id,
            neighbors = neighbors.len(),
            candidates = candidates.len(),
            "similar candidates"
        );

        let picks = mmr::select(&context.store, &query, &candidates, k, &mmr_config);
        assemble(&context, &picks)
    }

    /// Items from `target_category` that go with `seed_item_id`.
    ///
    /// An empty category yields an empty list rather than an error.
    pub fn complete_look(
        &self,
        seed_item_id: &str,
        target_category: &str,
        k: i64,
        lambda: Option<f32>,
    ) -> Result<Vec<Recommendation>> {
        let (k, mmr_config) = self.resolve(k, lambda)?;
        let context = self.context();

        let position = context.store.position_of(seed_item_id)?;
        let query = context.store.vector_at(position);

        let candidates = CandidateFilter::restrict_to_category(
            &context.store,
            &context.catalog,
            &query,
            target_category,
            Some(position),
        );
        if candidates.is_empty() {
            debug!(seed_item_id, target_category, "no candidates in target category");
            return Ok(Vec::new());
        }

        let picks = mmr::select(&context.store, &query, &candidates, k, &mmr_config);
        assemble(&context, &picks)
    }
}

fn assemble(context: &ServingContext, picks: &[Selection]) -> Result<Vec<Recommendation>> {
    picks
        .iter()
        .map(|pick| {
            let item_id = context.store.id_at(pick.position);
            let record = context.catalog.lookup(item_id)?;
            Ok(Recommendation {
                item_id: item_id.to_string(),
                score: pick.relevance,
                brand: record.brand.clone(),
                title: record.title.clone(),
                category: record.category.clone(),
                image_url: record.image_url.clone(),
                current_price: record.current_price,
            })
        })
        .collect()
}
