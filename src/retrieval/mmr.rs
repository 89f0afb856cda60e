//! Maximal Marginal Relevance re-ranking.
//!
//! Greedy selection that trades relevance to the query against redundancy
//! with what has already been picked:
//!
//! ```text
//! score(c) = λ · rel(c) − (1 − λ) · max_{s ∈ selected} sim(c, s)
//! ```
//!
//! The first pick is the most relevant candidate. With the default λ = 0.2
//! the redundancy penalty dominates, so near-duplicates of *any* earlier pick
//! are pushed down hard. Both terms are recomputed from the
//! [`EmbeddingStore`]; scores reported by the index are never reused.

use super::store::EmbeddingStore;
use crate::error::{ApiError, Result};
use ndarray::ArrayView1;
use tracing::trace;

pub const DEFAULT_LAMBDA: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrConfig {
    /// Weight of the relevance term; `1 - lambda` weighs the redundancy penalty.
    pub lambda: f32,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            lambda: DEFAULT_LAMBDA,
        }
    }
}

impl MmrConfig {
    pub fn new(lambda: f32) -> Result<Self> {
        let config = Self { lambda };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(ApiError::InvalidInput(format!(
                "lambda must be within [0, 1], got {}",
                self.lambda
            )));
        }
        Ok(())
    }
}

/// A picked candidate with its relevance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub position: usize,
    pub relevance: f32,
}

/// Pick up to `k` positions from `candidates`, in MMR order.
///
/// The candidate order only matters for ties: among equal scores the one
/// seen first in the remaining sequence wins. Returns at most
/// `min(k, candidates.len())` selections and never fails.
pub fn select(
    store: &EmbeddingStore,
    query: &ArrayView1<f32>,
    candidates: &[usize],
    k: usize,
    config: &MmrConfig,
) -> Vec<Selection> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let lambda = config.lambda;
    let target = k.min(candidates.len());

    // (position, relevance, highest similarity to anything selected so far)
    let mut remaining: Vec<(usize, f32, f32)> = candidates
        .iter()
        .map(|&position| (position, store.relevance(position, query), f32::NEG_INFINITY))
        .collect();
    let mut selected: Vec<Selection> = Vec::with_capacity(target);

    while selected.len() < target && !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;
        for (i, &(_, relevance, max_sim)) in remaining.iter().enumerate() {
            let score = if selected.is_empty() {
                relevance
            } else {
                lambda * relevance - (1.0 - lambda) * max_sim
            };
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let Some((i, score)) = best else {
            break;
        };
        let (position, relevance, _) = remaining.remove(i);
        trace!(position, relevance, score, "mmr pick");
        selected.push(Selection {
            position,
            relevance,
        });

        for candidate in remaining.iter_mut() {
            let sim = store.similarity(candidate.0, position);
            if sim > candidate.2 {
                candidate.2 = sim;
            }
        }
    }

    selected
}
