//! Random baseline recommender for quick sanity checks.

use crate::{
    error::{ApiError, Result},
    models::{Recommendations, TargetKey},
};
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

/// Seeded generator for reproducible runs, entropy-seeded otherwise.
pub fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[derive(Debug, Clone)]
pub struct RandomBaseline {
    user_ids: Vec<i64>,
    item_ids: Vec<i64>,
}

impl RandomBaseline {
    pub fn new(user_ids: Vec<i64>, item_ids: Vec<i64>) -> Self {
        Self { user_ids, item_ids }
    }

    /// Samples `top_n` items per user and `top_n` other items per item.
    ///
    /// Users are drawn first, then items, both in pool order, so a fixed seed
    /// reproduces the exact same lists.
    pub fn recommend<R: Rng + ?Sized>(&self, top_n: usize, rng: &mut R) -> Result<Recommendations> {
        if top_n < 1 {
            return Err(ApiError::InvalidRequest(
                "top_n must be at least 1".to_string(),
            ));
        }

        let mut recs = Recommendations::new();
        let n_items = self.item_ids.len();
        let limit = top_n.min(n_items);

        for &user_id in &self.user_ids {
            recs.insert(TargetKey::user(user_id), sample(rng, &self.item_ids, limit));
        }

        for &item_id in &self.item_ids {
            if n_items == 1 {
                recs.insert(TargetKey::item(item_id), Vec::new());
                continue;
            }
            let candidates: Vec<i64> = self
                .item_ids
                .iter()
                .copied()
                .filter(|&candidate| candidate != item_id)
                .collect();
            let size = top_n.min(candidates.len());
            recs.insert(TargetKey::item(item_id), sample(rng, &candidates, size));
        }

        Ok(recs)
    }
}

/// Draws `amount` distinct entries of `pool`, in sampled order.
fn sample<R: Rng + ?Sized>(rng: &mut R, pool: &[i64], amount: usize) -> Vec<i64> {
    if amount == 0 {
        return Vec::new();
    }
    index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i])
        .collect()
}
