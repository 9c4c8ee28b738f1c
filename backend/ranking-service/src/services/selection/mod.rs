// ============================================
// Weighted Random Selector
// ============================================
//
// Weighted sampling without replacement:
// 1. Draw one item by inverse-CDF over the remaining pool's weights
// 2. Remove it from the pool
// 3. Repeat until k items are drawn or the pool is empty
//
// P(item drawn first) = w(item) / Σw. Output is random per call.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRandomSelector;

impl WeightedRandomSelector {
    pub fn new() -> Self {
        Self
    }

    /// Pick up to `k` distinct ids, weighted, using the thread RNG
    pub fn select<T>(&self, candidates: &[(T, f64)], k: usize) -> Vec<T>
    where
        T: Clone + Eq + Hash,
    {
        self.select_with_rng(candidates, k, &mut rand::thread_rng())
    }

    /// Same as `select` with a caller-supplied RNG.
    ///
    /// Non-positive or non-finite weights are dropped; a repeated id keeps its
    /// first weight.
    pub fn select_with_rng<T, R>(&self, candidates: &[(T, f64)], k: usize, rng: &mut R) -> Vec<T>
    where
        T: Clone + Eq + Hash,
        R: Rng,
    {
        let mut seen = HashSet::new();
        let mut pool: Vec<(T, f64)> = candidates
            .iter()
            .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
            .filter(|(id, _)| seen.insert(id.clone()))
            .cloned()
            .collect();

        let take = k.min(pool.len());
        let mut selected = Vec::with_capacity(take);

        while selected.len() < take {
            let total: f64 = pool.iter().map(|(_, weight)| weight).sum();
            if !(total.is_finite() && total > 0.0) {
                break;
            }

            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            // Rounding can leave target just past the last boundary
            let mut index = pool.len() - 1;
            for (i, (_, weight)) in pool.iter().enumerate() {
                cumulative += weight;
                if target < cumulative {
                    index = i;
                    break;
                }
            }

            let (id, _) = pool.swap_remove(index);
            selected.push(id);
        }

        selected
    }

    /// Randomize presentation order
    pub fn shuffle<T, R>(&self, items: &mut [T], rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        items.shuffle(rng);
    }
}
