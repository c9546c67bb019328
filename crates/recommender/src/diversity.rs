//! Greedy diversity-maximizing top-K selection.
//!
//! Picking `k` mutually dissimilar items is a max-dispersion problem and
//! NP-hard; this selector approximates it greedily:
//!
//! 1. Seed with the best-rated candidate (lowest id on ties).
//! 2. Repeatedly add the candidate whose summed *squared* similarity to the
//!    already selected items is smallest (lowest id on ties). Squaring makes one
//!    strong similarity cost more than several weak ones.
//! 3. Return the selection ordered by rating, best first.
//!
//! Candidates are iterated in id order throughout, so results are reproducible.

use itemrec_core::config::ShortfallPolicy;
use itemrec_core::types::{by_rating_desc, CandidateInfo, ItemId};
use itemrec_core::{RecommendError, RecommendResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::similarity::SimilarityMatrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub item_id: ItemId,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiverseTopKSelector {
    shortfall: ShortfallPolicy,
}

impl DiverseTopKSelector {
    pub fn new(shortfall: ShortfallPolicy) -> Self {
        Self { shortfall }
    }

    pub fn select(
        &self,
        candidates: &BTreeMap<ItemId, CandidateInfo>,
        similarity: &SimilarityMatrix,
        k: usize,
    ) -> RecommendResult<Vec<SelectedItem>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let available = candidates.len();
        if available == 0 || (self.shortfall == ShortfallPolicy::Fail && available < k) {
            return Err(RecommendError::InsufficientCandidates {
                requested: k,
                available,
            });
        }

        let mut remaining: Vec<(&str, Option<f64>)> = candidates
            .iter()
            .map(|(id, info)| (id.as_str(), info.rating))
            .collect();

        // `min_by` keeps the first of equal elements; ids are already ascending.
        let seed_pos = remaining
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| by_rating_desc(**a, **b))
            .map(|(pos, _)| pos)
            .unwrap_or(0);
        let seed = remaining.remove(seed_pos);
        let mut selected = vec![seed];

        // penalty[i] = sum of squared similarities between remaining[i] and the selection.
        let mut penalty: Vec<f64> = remaining
            .iter()
            .map(|(id, _)| squared(similarity, id, seed.0))
            .collect();

        while selected.len() < k && !remaining.is_empty() {
            let mut best = 0;
            for pos in 1..penalty.len() {
                if penalty[pos] < penalty[best] {
                    best = pos;
                }
            }
            let picked = remaining.remove(best);
            penalty.remove(best);
            for (pos, (id, _)) in remaining.iter().enumerate() {
                penalty[pos] += squared(similarity, id, picked.0);
            }
            selected.push(picked);
        }

        selected.sort_by(|a, b| by_rating_desc(*a, *b));
        Ok(selected
            .into_iter()
            .map(|(id, rating)| SelectedItem {
                item_id: id.to_string(),
                rating,
            })
            .collect())
    }
}

fn squared(similarity: &SimilarityMatrix, a: &str, b: &str) -> f64 {
    let score = similarity.score(a, b).unwrap_or(0.0);
    score * score
}
