//! Pairwise co-occurrence similarity between candidates.

use itemrec_core::types::{CandidateInfo, ItemId};
use std::collections::{BTreeMap, HashMap};

/// Symmetric similarity over a fixed id set.
///
/// Each unordered pair is stored once, so `score(a, b) == score(b, a)` holds
/// by construction. The diagonal is never stored and reads as `None`.
#[derive(Debug, Clone, Default)]
pub struct SimilarityMatrix {
    ids: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
    scores: HashMap<(usize, usize), f64>,
}

impl SimilarityMatrix {
    /// All-zero matrix over `ids`.
    pub fn zeros<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemId>,
    {
        let mut ids: Vec<ItemId> = ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        let index = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Self {
            ids,
            index,
            scores: HashMap::new(),
        }
    }

    /// Co-occurrence matrix over a candidate set.
    ///
    /// For every candidate, each related id that is itself a candidate adds its
    /// multiplicity to the pair's score. An edge seen from either endpoint
    /// counts toward the same undirected score.
    pub fn build(candidates: &BTreeMap<ItemId, CandidateInfo>) -> Self {
        let mut matrix = Self::zeros(candidates.keys().cloned());
        for (id, info) in candidates {
            let mut tally: BTreeMap<&str, usize> = BTreeMap::new();
            for related in &info.related {
                if related != id && candidates.contains_key(related) {
                    *tally.entry(related.as_str()).or_insert(0) += 1;
                }
            }
            for (related, count) in tally {
                matrix.add(id, related, count as f64);
            }
        }
        matrix
    }

    /// Add `amount` to the symmetric score of `(a, b)`. Ignores the diagonal and unknown ids.
    pub fn add(&mut self, a: &str, b: &str, amount: f64) {
        if let Some(key) = self.key(a, b) {
            *self.scores.entry(key).or_insert(0.0) += amount;
        }
    }

    /// Score of a distinct known pair; `None` for `(a, a)` or ids outside the matrix.
    pub fn score(&self, a: &str, b: &str) -> Option<f64> {
        self.key(a, b)
            .map(|key| self.scores.get(&key).copied().unwrap_or(0.0))
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn key(&self, a: &str, b: &str) -> Option<(usize, usize)> {
        let ia = *self.index.get(a)?;
        let ib = *self.index.get(b)?;
        match ia.cmp(&ib) {
            std::cmp::Ordering::Less => Some((ia, ib)),
            std::cmp::Ordering::Greater => Some((ib, ia)),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(related: &[&str]) -> CandidateInfo {
        CandidateInfo {
            rating: Some(3.0),
            related: related.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_build_accumulates_both_directions() {
        let mut candidates = BTreeMap::new();
        candidates.insert("a".to_string(), candidate(&["b", "b", "c", "outside"]));
        candidates.insert("b".to_string(), candidate(&["a"]));
        candidates.insert("c".to_string(), candidate(&[]));

        let matrix = SimilarityMatrix::build(&candidates);
        // a->b twice plus b->a once.
        assert_eq!(matrix.score("a", "b"), Some(3.0));
        assert_eq!(matrix.score("a", "c"), Some(1.0));
        assert_eq!(matrix.score("b", "c"), Some(0.0));
        assert!(!matrix.contains("outside"));
    }

    #[test]
    fn test_symmetry_over_all_pairs() {
        let mut candidates = BTreeMap::new();
        candidates.insert("a".to_string(), candidate(&["b", "c", "d"]));
        candidates.insert("b".to_string(), candidate(&["d", "d"]));
        candidates.insert("c".to_string(), candidate(&["a"]));
        candidates.insert("d".to_string(), candidate(&["c", "b"]));

        let matrix = SimilarityMatrix::build(&candidates);
        for a in matrix.ids() {
            for b in matrix.ids() {
                if a != b {
                    assert_eq!(matrix.score(a, b), matrix.score(b, a));
                }
            }
        }
    }

    #[test]
    fn test_diagonal_is_never_stored() {
        let mut candidates = BTreeMap::new();
        candidates.insert("a".to_string(), candidate(&["a", "a", "b"]));
        candidates.insert("b".to_string(), candidate(&[]));

        let mut matrix = SimilarityMatrix::build(&candidates);
        matrix.add("b", "b", 10.0);
        assert_eq!(matrix.score("a", "a"), None);
        assert_eq!(matrix.score("b", "b"), None);
        assert_eq!(matrix.score("a", "b"), Some(1.0));
    }

    #[test]
    fn test_zeros() {
        let matrix = SimilarityMatrix::zeros(["y", "x", "y"]);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.ids(), &["x".to_string(), "y".to_string()]);
        assert_eq!(matrix.score("x", "y"), Some(0.0));
    }
}
