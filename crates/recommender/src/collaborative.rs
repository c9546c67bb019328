//! Item-based collaborative filtering: exact cosine nearest neighbours over
//! sparse item-by-user rating vectors.

use itemrec_core::types::{ItemId, Review};
use itemrec_core::{RecommendError, RecommendResult};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// A neighbour of the query item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub item_id: ItemId,
    /// Cosine distance to the query item, `1 - cos`.
    pub distance: f64,
}

/// Immutable item-by-user rating matrix.
///
/// Rows are distinct item ids in ascending order, columns distinct user ids in
/// ascending order, so identical review data always yields identical indices.
/// Missing entries are zero.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    item_ids: Vec<ItemId>,
    item_index: HashMap<ItemId, usize>,
    user_ids: Vec<String>,
    /// Per row: `(column, rating)` sorted by column.
    rows: Vec<Vec<(usize, f64)>>,
    norms: Vec<f64>,
}

impl RatingMatrix {
    /// Pivot reviews into the matrix. When a user reviewed the same item more
    /// than once, the last review wins.
    pub fn build(reviews: &[Review]) -> RecommendResult<Self> {
        if reviews.is_empty() {
            return Err(RecommendError::EmptyDataset);
        }

        let mut cells: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
        let mut users: BTreeMap<&str, usize> = BTreeMap::new();
        for review in reviews {
            cells
                .entry(review.item_id.as_str())
                .or_default()
                .insert(review.user_id.as_str(), review.rating);
            users.insert(review.user_id.as_str(), 0);
        }
        for (column, slot) in users.values_mut().enumerate() {
            *slot = column;
        }

        let mut item_ids = Vec::with_capacity(cells.len());
        let mut rows = Vec::with_capacity(cells.len());
        for (item_id, ratings) in cells {
            let mut row: Vec<(usize, f64)> = ratings
                .into_iter()
                .filter(|(_, rating)| *rating != 0.0)
                .map(|(user, rating)| (users[user], rating))
                .collect();
            row.sort_by_key(|(column, _)| *column);
            item_ids.push(item_id.to_string());
            rows.push(row);
        }

        let norms = rows
            .iter()
            .map(|row| row.iter().map(|(_, r)| r * r).sum::<f64>().sqrt())
            .collect();
        let item_index = item_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        Ok(Self {
            item_ids,
            item_index,
            user_ids: users.into_keys().map(str::to_string).collect(),
            rows,
            norms,
        })
    }

    pub fn item_count(&self) -> usize {
        self.item_ids.len()
    }

    pub fn user_count(&self) -> usize {
        self.user_ids.len()
    }

    pub fn row_of(&self, item_id: &str) -> Option<usize> {
        self.item_index.get(item_id).copied()
    }

    pub fn item_at(&self, row: usize) -> Option<&str> {
        self.item_ids.get(row).map(String::as_str)
    }

    pub fn user_ids(&self) -> &[String] {
        &self.user_ids
    }

    /// Mean of the non-zero ratings in an item's row.
    pub fn mean_rating(&self, item_id: &str) -> Option<f64> {
        let row = &self.rows[self.row_of(item_id)?];
        if row.is_empty() {
            return None;
        }
        Some(row.iter().map(|(_, r)| r).sum::<f64>() / row.len() as f64)
    }

    /// Exact brute-force search: the `n` items closest to `item_id` by cosine
    /// distance, most similar first. The query item itself is never returned;
    /// equal distances are ordered by row index.
    pub fn nearest(&self, item_id: &str, n: usize) -> RecommendResult<Vec<Neighbor>> {
        let seed = self
            .row_of(item_id)
            .ok_or_else(|| RecommendError::UnknownItem(item_id.to_string()))?;

        let mut scored: Vec<(f64, usize)> = (0..self.rows.len())
            .filter(|&row| row != seed)
            .map(|row| (self.cosine_distance(seed, row), row))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(n);

        Ok(scored
            .into_iter()
            .map(|(distance, row)| Neighbor {
                item_id: self.item_ids[row].clone(),
                distance,
            })
            .collect())
    }

    fn cosine_distance(&self, a: usize, b: usize) -> f64 {
        let denom = self.norms[a] * self.norms[b];
        if denom == 0.0 {
            return 1.0;
        }
        let similarity = sparse_dot(&self.rows[a], &self.rows[b]) / denom;
        1.0 - similarity.clamp(-1.0, 1.0)
    }
}

/// Dot product of two column-sorted sparse rows.
fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j, mut dot) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

/// Owns the current [`RatingMatrix`] snapshot.
///
/// Rebuilds construct a complete new matrix before publishing it, so readers
/// only ever hold a finished snapshot. Rebuilds are serialized.
pub struct CollaborativeKnnEngine {
    snapshot: RwLock<Option<Arc<RatingMatrix>>>,
    rebuild_lock: Mutex<()>,
}

impl CollaborativeKnnEngine {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Build a fresh matrix from the full review history and publish it.
    pub fn rebuild(&self, reviews: &[Review]) -> RecommendResult<Arc<RatingMatrix>> {
        let _guard = self.rebuild_lock.lock();
        self.rebuild_locked(reviews)
    }

    /// Current snapshot, building it with `load` if none has been published yet.
    pub fn snapshot_or_build<F>(&self, load: F) -> RecommendResult<Arc<RatingMatrix>>
    where
        F: FnOnce() -> RecommendResult<Vec<Review>>,
    {
        if let Some(matrix) = self.snapshot() {
            return Ok(matrix);
        }
        let _guard = self.rebuild_lock.lock();
        // Another caller may have finished a build while we waited.
        if let Some(matrix) = self.snapshot() {
            return Ok(matrix);
        }
        self.rebuild_locked(&load()?)
    }

    pub fn snapshot(&self) -> Option<Arc<RatingMatrix>> {
        self.snapshot.read().clone()
    }

    /// `n` item ids most similar to `item_id`, most similar first.
    pub fn recommend(&self, item_id: &str, n: usize) -> RecommendResult<Vec<ItemId>> {
        let matrix = self.snapshot().ok_or(RecommendError::EmptyDataset)?;
        Ok(matrix
            .nearest(item_id, n)?
            .into_iter()
            .map(|neighbor| neighbor.item_id)
            .collect())
    }

    fn rebuild_locked(&self, reviews: &[Review]) -> RecommendResult<Arc<RatingMatrix>> {
        let started = Instant::now();
        let matrix = Arc::new(RatingMatrix::build(reviews)?);
        *self.snapshot.write() = Some(matrix.clone());

        let elapsed_ms = started.elapsed().as_millis() as u64;
        metrics::counter!("knn.rebuilds").increment(1);
        metrics::histogram!("knn.rebuild_latency_ms").record(elapsed_ms as f64);
        info!(
            items = matrix.item_count(),
            users = matrix.user_count(),
            reviews = reviews.len(),
            elapsed_ms,
            "Rating matrix rebuilt"
        );
        Ok(matrix)
    }
}

impl Default for CollaborativeKnnEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_reviews() -> Vec<Review> {
        vec![
            Review::new("u1", "i1", 5.0),
            Review::new("u1", "i2", 1.0),
            Review::new("u2", "i1", 4.0),
            Review::new("u2", "i3", 5.0),
        ]
    }

    #[test]
    fn test_small_matrix_query() {
        let matrix = RatingMatrix::build(&small_reviews()).unwrap();
        assert_eq!(matrix.item_count(), 3);
        assert_eq!(matrix.user_count(), 2);

        // i1 = [5, 4], i2 = [1, 0], i3 = [0, 5].
        // cos(i1, i2) = 5 / sqrt(41) ~ 0.781, cos(i1, i3) = 20 / (sqrt(41) * 5) ~ 0.625.
        let neighbors = matrix.nearest("i1", 1).unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].item_id, "i2");
        assert!((neighbors[0].distance - (1.0 - 5.0 / 41f64.sqrt())).abs() < 1e-12);

        let both = matrix.nearest("i1", 2).unwrap();
        let ids: Vec<_> = both.iter().map(|n| n.item_id.as_str()).collect();
        assert_eq!(ids, vec!["i2", "i3"]);
        assert!(both[0].distance <= both[1].distance);
    }

    #[test]
    fn test_self_exclusion_and_shortfall() {
        let matrix = RatingMatrix::build(&small_reviews()).unwrap();
        let neighbors = matrix.nearest("i2", 10).unwrap();
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.iter().all(|n| n.item_id != "i2"));
        // i2 and i3 share no users: distance 1.
        assert_eq!(neighbors[1].item_id, "i3");
        assert_eq!(neighbors[1].distance, 1.0);
    }

    #[test]
    fn test_identical_vectors_do_not_displace_the_seed() {
        let reviews = vec![
            Review::new("u1", "a", 2.0),
            Review::new("u1", "b", 4.0),
            Review::new("u2", "c", 3.0),
        ];
        let matrix = RatingMatrix::build(&reviews).unwrap();
        let neighbors = matrix.nearest("b", 1).unwrap();
        assert_eq!(neighbors[0].item_id, "a");
        assert!(neighbors[0].distance.abs() < 1e-12);
    }

    #[test]
    fn test_unknown_item_and_empty_dataset() {
        let matrix = RatingMatrix::build(&small_reviews()).unwrap();
        assert!(matches!(
            matrix.nearest("nope", 1),
            Err(RecommendError::UnknownItem(id)) if id == "nope"
        ));
        assert!(matches!(
            RatingMatrix::build(&[]),
            Err(RecommendError::EmptyDataset)
        ));
    }

    #[test]
    fn test_rebuild_is_reproducible() {
        let mut shuffled = small_reviews();
        shuffled.reverse();
        let first = RatingMatrix::build(&small_reviews()).unwrap();
        let second = RatingMatrix::build(&shuffled).unwrap();

        assert_eq!(first.user_ids(), second.user_ids());
        for item in ["i1", "i2", "i3"] {
            assert_eq!(first.row_of(item), second.row_of(item));
            assert_eq!(first.nearest(item, 2).unwrap(), second.nearest(item, 2).unwrap());
        }
        assert_eq!(first.item_at(0), Some("i1"));
    }

    #[test]
    fn test_duplicate_review_last_wins() {
        let reviews = vec![
            Review::new("u1", "a", 1.0),
            Review::new("u1", "a", 5.0),
            Review::new("u2", "a", 3.0),
        ];
        let matrix = RatingMatrix::build(&reviews).unwrap();
        assert_eq!(matrix.mean_rating("a"), Some(4.0));
    }

    #[test]
    fn test_engine_snapshot_lifecycle() {
        let engine = CollaborativeKnnEngine::new();
        assert!(matches!(engine.recommend("i1", 1), Err(RecommendError::EmptyDataset)));

        let built = engine.snapshot_or_build(|| Ok(small_reviews())).unwrap();
        // A published snapshot is reused without calling the loader.
        let reused = engine
            .snapshot_or_build(|| panic!("loader must not run"))
            .unwrap();
        assert!(Arc::ptr_eq(&built, &reused));
        assert_eq!(engine.recommend("i1", 1).unwrap(), vec!["i2".to_string()]);

        // Rebuilding swaps in a new snapshot; old readers keep theirs.
        let rebuilt = engine
            .rebuild(&[Review::new("u9", "x", 1.0), Review::new("u9", "y", 2.0)])
            .unwrap();
        assert!(!Arc::ptr_eq(&built, &rebuilt));
        assert_eq!(built.item_count(), 3);
        assert_eq!(engine.recommend("x", 5).unwrap(), vec!["y".to_string()]);
        assert!(matches!(engine.recommend("i1", 1), Err(RecommendError::UnknownItem(_))));
    }

    fn catalog_reviews(prefix: &str, items: usize) -> Vec<Review> {
        (0..items)
            .flat_map(|i| {
                let item = format!("{prefix}{i}");
                [
                    Review::new("u1", item.clone(), 1.0 + (i % 5) as f64),
                    Review::new("u2", item, 5.0 - (i % 4) as f64),
                ]
            })
            .collect()
    }

    #[test]
    fn test_readers_only_see_complete_snapshots() {
        let engine = CollaborativeKnnEngine::new();
        let small = catalog_reviews("a", 5);
        let large = catalog_reviews("b", 40);
        engine.rebuild(&small).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..50 {
                    let reviews = if round % 2 == 0 { &large } else { &small };
                    engine.rebuild(reviews).unwrap();
                }
            });
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let snapshot = engine.snapshot().unwrap();
                        let (seed, items) = match snapshot.item_count() {
                            5 => ("a0", 5),
                            40 => ("b0", 40),
                            other => panic!("partial snapshot with {other} items"),
                        };
                        assert_eq!(snapshot.user_count(), 2);
                        assert_eq!(snapshot.nearest(seed, 100).unwrap().len(), items - 1);

                        match engine.recommend("a0", 100) {
                            Ok(ids) => assert_eq!(ids.len(), 4),
                            Err(RecommendError::UnknownItem(_)) => {}
                            Err(e) => panic!("unexpected error {e}"),
                        }
                    }
                });
            }
        });
    }
}
