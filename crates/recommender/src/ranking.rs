//! Plain rating-based ranking used by the naive strategies.

use itemrec_core::types::{by_rating_desc, ItemId};
use itemrec_core::RecommendResult;
use rand::seq::SliceRandom;

use crate::catalog::CatalogStore;
use crate::diversity::SelectedItem;

/// Ranks item ids by rating, best first.
///
/// Ids unknown to the store are dropped. With a non-zero `shuffle_pool`, the
/// best `shuffle_pool` items are shuffled before truncating to `limit`.
pub struct TopRatedRanker<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
    shuffle_pool: usize,
}

impl<'a, S: CatalogStore + ?Sized> TopRatedRanker<'a, S> {
    pub fn new(store: &'a S, shuffle_pool: usize) -> Self {
        Self { store, shuffle_pool }
    }

    pub fn rank(&self, ids: &[ItemId], limit: usize) -> RecommendResult<Vec<SelectedItem>> {
        let mut unique: Vec<ItemId> = ids.to_vec();
        unique.sort();
        unique.dedup();

        let found = self.store.items_batch(&unique)?;
        let mut rated: Vec<SelectedItem> = unique
            .into_iter()
            .filter_map(|id| {
                let rating = found.get(&id)?.rating;
                Some(SelectedItem { item_id: id, rating })
            })
            .collect();
        rated.sort_by(|a, b| {
            by_rating_desc((a.item_id.as_str(), a.rating), (b.item_id.as_str(), b.rating))
        });

        if self.shuffle_pool > 0 {
            rated.truncate(self.shuffle_pool.max(limit));
            rated.shuffle(&mut rand::thread_rng());
        }
        rated.truncate(limit);
        Ok(rated)
    }
}
