//! Breadth-first candidate discovery over the item relation graph.

use itemrec_core::types::{CandidateInfo, ItemId, RelationSelector};
use itemrec_core::RecommendResult;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::catalog::CatalogStore;

/// Expands a seed item into a working candidate set.
///
/// Round `i` runs only while fewer than `thresholds[i]` items have been
/// discovered, so the number of rounds is bounded by `thresholds.len()`.
/// A round that discovers nothing new ends the expansion early.
pub struct NeighborhoodExpander<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
    thresholds: &'a [usize],
    relation: RelationSelector,
}

impl<'a, S: CatalogStore + ?Sized> NeighborhoodExpander<'a, S> {
    pub fn new(store: &'a S, thresholds: &'a [usize]) -> Self {
        Self {
            store,
            thresholds,
            relation: RelationSelector::All,
        }
    }

    /// Follow only edges accepted by `relation` (all kinds by default).
    pub fn with_relation(mut self, relation: RelationSelector) -> Self {
        self.relation = relation;
        self
    }

    /// Discovered items keyed by id, seed excluded, each carrying its related-id
    /// list. Items left unfetched when the rounds stop get their edges in one
    /// extra batch, restricted to already discovered ids.
    pub fn expand(&self, seed: &str) -> RecommendResult<BTreeMap<ItemId, CandidateInfo>> {
        let mut discovered: BTreeSet<ItemId> = BTreeSet::new();
        discovered.insert(seed.to_string());
        let mut frontier: Vec<ItemId> = vec![seed.to_string()];
        let mut related_cache: HashMap<ItemId, Vec<ItemId>> = HashMap::new();

        for (round, &threshold) in self.thresholds.iter().enumerate() {
            if discovered.len() >= threshold {
                debug!(round, discovered = discovered.len(), threshold, "Expansion threshold reached");
                break;
            }

            let fetched = self.store.related_items_batch(&frontier)?;
            let mut fresh: BTreeSet<ItemId> = BTreeSet::new();
            for id in &frontier {
                let related: Vec<ItemId> = fetched
                    .get(id)
                    .into_iter()
                    .flatten()
                    .filter(|(_, kind)| self.relation.accepts(*kind))
                    .map(|(target, _)| target.clone())
                    .collect();
                fresh.extend(
                    related
                        .iter()
                        .filter(|target| !discovered.contains(*target))
                        .cloned(),
                );
                related_cache.insert(id.clone(), related);
            }

            debug!(round, frontier = frontier.len(), fresh = fresh.len(), "Expansion round");
            if fresh.is_empty() {
                break;
            }
            discovered.extend(fresh.iter().cloned());
            frontier = fresh.into_iter().collect();
        }

        let unfetched: Vec<ItemId> = discovered
            .iter()
            .filter(|id| !related_cache.contains_key(*id))
            .cloned()
            .collect();
        if !unfetched.is_empty() {
            let fetched = self.store.related_items_batch(&unfetched)?;
            for id in unfetched {
                let related: Vec<ItemId> = fetched
                    .get(&id)
                    .into_iter()
                    .flatten()
                    .filter(|(target, kind)| self.relation.accepts(*kind) && discovered.contains(target))
                    .map(|(target, _)| target.clone())
                    .collect();
                related_cache.insert(id, related);
            }
        }

        discovered.remove(seed);
        let ids: Vec<ItemId> = discovered.into_iter().collect();
        let mut attributes = self.store.items_batch(&ids)?;

        Ok(ids
            .into_iter()
            .map(|id| {
                let rating = attributes.remove(&id).and_then(|item| item.rating);
                let related = related_cache.remove(&id).unwrap_or_default();
                (id, CandidateInfo { rating, related })
            })
            .collect())
    }
}
