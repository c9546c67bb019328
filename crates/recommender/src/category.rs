//! Candidate discovery through the category hierarchy.

use itemrec_core::config::CategoryTarget;
use itemrec_core::types::{CandidateInfo, CategoryId, ItemId};
use itemrec_core::RecommendResult;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use tracing::debug;

use crate::catalog::CatalogStore;

/// Categories reachable from a leaf by following parent -> child links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryClosure {
    pub leaf: CategoryId,
    /// Breadth-first visiting order, starting with `leaf`.
    pub visited: Vec<CategoryId>,
}

impl CategoryClosure {
    /// Category whose items become candidates under `target`.
    pub fn target(&self, target: CategoryTarget) -> CategoryId {
        match target {
            CategoryTarget::SeedLeaf => self.leaf,
            CategoryTarget::LastVisited => self.visited.last().copied().unwrap_or(self.leaf),
        }
    }
}

pub struct CategoryNeighborhoodFinder<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
    target: CategoryTarget,
}

impl<'a, S: CatalogStore + ?Sized> CategoryNeighborhoodFinder<'a, S> {
    pub fn new(store: &'a S, target: CategoryTarget) -> Self {
        Self { store, target }
    }

    /// Subtree closure of the seed's leaf category; `None` if the seed is uncategorized.
    pub fn closure(&self, seed: &str) -> RecommendResult<Option<CategoryClosure>> {
        let Some(leaf) = self.store.leaf_category(seed)? else {
            return Ok(None);
        };

        let mut visited = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([leaf]);
        seen.insert(leaf);
        while let Some(category) = queue.pop_front() {
            visited.push(category);
            for child in self.store.child_categories(category)? {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        Ok(Some(CategoryClosure { leaf, visited }))
    }

    /// Items of the configured target category, seed excluded. Candidates carry
    /// no related-id lists, so their similarity is all zero.
    pub fn expand_by_category(&self, seed: &str) -> RecommendResult<BTreeMap<ItemId, CandidateInfo>> {
        let Some(closure) = self.closure(seed)? else {
            debug!(item_id = %seed, "Seed has no category");
            return Ok(BTreeMap::new());
        };
        let category = closure.target(self.target);
        debug!(
            item_id = %seed,
            leaf = closure.leaf,
            closure = closure.visited.len(),
            category,
            "Category closure computed"
        );

        let ids = self.collect_items(&[category], seed)?;
        let mut attributes = self.store.items_batch(&ids)?;
        Ok(ids
            .into_iter()
            .map(|id| {
                let rating = attributes.remove(&id).and_then(|item| item.rating);
                (id, CandidateInfo::new(rating))
            })
            .collect())
    }

    /// Other items sharing the seed's leaf category.
    pub fn same_category_items(&self, seed: &str) -> RecommendResult<Vec<ItemId>> {
        match self.store.leaf_category(seed)? {
            Some(leaf) => self.collect_items(&[leaf], seed),
            None => Ok(Vec::new()),
        }
    }

    /// Items of the leaf's parent and of every child of that parent.
    /// A root leaf only contributes its own items.
    pub fn sibling_category_items(&self, seed: &str) -> RecommendResult<Vec<ItemId>> {
        let Some(leaf) = self.store.leaf_category(seed)? else {
            return Ok(Vec::new());
        };
        let categories = match self.store.parent_category(leaf)? {
            Some(parent) => {
                let mut siblings = self.store.child_categories(parent)?;
                siblings.push(parent);
                siblings
            }
            None => vec![leaf],
        };
        self.collect_items(&categories, seed)
    }

    fn collect_items(&self, categories: &[CategoryId], seed: &str) -> RecommendResult<Vec<ItemId>> {
        let mut items = BTreeSet::new();
        for category in categories {
            items.extend(self.store.items_in_category(*category)?);
        }
        items.remove(seed);
        Ok(items.into_iter().collect())
    }
}
