//! Catalog diagnostics: edge symmetry per relation kind, out-degree
//! distribution and category sizes.

use itemrec_core::types::{CategoryId, ItemId, RelationKind};
use itemrec_core::RecommendResult;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::catalog::CatalogStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SymmetryCount {
    /// Edges whose reverse edge of the same kind exists.
    pub symmetric: usize,
    pub one_directional: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationStats {
    pub items_sampled: usize,
    pub edges: usize,
    pub by_kind: BTreeMap<RelationKind, SymmetryCount>,
    /// Out-degree -> number of sampled items with that many edges.
    pub out_degree: BTreeMap<usize, usize>,
}

impl RelationStats {
    pub fn collect<S: CatalogStore + ?Sized>(store: &S, sample: &[ItemId]) -> RecommendResult<Self> {
        let mut stats = RelationStats {
            items_sampled: sample.len(),
            ..Default::default()
        };
        let outgoing = store.related_items_batch(sample)?;

        let targets: Vec<ItemId> = outgoing
            .values()
            .flatten()
            .map(|(target, _)| target.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let reverse = store.related_items_batch(&targets)?;

        for item_id in sample {
            let edges = outgoing.get(item_id).map(Vec::as_slice).unwrap_or_default();
            *stats.out_degree.entry(edges.len()).or_insert(0) += 1;
            stats.edges += edges.len();

            for (target, kind) in edges {
                let mirrored = reverse
                    .get(target)
                    .is_some_and(|back| back.iter().any(|(t, k)| t == item_id && k == kind));
                let count = stats.by_kind.entry(*kind).or_default();
                if mirrored {
                    count.symmetric += 1;
                } else {
                    count.one_directional += 1;
                }
            }
        }
        Ok(stats)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub categories: usize,
    /// Category -> number of items assigned directly to it.
    pub items_per_category: BTreeMap<CategoryId, usize>,
    /// Item count -> number of categories holding exactly that many items.
    pub size_histogram: BTreeMap<usize, usize>,
}

impl CategoryStats {
    pub fn collect<S: CatalogStore + ?Sized>(store: &S) -> RecommendResult<Self> {
        let mut stats = CategoryStats::default();
        for category in store.category_ids()? {
            let size = store.items_in_category(category)?.len();
            stats.items_per_category.insert(category, size);
            *stats.size_histogram.entry(size).or_insert(0) += 1;
        }
        stats.categories = stats.items_per_category.len();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use itemrec_core::types::Item;

    #[test]
    fn test_symmetry_is_per_kind() {
        let catalog = InMemoryCatalog::new();
        catalog.add_relation("a", "b", RelationKind::AlsoBought);
        catalog.add_relation("b", "a", RelationKind::AlsoBought);
        catalog.add_relation("a", "c", RelationKind::AlsoViewed);
        catalog.add_relation("c", "a", RelationKind::AlsoBought);

        let stats =
            RelationStats::collect(&catalog, &["a".to_string(), "z".to_string()]).unwrap();
        assert_eq!(stats.items_sampled, 2);
        assert_eq!(stats.edges, 2);
        assert_eq!(
            stats.by_kind[&RelationKind::AlsoBought],
            SymmetryCount {
                symmetric: 1,
                one_directional: 0
            }
        );
        assert_eq!(
            stats.by_kind[&RelationKind::AlsoViewed],
            SymmetryCount {
                symmetric: 0,
                one_directional: 1
            }
        );
        assert_eq!(stats.out_degree[&2], 1);
        assert_eq!(stats.out_degree[&0], 1);
    }

    #[test]
    fn test_category_size_histogram() {
        let catalog = InMemoryCatalog::new();
        let toys = catalog.ensure_category_path(&["Toys"]).unwrap();
        let puzzles = catalog.ensure_category_path(&["Toys", "Puzzles"]).unwrap();
        let cards = catalog.ensure_category_path(&["Toys", "Cards"]).unwrap();
        for (id, category) in [("p1", puzzles), ("p2", puzzles), ("c1", cards)] {
            catalog.add_item(Item::new(id, None));
            catalog.assign_category(id, category);
        }

        let stats = CategoryStats::collect(&catalog).unwrap();
        assert_eq!(stats.categories, 3);
        assert_eq!(stats.items_per_category[&toys], 0);
        assert_eq!(stats.items_per_category[&puzzles], 2);
        assert_eq!(stats.items_per_category[&cards], 1);
        assert_eq!(
            stats.size_histogram,
            BTreeMap::from([(0, 1), (1, 1), (2, 1)])
        );
    }
}
