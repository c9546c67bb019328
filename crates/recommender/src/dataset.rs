//! JSON dataset documents loaded into an [`InMemoryCatalog`].

use itemrec_core::types::{Item, ItemId, RelationEdge, Review};
use itemrec_core::RecommendResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

use crate::catalog::InMemoryCatalog;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub items: Vec<DatasetItem>,
    #[serde(default)]
    pub relations: Vec<RelationEdge>,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetItem {
    pub id: ItemId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    /// Category hierarchies, root first, e.g. `[["Toys", "Puzzles"]]`.
    #[serde(default)]
    pub categories: Vec<Vec<String>>,
}

impl Dataset {
    pub fn from_path(path: impl AsRef<Path>) -> RecommendResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Populate a fresh catalog. Items without an explicit rating get the
    /// average of their reviews, if any.
    pub fn into_catalog(self) -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        let averages = average_ratings(&self.reviews);

        for entry in self.items {
            let rating = entry.rating.or_else(|| averages.get(&entry.id).copied());
            let mut item = Item::new(entry.id.clone(), rating);
            item.title = entry.title;
            catalog.add_item(item);
            for path in &entry.categories {
                if let Some(leaf) = catalog.ensure_category_path(path.as_slice()) {
                    catalog.assign_category(&entry.id, leaf);
                }
            }
        }
        for edge in &self.relations {
            catalog.add_relation(&edge.source, &edge.target, edge.kind);
        }
        for review in self.reviews {
            catalog.add_review(review);
        }

        info!(
            items = catalog.item_count(),
            relations = catalog.relation_count(),
            reviews = catalog.review_count(),
            "Dataset loaded"
        );
        catalog
    }
}

/// Mean review rating per item, rounded to two decimals.
pub fn average_ratings(reviews: &[Review]) -> HashMap<ItemId, f64> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for review in reviews {
        let entry = sums.entry(review.item_id.as_str()).or_insert((0.0, 0));
        entry.0 += review.rating;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(id, (sum, count))| {
            let mean = sum / count as f64;
            (id.to_string(), (mean * 100.0).round() / 100.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogStore;
    use itemrec_core::types::RelationKind;

    const SAMPLE: &str = r#"{
        "items": [
            { "id": "A", "title": "Puzzle", "rating": 4.5, "categories": [["Toys", "Puzzles"]] },
            { "id": "B", "categories": [["Toys", "Puzzles"]] },
            { "id": "C" }
        ],
        "relations": [
            { "source": "A", "target": "B", "kind": "also_bought" }
        ],
        "reviews": [
            { "user_id": "u1", "item_id": "B", "rating": 5.0 },
            { "user_id": "u2", "item_id": "B", "rating": 4.0 },
            { "user_id": "u3", "item_id": "B", "rating": 4.0 }
        ]
    }"#;

    #[test]
    fn test_load_sample_dataset() {
        let dataset: Dataset = serde_json::from_str(SAMPLE).unwrap();
        let catalog = dataset.into_catalog();

        assert_eq!(catalog.item_count(), 3);
        assert_eq!(
            catalog.related_items("A").unwrap(),
            vec![("B".to_string(), RelationKind::AlsoBought)]
        );
        let leaf = catalog.category_by_namespace("Toys.Puzzles").unwrap();
        assert_eq!(catalog.items_in_category(leaf).unwrap().len(), 2);
        assert_eq!(catalog.review_count(), 3);

        // Explicit rating kept, missing rating filled from reviews.
        assert_eq!(catalog.item("A").unwrap().unwrap().rating, Some(4.5));
        assert_eq!(catalog.item("B").unwrap().unwrap().rating, Some(4.33));
        assert_eq!(catalog.item("C").unwrap().unwrap().rating, None);
    }

    #[test]
    fn test_average_ratings_rounding() {
        let reviews = vec![
            Review::new("u1", "x", 1.0),
            Review::new("u2", "x", 2.0),
            Review::new("u3", "x", 2.0),
        ];
        let averages = average_ratings(&reviews);
        assert_eq!(averages["x"], 1.67);
    }
}
