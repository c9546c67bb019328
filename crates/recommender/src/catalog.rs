//! Read-side access to items, relation edges, categories and reviews.
//!
//! The recommender only ever reads through [`CatalogStore`]. [`InMemoryCatalog`]
//! is the in-process implementation used by the CLI and the tests.

use dashmap::DashMap;
use itemrec_core::types::{Category, CategoryId, Item, ItemId, RelationKind, Review};
use itemrec_core::RecommendResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Store collaborator consumed by the recommendation components.
///
/// Failures surface as `StoreUnavailable` and are never retried by callers.
pub trait CatalogStore: Send + Sync {
    /// Outgoing relation edges of `item_id`, every kind included.
    fn related_items(&self, item_id: &str) -> RecommendResult<Vec<(ItemId, RelationKind)>>;

    /// Item attributes, `None` when the item is unknown.
    fn item(&self, item_id: &str) -> RecommendResult<Option<Item>>;

    /// First category the item is assigned to.
    fn leaf_category(&self, item_id: &str) -> RecommendResult<Option<CategoryId>>;

    fn parent_category(&self, category_id: CategoryId) -> RecommendResult<Option<CategoryId>>;

    fn child_categories(&self, category_id: CategoryId) -> RecommendResult<Vec<CategoryId>>;

    fn items_in_category(&self, category_id: CategoryId) -> RecommendResult<Vec<ItemId>>;

    fn all_reviews(&self) -> RecommendResult<Vec<Review>>;

    /// Every item id in the store, sorted.
    fn item_ids(&self) -> RecommendResult<Vec<ItemId>>;

    /// Every category id in the store, sorted.
    fn category_ids(&self) -> RecommendResult<Vec<CategoryId>>;

    /// Batched form of [`CatalogStore::related_items`]. Remote stores should
    /// override this to fetch a whole traversal round in one round-trip.
    fn related_items_batch(
        &self,
        item_ids: &[ItemId],
    ) -> RecommendResult<HashMap<ItemId, Vec<(ItemId, RelationKind)>>> {
        item_ids
            .iter()
            .map(|id| Ok((id.clone(), self.related_items(id)?)))
            .collect()
    }

    /// Batched form of [`CatalogStore::item`]; unknown ids are absent from the result.
    fn items_batch(&self, item_ids: &[ItemId]) -> RecommendResult<HashMap<ItemId, Item>> {
        let mut found = HashMap::with_capacity(item_ids.len());
        for id in item_ids {
            if let Some(item) = self.item(id)? {
                found.insert(id.clone(), item);
            }
        }
        Ok(found)
    }
}

/// `DashMap`-backed catalog. Writes happen while loading; reads are lock-free.
pub struct InMemoryCatalog {
    items: DashMap<ItemId, Item>,
    relations: DashMap<ItemId, Vec<(ItemId, RelationKind)>>,
    categories: DashMap<CategoryId, Category>,
    category_by_namespace: DashMap<String, CategoryId>,
    children: DashMap<CategoryId, Vec<CategoryId>>,
    category_items: DashMap<CategoryId, Vec<ItemId>>,
    reviews: RwLock<Vec<Review>>,
    next_category_id: AtomicU64,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            relations: DashMap::new(),
            categories: DashMap::new(),
            category_by_namespace: DashMap::new(),
            children: DashMap::new(),
            category_items: DashMap::new(),
            reviews: RwLock::new(Vec::new()),
            next_category_id: AtomicU64::new(1),
        }
    }

    /// Insert or replace an item. Category assignments listed on the item are
    /// indexed; memberships of a replaced item that the new one lacks are dropped.
    pub fn add_item(&self, item: Item) {
        let id = item.id.clone();
        let categories = item.categories.clone();
        if let Some(previous) = self.items.insert(id.clone(), item) {
            for category_id in previous.categories.iter().filter(|c| !categories.contains(c)) {
                self.remove_membership(*category_id, &id);
            }
        }
        for category_id in &categories {
            self.index_membership(*category_id, &id);
        }
    }

    pub fn add_relation(&self, source: &str, target: &str, kind: RelationKind) {
        self.relations
            .entry(source.to_string())
            .or_default()
            .push((target.to_string(), kind));
    }

    /// Insert a category unless one with the same namespace exists; returns its id.
    pub fn insert_category(&self, parent_id: Option<CategoryId>, namespace: &str, name: &str) -> CategoryId {
        if let Some(existing) = self.category_by_namespace.get(namespace) {
            return *existing;
        }
        let id = self.next_category_id.fetch_add(1, Ordering::Relaxed);
        self.categories.insert(
            id,
            Category {
                id,
                parent_id,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
        );
        self.category_by_namespace.insert(namespace.to_string(), id);
        if let Some(parent) = parent_id {
            self.children.entry(parent).or_default().push(id);
        }
        id
    }

    /// Create every missing node along a hierarchy path and return the leaf id.
    /// Returns `None` for an empty path.
    pub fn ensure_category_path<S: AsRef<str>>(&self, path: &[S]) -> Option<CategoryId> {
        let mut parent = None;
        let mut namespace = String::new();
        for name in path {
            let name = name.as_ref();
            if !namespace.is_empty() {
                namespace.push('.');
            }
            namespace.push_str(name);
            parent = Some(self.insert_category(parent, &namespace, name));
        }
        parent
    }

    pub fn assign_category(&self, item_id: &str, category_id: CategoryId) {
        if let Some(mut item) = self.items.get_mut(item_id) {
            if item.categories.contains(&category_id) {
                return;
            }
            item.categories.push(category_id);
        }
        self.index_membership(category_id, item_id);
    }

    pub fn add_review(&self, review: Review) {
        self.reviews.write().push(review);
    }

    pub fn category(&self, category_id: CategoryId) -> Option<Category> {
        self.categories.get(&category_id).map(|c| c.clone())
    }

    pub fn category_by_namespace(&self, namespace: &str) -> Option<CategoryId> {
        self.category_by_namespace.get(namespace).map(|id| *id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.iter().map(|e| e.value().len()).sum()
    }

    pub fn review_count(&self) -> usize {
        self.reviews.read().len()
    }

    fn index_membership(&self, category_id: CategoryId, item_id: &str) {
        let mut members = self.category_items.entry(category_id).or_default();
        if !members.iter().any(|id| id == item_id) {
            members.push(item_id.to_string());
        }
    }

    fn remove_membership(&self, category_id: CategoryId, item_id: &str) {
        if let Some(mut members) = self.category_items.get_mut(&category_id) {
            members.retain(|id| id != item_id);
        }
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for InMemoryCatalog {
    fn related_items(&self, item_id: &str) -> RecommendResult<Vec<(ItemId, RelationKind)>> {
        Ok(self
            .relations
            .get(item_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    fn item(&self, item_id: &str) -> RecommendResult<Option<Item>> {
        Ok(self.items.get(item_id).map(|i| i.clone()))
    }

    fn leaf_category(&self, item_id: &str) -> RecommendResult<Option<CategoryId>> {
        Ok(self
            .items
            .get(item_id)
            .and_then(|item| item.categories.first().copied()))
    }

    fn parent_category(&self, category_id: CategoryId) -> RecommendResult<Option<CategoryId>> {
        Ok(self
            .categories
            .get(&category_id)
            .and_then(|c| c.parent_id))
    }

    fn child_categories(&self, category_id: CategoryId) -> RecommendResult<Vec<CategoryId>> {
        Ok(self
            .children
            .get(&category_id)
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    fn items_in_category(&self, category_id: CategoryId) -> RecommendResult<Vec<ItemId>> {
        Ok(self
            .category_items
            .get(&category_id)
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    fn all_reviews(&self) -> RecommendResult<Vec<Review>> {
        Ok(self.reviews.read().clone())
    }

    fn item_ids(&self) -> RecommendResult<Vec<ItemId>> {
        let mut ids: Vec<ItemId> = self.items.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }

    fn category_ids(&self) -> RecommendResult<Vec<CategoryId>> {
        let mut ids: Vec<CategoryId> = self.categories.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
