//! Recommendation facade: one entry point per strategy, each independent of
//! the others, plus a request/response API that dispatches on the strategy.

use chrono::{DateTime, Utc};
use itemrec_core::config::AppConfig;
use itemrec_core::types::{by_rating_desc, ItemId, RelationSelector};
use itemrec_core::{RecommendError, RecommendResult};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::catalog::CatalogStore;
use crate::category::CategoryNeighborhoodFinder;
use crate::collaborative::{CollaborativeKnnEngine, RatingMatrix};
use crate::diversity::{DiverseTopKSelector, SelectedItem};
use crate::neighborhood::NeighborhoodExpander;
use crate::ranking::TopRatedRanker;
use crate::similarity::SimilarityMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMode {
    /// Top-rated items of the seed's leaf category.
    SameCategory,
    /// Top-rated items of the leaf's parent and its children.
    SiblingCategory,
    /// Diversity selection over the category subtree candidates.
    DiverseSubtree,
}

impl std::str::FromStr for CategoryMode {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same_category" => Ok(CategoryMode::SameCategory),
            "sibling_category" => Ok(CategoryMode::SiblingCategory),
            "diverse_subtree" => Ok(CategoryMode::DiverseSubtree),
            other => Err(RecommendError::Config(format!("unknown category mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecommendationStrategy {
    DiverseRelated { relation: RelationSelector },
    TopRelated { relation: RelationSelector },
    Category { mode: CategoryMode },
    Collaborative,
    /// Uniform random baseline.
    Random,
}

impl RecommendationStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            RecommendationStrategy::DiverseRelated { .. } => "diverse_related",
            RecommendationStrategy::TopRelated { .. } => "top_related",
            RecommendationStrategy::Category { .. } => "category",
            RecommendationStrategy::Collaborative => "collaborative",
            RecommendationStrategy::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub item_id: ItemId,
    pub strategy: RecommendationStrategy,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub item_id: ItemId,
    /// Item rating for rating-ordered strategies, cosine similarity for collaborative.
    pub score: Option<f64>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub request_id: Uuid,
    pub item_id: ItemId,
    pub strategy: RecommendationStrategy,
    pub items: Vec<RecommendationItem>,
    pub generated_at: DateTime<Utc>,
}

/// Result of the hybrid collaborative pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridPick {
    /// Nearest neighbour by rating vectors.
    pub most_similar: ItemId,
    /// Highest mean review rating among the returned neighbours.
    pub best_rated: ItemId,
}

pub struct RecommendationEngine<S: CatalogStore + ?Sized> {
    store: Arc<S>,
    config: AppConfig,
    thresholds: Vec<usize>,
    knn: CollaborativeKnnEngine,
}

impl<S: CatalogStore + ?Sized> RecommendationEngine<S> {
    pub fn new(store: Arc<S>, config: AppConfig) -> Self {
        let thresholds = config.neighborhood.round_thresholds();
        Self {
            store,
            config,
            thresholds,
            knn: CollaborativeKnnEngine::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Relation-graph neighborhood, co-occurrence similarity, diverse top-`count`.
    pub fn recommend_by_relation(
        &self,
        item_id: &str,
        relation: RelationSelector,
        count: usize,
    ) -> RecommendResult<Vec<ItemId>> {
        Ok(ids(self.diverse_related(item_id, relation, count)?))
    }

    /// Direct related items of one kind, best rated first.
    pub fn recommend_top_related(
        &self,
        item_id: &str,
        relation: RelationSelector,
        count: usize,
    ) -> RecommendResult<Vec<ItemId>> {
        Ok(ids(self.top_related(item_id, relation, count)?))
    }

    pub fn recommend_by_category(&self, item_id: &str, mode: CategoryMode) -> RecommendResult<Vec<ItemId>> {
        Ok(ids(self.by_category(item_id, mode, self.config.category.count)?))
    }

    /// `count` nearest items by rating vectors, most similar first.
    pub fn recommend_collaborative(&self, item_id: &str, count: usize) -> RecommendResult<Vec<ItemId>> {
        self.rating_matrix()?;
        self.knn.recommend(item_id, count)
    }

    /// Nearest neighbour plus the best-reviewed item among the `count` nearest.
    pub fn recommend_hybrid(&self, item_id: &str, count: usize) -> RecommendResult<HybridPick> {
        let matrix = self.rating_matrix()?;
        let neighbors = matrix.nearest(item_id, count.max(1))?;
        let most_similar = neighbors
            .first()
            .map(|n| n.item_id.clone())
            .ok_or(RecommendError::InsufficientCandidates {
                requested: count.max(1),
                available: 0,
            })?;

        let mut best_rated = most_similar.clone();
        let mut best_mean = matrix.mean_rating(&best_rated);
        for neighbor in &neighbors[1..] {
            let mean = matrix.mean_rating(&neighbor.item_id);
            if mean > best_mean {
                best_rated = neighbor.item_id.clone();
                best_mean = mean;
            }
        }
        Ok(HybridPick {
            most_similar,
            best_rated,
        })
    }

    /// Up to `count` distinct items drawn uniformly from the store, seed excluded.
    pub fn recommend_random(&self, item_id: &str, count: usize) -> RecommendResult<Vec<ItemId>> {
        self.require_item(item_id)?;
        let pool: Vec<ItemId> = self
            .store
            .item_ids()?
            .into_iter()
            .filter(|id| id != item_id)
            .collect();
        if count > 0 && pool.is_empty() {
            return Err(RecommendError::InsufficientCandidates {
                requested: count,
                available: 0,
            });
        }
        Ok(pool
            .choose_multiple(&mut rand::thread_rng(), count)
            .cloned()
            .collect())
    }

    /// Rebuild the rating matrix from the store's full review history.
    pub fn rebuild_collaborative(&self) -> RecommendResult<Arc<RatingMatrix>> {
        let reviews = self.store.all_reviews()?;
        self.knn.rebuild(&reviews)
    }

    pub fn recommend(&self, request: &RecommendationRequest) -> RecommendResult<RecommendationResponse> {
        let label = request.strategy.label();
        let result = self.dispatch(request);
        match &result {
            Ok(items) => {
                metrics::counter!("recommendations.served", "strategy" => label).increment(1);
                debug!(item_id = %request.item_id, strategy = label, count = items.len(), "Recommendations served");
            }
            Err(e) => {
                metrics::counter!("recommendations.failed", "strategy" => label, "reason" => e.kind())
                    .increment(1);
            }
        }

        Ok(RecommendationResponse {
            request_id: Uuid::new_v4(),
            item_id: request.item_id.clone(),
            strategy: request.strategy,
            items: result?,
            generated_at: Utc::now(),
        })
    }

    fn dispatch(&self, request: &RecommendationRequest) -> RecommendResult<Vec<RecommendationItem>> {
        let item_id = request.item_id.as_str();
        match request.strategy {
            RecommendationStrategy::DiverseRelated { relation } => Ok(rated_items(
                self.diverse_related(item_id, relation, request.limit)?,
                "Diverse pick from related items",
            )),
            RecommendationStrategy::TopRelated { relation } => Ok(rated_items(
                self.top_related(item_id, relation, request.limit)?,
                &format!("Top rated {relation} item"),
            )),
            RecommendationStrategy::Category { mode } => {
                let reason = match mode {
                    CategoryMode::SameCategory => "Top rated in the same category",
                    CategoryMode::SiblingCategory => "Top rated in a neighbouring category",
                    CategoryMode::DiverseSubtree => "Diverse pick from the category",
                };
                Ok(rated_items(self.by_category(item_id, mode, request.limit)?, reason))
            }
            RecommendationStrategy::Collaborative => {
                let matrix = self.rating_matrix()?;
                Ok(matrix
                    .nearest(item_id, request.limit)?
                    .into_iter()
                    .map(|n| RecommendationItem {
                        item_id: n.item_id,
                        score: Some(1.0 - n.distance),
                        reason: "Rated alike by the same users".to_string(),
                    })
                    .collect())
            }
            RecommendationStrategy::Random => Ok(self
                .recommend_random(item_id, request.limit)?
                .into_iter()
                .map(|item_id| RecommendationItem {
                    item_id,
                    score: None,
                    reason: "Random pick".to_string(),
                })
                .collect()),
        }
    }

    fn diverse_related(
        &self,
        item_id: &str,
        relation: RelationSelector,
        count: usize,
    ) -> RecommendResult<Vec<SelectedItem>> {
        self.require_item(item_id)?;
        let candidates = NeighborhoodExpander::new(self.store.as_ref(), &self.thresholds)
            .with_relation(relation)
            .expand(item_id)?;
        debug!(item_id = %item_id, %relation, candidates = candidates.len(), "Neighborhood expanded");
        let similarity = SimilarityMatrix::build(&candidates);
        self.selector().select(&candidates, &similarity, count)
    }

    fn top_related(
        &self,
        item_id: &str,
        relation: RelationSelector,
        count: usize,
    ) -> RecommendResult<Vec<SelectedItem>> {
        self.require_item(item_id)?;
        let related: Vec<ItemId> = self
            .store
            .related_items(item_id)?
            .into_iter()
            .filter(|(id, kind)| relation.accepts(*kind) && id != item_id)
            .map(|(id, _)| id)
            .collect();
        self.rank(related, count)
    }

    fn by_category(&self, item_id: &str, mode: CategoryMode, count: usize) -> RecommendResult<Vec<SelectedItem>> {
        self.require_item(item_id)?;
        let finder = CategoryNeighborhoodFinder::new(self.store.as_ref(), self.config.category.target);
        match mode {
            CategoryMode::SameCategory => self.rank(finder.same_category_items(item_id)?, count),
            CategoryMode::SiblingCategory => self.rank(finder.sibling_category_items(item_id)?, count),
            CategoryMode::DiverseSubtree => {
                let candidates = finder.expand_by_category(item_id)?;
                let similarity = SimilarityMatrix::zeros(candidates.keys().cloned());
                self.selector().select(&candidates, &similarity, count)
            }
        }
    }

    fn rank(&self, ids: Vec<ItemId>, count: usize) -> RecommendResult<Vec<SelectedItem>> {
        let ranked = TopRatedRanker::new(self.store.as_ref(), self.config.top_rated.shuffle_pool)
            .rank(&ids, count)?;
        if count > 0 && ranked.is_empty() {
            return Err(RecommendError::InsufficientCandidates {
                requested: count,
                available: 0,
            });
        }
        Ok(ranked)
    }

    fn selector(&self) -> DiverseTopKSelector {
        DiverseTopKSelector::new(self.config.diversity.shortfall)
    }

    fn require_item(&self, item_id: &str) -> RecommendResult<()> {
        match self.store.item(item_id)? {
            Some(_) => Ok(()),
            None => Err(RecommendError::UnknownItem(item_id.to_string())),
        }
    }

    fn rating_matrix(&self) -> RecommendResult<Arc<RatingMatrix>> {
        self.knn.snapshot_or_build(|| self.store.all_reviews())
    }
}

fn ids(items: Vec<SelectedItem>) -> Vec<ItemId> {
    items.into_iter().map(|item| item.item_id).collect()
}

fn rated_items(mut items: Vec<SelectedItem>, reason: &str) -> Vec<RecommendationItem> {
    items.sort_by(|a, b| by_rating_desc((a.item_id.as_str(), a.rating), (b.item_id.as_str(), b.rating)));
    items
        .into_iter()
        .map(|item| RecommendationItem {
            item_id: item.item_id,
            score: item.rating,
            reason: reason.to_string(),
        })
        .collect()
}
