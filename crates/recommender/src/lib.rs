//! Item-to-item recommendation: relation-graph neighborhoods, category
//! subtrees, diversity-aware top-k selection and collaborative KNN.

pub mod catalog;
pub mod category;
pub mod collaborative;
pub mod dataset;
pub mod diversity;
pub mod neighborhood;
pub mod ranking;
pub mod recommendations;
pub mod similarity;
pub mod stats;

pub use catalog::{CatalogStore, InMemoryCatalog};
pub use dataset::Dataset;
pub use recommendations::{
    CategoryMode, HybridPick, RecommendationEngine, RecommendationRequest, RecommendationResponse,
    RecommendationStrategy,
};
pub use stats::{CategoryStats, RelationStats};
