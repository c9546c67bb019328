use thiserror::Error;

pub type RecommendResult<T> = Result<T, RecommendError>;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Insufficient candidates: requested {requested}, found {available}")]
    InsufficientCandidates { requested: usize, available: usize },

    #[error("Empty dataset: no reviews to build the rating matrix from")]
    EmptyDataset,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecommendError {
    /// Short label used when recording per-strategy failures.
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendError::UnknownItem(_) => "unknown_item",
            RecommendError::InsufficientCandidates { .. } => "insufficient_candidates",
            RecommendError::EmptyDataset => "empty_dataset",
            RecommendError::StoreUnavailable(_) => "store_unavailable",
            RecommendError::Config(_) => "config",
            RecommendError::Serialization(_) => "serialization",
            RecommendError::Io(_) => "io",
        }
    }
}
