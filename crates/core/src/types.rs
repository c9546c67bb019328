use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::RecommendError;

/// Opaque item identifier (ASIN-style strings in practice).
pub type ItemId = String;

/// Category identifiers are assigned by the store at insertion time.
pub type CategoryId = u64;

/// A catalog item as seen by the recommender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub title: Option<String>,
    /// Average review rating on a 0-5 scale; `None` when the item has no reviews.
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, rating: Option<f64>) -> Self {
        Self {
            id: id.into(),
            title: None,
            rating,
            categories: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    AlsoBought,
    AlsoViewed,
    BoughtTogether,
    BuyAfterViewing,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::AlsoBought,
        RelationKind::AlsoViewed,
        RelationKind::BoughtTogether,
        RelationKind::BuyAfterViewing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::AlsoBought => "also_bought",
            RelationKind::AlsoViewed => "also_viewed",
            RelationKind::BoughtTogether => "bought_together",
            RelationKind::BuyAfterViewing => "buy_after_viewing",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RecommendError::Config(format!("unknown relation kind '{s}'")))
    }
}

/// Which relation edges a traversal follows: every kind merged, or a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationSelector {
    #[default]
    All,
    Only(RelationKind),
}

impl RelationSelector {
    pub fn accepts(&self, kind: RelationKind) -> bool {
        match self {
            RelationSelector::All => true,
            RelationSelector::Only(wanted) => *wanted == kind,
        }
    }
}

impl fmt::Display for RelationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationSelector::All => f.write_str("all"),
            RelationSelector::Only(kind) => kind.fmt(f),
        }
    }
}

impl FromStr for RelationSelector {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(RelationSelector::All);
        }
        s.parse().map(RelationSelector::Only)
    }
}

/// Directed edge of the relation graph. `A -> B` does not imply `B -> A`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub source: ItemId,
    pub target: ItemId,
    pub kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// `None` for roots.
    pub parent_id: Option<CategoryId>,
    /// Dot-joined ancestor chain, unique per node.
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub user_id: String,
    pub item_id: ItemId,
    pub rating: f64,
}

impl Review {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<ItemId>, rating: f64) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            rating,
        }
    }
}

/// What the neighborhood finders know about a discovered item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub rating: Option<f64>,
    /// Outgoing related ids cached during expansion, consumed by similarity building.
    pub related: Vec<ItemId>,
}

impl CandidateInfo {
    pub fn new(rating: Option<f64>) -> Self {
        Self {
            rating,
            related: Vec::new(),
        }
    }
}

/// Orders `(id, rating)` pairs best first: higher rating, then lower id.
/// Unrated items sort after every rated one.
pub fn by_rating_desc(a: (&str, Option<f64>), b: (&str, Option<f64>)) -> Ordering {
    let ra = a.1.unwrap_or(f64::NEG_INFINITY);
    let rb = b.1.unwrap_or(f64::NEG_INFINITY);
    rb.total_cmp(&ra).then_with(|| a.0.cmp(b.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_selector_parsing() {
        assert_eq!("all".parse::<RelationSelector>().unwrap(), RelationSelector::All);
        assert_eq!(
            "bought_together".parse::<RelationSelector>().unwrap(),
            RelationSelector::Only(RelationKind::BoughtTogether)
        );
        assert!("bought_apart".parse::<RelationSelector>().is_err());
    }

    #[test]
    fn test_relation_kind_serde_names() {
        let json = serde_json::to_string(&RelationKind::BuyAfterViewing).unwrap();
        assert_eq!(json, "\"buy_after_viewing\"");
        for kind in RelationKind::ALL {
            assert_eq!(kind.as_str().parse::<RelationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_selector_accepts() {
        assert!(RelationSelector::All.accepts(RelationKind::AlsoViewed));
        let only = RelationSelector::Only(RelationKind::AlsoBought);
        assert!(only.accepts(RelationKind::AlsoBought));
        assert!(!only.accepts(RelationKind::AlsoViewed));
    }

    #[test]
    fn test_rating_order() {
        let mut items = vec![
            ("c", Some(3.0)),
            ("b", Some(4.5)),
            ("z", None),
            ("a", Some(4.5)),
        ];
        items.sort_by(|a, b| by_rating_desc(*a, *b));
        let ids: Vec<_> = items.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "z"]);
    }
}
