//! itemrec: item-to-item recommendations over a product catalog dataset.
//!
//! Loads the dataset into the in-memory store and prints the recommendations
//! for one seed item as JSON.

use clap::{Parser, Subcommand};
use itemrec_core::config::AppConfig;
use itemrec_core::types::RelationSelector;
use itemrec_recommender::{
    CatalogStore, CategoryMode, CategoryStats, Dataset, InMemoryCatalog, RecommendationEngine,
    RelationStats,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "itemrec")]
#[command(about = "Item-to-item product recommendations")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "ITEMREC_CONFIG")]
    config: Option<String>,

    /// Dataset JSON file (overrides config)
    #[arg(long, env = "ITEMREC__DATASET_PATH")]
    dataset: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Diverse picks from the relation-graph neighborhood
    Relation {
        item: String,
        #[arg(long, default_value = "all")]
        kind: RelationSelector,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Best rated direct related items
    TopRelated {
        item: String,
        #[arg(long, default_value = "all")]
        kind: RelationSelector,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Picks from the seed's category hierarchy
    Category {
        item: String,
        #[arg(long, default_value = "diverse_subtree")]
        mode: CategoryMode,
    },
    /// Nearest items by user rating vectors
    Collaborative {
        item: String,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Most similar and best reviewed among the nearest items
    Hybrid {
        item: String,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Uniform random baseline, seed excluded
    Random {
        item: String,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Run every strategy; failed strategies are left out
    All { item: String },
    /// Relation symmetry, out-degree and category size statistics
    Stats {
        #[arg(long, default_value_t = 1000)]
        sample: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "itemrec=info,itemrec_recommender=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::resolve(cli.config.as_deref())?;
    if let Some(path) = cli.dataset {
        config.dataset_path = path;
    }
    info!(
        dataset = %config.dataset_path,
        shortfall = ?config.diversity.shortfall,
        category_target = ?config.category.target,
        "Configuration loaded"
    );

    let catalog = Dataset::from_path(&config.dataset_path)?.into_catalog();
    let engine = RecommendationEngine::new(Arc::new(catalog), config);
    if engine.config().collaborative.rebuild_on_start {
        if let Err(e) = engine.rebuild_collaborative() {
            warn!(error = %e, "Rating matrix not built at startup");
        }
    }

    let diverse_count = engine.config().diversity.default_count;
    let knn_count = engine.config().collaborative.default_count;

    match cli.command {
        Command::Relation { item, kind, count } => {
            print_json(&engine.recommend_by_relation(&item, kind, count.unwrap_or(diverse_count))?)
        }
        Command::TopRelated { item, kind, count } => {
            print_json(&engine.recommend_top_related(&item, kind, count.unwrap_or(diverse_count))?)
        }
        Command::Category { item, mode } => print_json(&engine.recommend_by_category(&item, mode)?),
        Command::Collaborative { item, count } => {
            print_json(&engine.recommend_collaborative(&item, count.unwrap_or(knn_count))?)
        }
        Command::Hybrid { item, count } => {
            print_json(&engine.recommend_hybrid(&item, count.unwrap_or(knn_count))?)
        }
        Command::Random { item, count } => {
            print_json(&engine.recommend_random(&item, count.unwrap_or(diverse_count))?)
        }
        Command::All { item } => print_json(&run_all(&engine, &item, diverse_count, knn_count)),
        Command::Stats { sample } => {
            let mut ids = engine.store().item_ids()?;
            ids.truncate(sample);
            let mut out = Map::new();
            out.insert(
                "relations".to_string(),
                serde_json::to_value(RelationStats::collect(engine.store(), &ids)?)?,
            );
            out.insert(
                "categories".to_string(),
                serde_json::to_value(CategoryStats::collect(engine.store())?)?,
            );
            print_json(&out)
        }
    }
}

fn run_all(
    engine: &RecommendationEngine<InMemoryCatalog>,
    item: &str,
    diverse_count: usize,
    knn_count: usize,
) -> Map<String, Value> {
    let mut out = Map::new();
    collect(&mut out, "relation", engine.recommend_by_relation(item, RelationSelector::All, diverse_count));
    collect(
        &mut out,
        "top_related",
        engine.recommend_top_related(item, RelationSelector::All, diverse_count),
    );
    for (name, mode) in [
        ("same_category", CategoryMode::SameCategory),
        ("sibling_category", CategoryMode::SiblingCategory),
        ("diverse_subtree", CategoryMode::DiverseSubtree),
    ] {
        collect(&mut out, name, engine.recommend_by_category(item, mode));
    }
    collect(&mut out, "collaborative", engine.recommend_collaborative(item, knn_count));
    collect(&mut out, "hybrid", engine.recommend_hybrid(item, knn_count));
    collect(&mut out, "random", engine.recommend_random(item, diverse_count));
    out
}

fn collect<T: Serialize>(
    out: &mut Map<String, Value>,
    strategy: &str,
    result: itemrec_core::RecommendResult<T>,
) {
    match result.map_err(anyhow::Error::from).and_then(|v| Ok(serde_json::to_value(v)?)) {
        Ok(value) => {
            out.insert(strategy.to_string(), value);
        }
        Err(e) => warn!(strategy, error = %e, "Strategy failed, omitting"),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
