use serde::Deserialize;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `ITEMREC__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,
    #[serde(default)]
    pub neighborhood: NeighborhoodConfig,
    #[serde(default)]
    pub diversity: DiversityConfig,
    #[serde(default)]
    pub category: CategoryConfig,
    #[serde(default)]
    pub collaborative: CollaborativeConfig,
    #[serde(default)]
    pub top_rated: TopRatedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeighborhoodConfig {
    /// Size limits for the rounds after the first one. Round `i + 1` only runs
    /// while fewer than `expansion_thresholds[i]` items have been discovered.
    #[serde(default = "default_expansion_thresholds")]
    pub expansion_thresholds: Vec<usize>,
}

/// What the diversity selector does when the pool is smaller than `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Return every available candidate.
    #[default]
    Clamp,
    /// Fail with `InsufficientCandidates`.
    Fail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiversityConfig {
    #[serde(default)]
    pub shortfall: ShortfallPolicy,
    #[serde(default = "default_count")]
    pub default_count: usize,
}

/// Which category the subtree finder pulls items from once the closure is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryTarget {
    /// The seed item's own leaf category.
    #[default]
    SeedLeaf,
    /// The last category reached while walking the subtree.
    LastVisited,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    #[serde(default)]
    pub target: CategoryTarget,
    #[serde(default = "default_count")]
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaborativeConfig {
    #[serde(default = "default_count")]
    pub default_count: usize,
    /// Build the rating matrix at startup instead of on the first query.
    #[serde(default)]
    pub rebuild_on_start: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopRatedConfig {
    /// When non-zero, the best `shuffle_pool` items are shuffled before
    /// truncation to add variety. Zero keeps the ranking deterministic.
    #[serde(default)]
    pub shuffle_pool: usize,
}

// Default functions
fn default_dataset_path() -> String {
    "data/dataset.json".to_string()
}
fn default_expansion_thresholds() -> Vec<usize> {
    vec![100, 20, 10]
}
fn default_count() -> usize {
    10
}

impl Default for NeighborhoodConfig {
    fn default() -> Self {
        Self {
            expansion_thresholds: default_expansion_thresholds(),
        }
    }
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            shortfall: ShortfallPolicy::default(),
            default_count: default_count(),
        }
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            target: CategoryTarget::default(),
            count: default_count(),
        }
    }
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            rebuild_on_start: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            neighborhood: NeighborhoodConfig::default(),
            diversity: DiversityConfig::default(),
            category: CategoryConfig::default(),
            collaborative: CollaborativeConfig::default(),
            top_rated: TopRatedConfig::default(),
        }
    }
}

impl NeighborhoodConfig {
    /// Full per-round threshold list; the first round is unbounded.
    pub fn round_thresholds(&self) -> Vec<usize> {
        std::iter::once(usize::MAX)
            .chain(self.expansion_thresholds.iter().copied())
            .collect()
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        builder = match file {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("itemrec").required(false)),
        };
        let builder = builder.add_source(
            config::Environment::with_prefix("ITEMREC")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("neighborhood.expansion_thresholds"),
        );

        let config = builder.build()?;
        let loaded: AppConfig = config.try_deserialize()?;
        tracing::debug!(?loaded, "Configuration resolved");
        Ok(loaded)
    }

    /// Like [`AppConfig::load`], but an unreadable implicit `itemrec` file falls
    /// back to defaults. A file named explicitly must load.
    pub fn resolve(file: Option<&str>) -> Result<Self, config::ConfigError> {
        match file {
            Some(path) => Self::load(Some(path)),
            None => Ok(Self::load(None).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load config, using defaults");
                AppConfig::default()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.neighborhood.expansion_thresholds, vec![100, 20, 10]);
        assert_eq!(config.diversity.shortfall, ShortfallPolicy::Clamp);
        assert_eq!(config.category.target, CategoryTarget::SeedLeaf);
        assert_eq!(config.collaborative.default_count, 10);
        assert_eq!(config.top_rated.shuffle_pool, 0);
    }

    #[test]
    fn test_round_thresholds_start_unbounded() {
        let config = NeighborhoodConfig {
            expansion_thresholds: vec![50, 5],
        };
        assert_eq!(config.round_thresholds(), vec![usize::MAX, 50, 5]);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let raw = r#"{ "diversity": { "shortfall": "fail" }, "category": { "target": "last_visited" } }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.diversity.shortfall, ShortfallPolicy::Fail);
        assert_eq!(config.diversity.default_count, 10);
        assert_eq!(config.category.target, CategoryTarget::LastVisited);
        assert_eq!(config.dataset_path, "data/dataset.json");
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let missing = std::env::temp_dir().join("itemrec-no-such-config.toml");
        let missing = missing.to_string_lossy();
        assert!(AppConfig::resolve(Some(&missing)).is_err());
        assert!(AppConfig::resolve(None).is_ok());
    }

    #[test]
    fn test_explicit_file_keeps_strict_policy() {
        let path = std::env::temp_dir().join(format!("itemrec-strict-{}.toml", std::process::id()));
        std::fs::write(&path, "[diversity]\nshortfall = \"fail\"\n").unwrap();
        let config = AppConfig::resolve(Some(&path.to_string_lossy())).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.diversity.shortfall, ShortfallPolicy::Fail);
    }
}
