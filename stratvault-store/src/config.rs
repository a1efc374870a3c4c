//! Store configuration — TOML file with serde defaults.
//!
//! ```toml
//! root = "results/store"
//! top_n = 50
//!
//! [ranking]
//! metric = "score"
//! lower_is_better = false
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 25
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atomic::RetryPolicy;
use crate::error::{StoreError, StoreResult};
use crate::selector::{RankingKey, DEFAULT_SCORE_METRIC, DEFAULT_TOP_N};

/// Metric-based ranking override. Custom scoring functions are set in code via
/// `StorageCoordinator::with_ranking_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub metric: String,
    pub lower_is_better: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            metric: DEFAULT_SCORE_METRIC.into(),
            lower_is_better: false,
        }
    }
}

impl RankingConfig {
    pub fn to_key(&self) -> RankingKey {
        RankingKey::Metric {
            name: self.metric.clone(),
            lower_is_better: self.lower_is_better,
        }
    }
}

/// Complete configuration for a store instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding both tiers.
    pub root: PathBuf,
    /// Strategies per universe that receive detail artifacts.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl StoreConfig {
    /// Defaults for everything but the root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            top_n: DEFAULT_TOP_N,
            ranking: RankingConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Load from a TOML file. A relative `root` is resolved against the
    /// file's directory.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&content)?;
        if config.root.is_relative() {
            if let Some(dir) = path.parent() {
                config.root = dir.join(&config.root);
            }
        }
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| StoreError::Config(format!("parse store TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.top_n == 0 {
            return Err(StoreError::Config("top_n must be a positive integer".into()));
        }
        if self.ranking.metric.trim().is_empty() {
            return Err(StoreError::Config("ranking.metric must not be empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(StoreError::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}
