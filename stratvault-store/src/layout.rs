//! Layout detection and the legacy per-universe format adapter.
//!
//! Before the two-tier layout, each universe was written as a single
//! `<universe>.results.json` holding every strategy with its full trade
//! history. This module recognizes either layout and normalizes legacy files
//! into the same `MetricsCollection` / `DetailArtifact` shapes, using the same
//! aggregation and selection rules as a live save. The save path never reads
//! legacy files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stratvault_core::domain::{DetailArtifact, MetricsCollection, StrategyResult};
use stratvault_core::schema::{DETAILS_DIR, LEGACY_SUFFIX, MANIFESTS_DIR, METRICS_FILE};
use tracing::debug;

use crate::aggregate::aggregate;
use crate::error::{StoreError, StoreResult};
use crate::selector::{select_top, RankingKey};

/// What a store root currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLayout {
    /// Nothing persisted yet.
    Empty,
    /// Metrics tier and/or detail tier present. Takes precedence over legacy files.
    TwoTier,
    /// Only legacy per-universe files, sorted by path.
    Legacy(Vec<PathBuf>),
}

/// Inspect `root` and classify its layout.
pub fn detect(root: &Path) -> StoreResult<StoreLayout> {
    let two_tier = [METRICS_FILE, DETAILS_DIR, MANIFESTS_DIR]
        .iter()
        .any(|name| root.join(name).exists());
    if two_tier {
        debug!(root = %root.display(), "two-tier layout detected");
        return Ok(StoreLayout::TwoTier);
    }
    let legacy = legacy_files(root)?;
    if legacy.is_empty() {
        Ok(StoreLayout::Empty)
    } else {
        debug!(root = %root.display(), files = legacy.len(), "legacy layout detected");
        Ok(StoreLayout::Legacy(legacy))
    }
}

/// Legacy result files directly under `root`.
pub fn legacy_files(root: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::corrupt(root, None, e)),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StoreError::corrupt(root, None, e))?.path();
        let is_legacy = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(LEGACY_SUFFIX) && n.len() > LEGACY_SUFFIX.len());
        if is_legacy && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// One legacy per-universe file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyUniverseFile {
    pub universe: String,
    pub strategies: Vec<StrategyResult>,
}

impl LegacyUniverseFile {
    pub fn read(path: &Path) -> StoreResult<Self> {
        let bytes = fs::read(path).map_err(|e| StoreError::corrupt(path, None, e))?;
        let mut file: Self =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::corrupt(path, None, e))?;
        for s in &mut file.strategies {
            if s.universe.is_empty() {
                s.universe = file.universe.clone();
            }
        }
        Ok(file)
    }
}

/// Normalize legacy files into a metrics collection, in file order.
pub fn legacy_metrics(files: &[PathBuf]) -> StoreResult<MetricsCollection> {
    let mut collection = MetricsCollection::new();
    for path in files {
        let file = LegacyUniverseFile::read(path)?;
        let records = aggregate(&file.universe, &file.strategies)
            .map_err(|e| StoreError::corrupt(path, None, e))?;
        collection.merge(records);
    }
    Ok(collection)
}

/// Look up one strategy's detail in legacy files.
///
/// A legacy file holds every strategy, so the top-N rule is applied here to
/// keep the read contract identical to the two-tier layout: strategies outside
/// the selection are `NotFound`.
pub fn legacy_detail(
    files: &[PathBuf],
    strategy_name: &str,
    top_n: usize,
    key: &RankingKey,
) -> StoreResult<DetailArtifact> {
    for path in files {
        let file = LegacyUniverseFile::read(path)?;
        if !file.strategies.iter().any(|s| s.strategy_name == strategy_name) {
            continue;
        }
        let selected = select_top(&file.strategies, top_n, key)?;
        if let Some(pos) = selected.iter().position(|s| s.strategy_name == strategy_name) {
            return Ok(DetailArtifact::from_result(selected[pos], &file.universe, pos + 1));
        }
    }
    Err(StoreError::NotFound {
        strategy_name: strategy_name.to_string(),
    })
}
