//! Storage coordinator — the single write path and both read paths.
//!
//! A save runs in this order:
//! 1. validate the batch (no mutation on failure)
//! 2. aggregate metrics for every result
//! 3. select the top N
//! 4. check detail-tier key collisions (no mutation on failure)
//! 5. merge and persist the metrics tier
//! 6. remove this universe's artifacts that fell out of the selection,
//!    write the new artifacts and the universe manifest
//!
//! If step 6 fails, the touched artifact files are restored from the journal
//! and the metrics merge is reverted for this universe's keys, so the caller
//! sees either the whole save or none of it.
//!
//! Saves of the same universe are serialized by a per-universe lock. Saves of
//! different universes run concurrently and meet only at the metrics tier,
//! which has its own lock.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use stratvault_core::domain::{
    DetailArtifact, ManifestEntry, MetricsCollection, StrategyResult, UniverseManifest,
};
use stratvault_core::schema::{self, DETAILS_DIR, MANIFESTS_DIR, METRICS_FILE};
use tracing::{info, warn};

use crate::aggregate::{aggregate, validate_batch};
use crate::atomic::WriteJournal;
use crate::config::StoreConfig;
use crate::detail::{build_artifacts, DetailWriter};
use crate::error::{StoreError, StoreResult};
use crate::layout::{self, LegacyUniverseFile, StoreLayout};
use crate::manifest::ManifestStore;
use crate::metrics_tier::MetricsTier;
use crate::selector::{select_top, RankingKey};

/// What a save changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub universe: String,
    pub metrics_inserted: usize,
    pub metrics_replaced: usize,
    pub details_written: usize,
    pub details_removed: usize,
}

pub struct StorageCoordinator {
    config: StoreConfig,
    ranking: RankingKey,
    metrics: MetricsTier,
    details: DetailWriter,
    manifests: ManifestStore,
    universe_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for StorageCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCoordinator")
            .field("root", &self.config.root)
            .field("top_n", &self.config.top_n)
            .field("ranking", &self.ranking)
            .finish()
    }
}

impl StorageCoordinator {
    /// Open (or lazily create) a store. Nothing is written until the first save.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let root = config.root.clone();
        let metrics = MetricsTier::open(root.join(METRICS_FILE))?;
        let details = DetailWriter::new(root.join(DETAILS_DIR), config.retry);
        let manifests = ManifestStore::new(root.join(MANIFESTS_DIR), config.retry);
        let ranking = config.ranking.to_key();
        info!(
            root = %root.display(),
            top_n = config.top_n,
            ranking = %ranking,
            strategies = metrics.snapshot().total_strategies,
            "store opened"
        );
        Ok(Self {
            config,
            ranking,
            metrics,
            details,
            manifests,
            universe_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Open with defaults at `root`.
    pub fn open_at(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(StoreConfig::new(root.as_ref()))
    }

    /// Replace the configured ranking key (e.g. with a custom scoring function).
    pub fn with_ranking_key(mut self, key: RankingKey) -> Self {
        self.ranking = key;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn ranking_key(&self) -> &RankingKey {
        &self.ranking
    }

    /// Save with the configured `top_n`.
    pub fn save_universe_results_default(
        &self,
        universe: &str,
        results: &[StrategyResult],
    ) -> StoreResult<SaveReport> {
        self.save_universe_results(universe, results, self.config.top_n)
    }

    /// Save one universe's results into both tiers.
    pub fn save_universe_results(
        &self,
        universe: &str,
        results: &[StrategyResult],
        top_n: usize,
    ) -> StoreResult<SaveReport> {
        validate_batch(universe, results)?;
        if top_n == 0 {
            return Err(StoreError::Config(format!(
                "top_n must be a positive integer (universe '{universe}')"
            )));
        }

        let lock = self.universe_lock(universe);
        let _guard = lock.lock();

        let records = aggregate(universe, results)?;
        let selected = select_top(results, top_n, &self.ranking)?;
        let artifacts = build_artifacts(universe, &selected);
        self.details.check_collisions(universe, &artifacts)?;

        let keep: HashSet<&str> = artifacts.iter().map(|a| a.strategy_name.as_str()).collect();
        let stale: Vec<String> = self
            .previous_members(universe)?
            .into_iter()
            .filter(|name| !keep.contains(name.as_str()))
            .collect();

        let commit = self
            .metrics
            .merge_and_persist(universe, records, &self.config.retry)?;

        let manifest = UniverseManifest {
            schema_version: schema::SCHEMA_VERSION,
            universe: universe.to_string(),
            top_n,
            ranking_key: self.ranking.to_string(),
            saved_at: chrono::Utc::now().naive_utc(),
            selected: artifacts
                .iter()
                .map(|a| ManifestEntry {
                    strategy_name: a.strategy_name.clone(),
                    rank: a.rank,
                })
                .collect(),
        };

        let mut journal = WriteJournal::new();
        let written =
            self.write_detail_tier(universe, &stale, &artifacts, &manifest, &mut journal);
        let removed = match written {
            Ok(removed) => removed,
            Err(e) => {
                warn!(universe, error = %e, "detail tier write failed, rolling back");
                let unrestored = journal.rollback();
                if !unrestored.is_empty() {
                    warn!(
                        universe,
                        files = unrestored.len(),
                        "some detail files could not be restored"
                    );
                }
                let reverted = self
                    .metrics
                    .revert(universe, &commit.undo, &self.config.retry);
                if let Err(revert_err) = reverted {
                    warn!(universe, error = %revert_err, "metrics tier could not be reverted");
                }
                return Err(e);
            }
        };

        let report = SaveReport {
            universe: universe.to_string(),
            metrics_inserted: commit.summary.inserted,
            metrics_replaced: commit.summary.replaced,
            details_written: artifacts.len(),
            details_removed: removed,
        };
        info!(
            universe,
            strategies = results.len(),
            inserted = report.metrics_inserted,
            replaced = report.metrics_replaced,
            details = report.details_written,
            removed = report.details_removed,
            "universe saved"
        );
        Ok(report)
    }

    fn write_detail_tier(
        &self,
        universe: &str,
        stale: &[String],
        artifacts: &[DetailArtifact],
        manifest: &UniverseManifest,
        journal: &mut WriteJournal,
    ) -> StoreResult<usize> {
        let mut removed = 0;
        for name in stale {
            if self.details.remove_owned(universe, name, journal)? {
                removed += 1;
            }
        }
        self.details.persist(universe, artifacts, journal)?;
        self.manifests.write(manifest, journal)?;
        Ok(removed)
    }

    /// Strategies currently holding detail artifacts for `universe`.
    ///
    /// The manifest is unioned with a scan of the detail tier: artifacts are
    /// written before the manifest, so an interrupted save can leave files the
    /// manifest does not list.
    fn previous_members(&self, universe: &str) -> StoreResult<Vec<String>> {
        let mut names = self.details.scan_universe(universe)?;
        match self.manifests.load(universe) {
            Ok(Some(manifest)) => {
                names.extend(manifest.selected.into_iter().map(|e| e.strategy_name))
            }
            Ok(None) => {}
            Err(e) => {
                warn!(universe, error = %e, "manifest unreadable, using detail scan only")
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn universe_lock(&self, universe: &str) -> Arc<Mutex<()>> {
        self.universe_locks
            .lock()
            .entry(universe.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// The whole metrics tier. Never reads detail artifacts.
    pub fn load_all_metrics(&self) -> StoreResult<MetricsCollection> {
        if self.metrics.exists_on_disk() || !self.metrics.snapshot().is_empty() {
            return Ok(self.metrics.snapshot());
        }
        match layout::detect(&self.config.root)? {
            StoreLayout::Legacy(files) => layout::legacy_metrics(&files),
            StoreLayout::TwoTier | StoreLayout::Empty => Ok(self.metrics.snapshot()),
        }
    }

    /// One strategy's detail artifact.
    ///
    /// `NotFound` if the strategy is not in its universe's latest top-N
    /// selection; `CorruptData` if the stored artifact cannot be parsed.
    pub fn load_detail(&self, strategy_name: &str) -> StoreResult<DetailArtifact> {
        match self.details.load(strategy_name) {
            Err(StoreError::NotFound { .. }) => match layout::detect(&self.config.root)? {
                StoreLayout::Legacy(files) => layout::legacy_detail(
                    &files,
                    strategy_name,
                    self.config.top_n,
                    &self.ranking,
                ),
                StoreLayout::TwoTier | StoreLayout::Empty => Err(StoreError::NotFound {
                    strategy_name: strategy_name.to_string(),
                }),
            },
            other => other,
        }
    }

    /// Every artifact of `universe`, in rank order.
    pub fn load_universe_details(&self, universe: &str) -> StoreResult<Vec<DetailArtifact>> {
        let manifest = self.manifests.load(universe)?;
        let mut artifacts = Vec::new();
        match manifest {
            Some(manifest) => {
                for entry in &manifest.selected {
                    match self.details.load(&entry.strategy_name) {
                        Ok(artifact) => artifacts.push(artifact),
                        Err(StoreError::NotFound { strategy_name }) => {
                            warn!(
                                universe,
                                strategy = %strategy_name,
                                "manifest entry has no artifact"
                            );
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            None => {
                for name in self.details.scan_universe(universe)? {
                    artifacts.push(self.details.load(&name)?);
                }
            }
        }
        // A listed key may since have been taken over by another universe.
        artifacts.retain(|a| a.universe == universe);
        artifacts.sort_by_key(|a| a.rank);
        Ok(artifacts)
    }

    /// Universes that have been saved, sorted.
    pub fn list_universes(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .manifests
            .list()?
            .into_iter()
            .map(|m| m.universe)
            .collect())
    }

    /// Convert legacy per-universe files under the root into the two-tier
    /// layout. The legacy files are left in place; once the metrics tier
    /// exists they are no longer consulted.
    pub fn migrate_legacy(&self) -> StoreResult<Vec<SaveReport>> {
        let files = layout::legacy_files(&self.config.root)?;
        let mut reports = Vec::with_capacity(files.len());
        for path in &files {
            let file = LegacyUniverseFile::read(path)?;
            info!(universe = %file.universe, path = %path.display(), "migrating legacy file");
            reports.push(self.save_universe_results_default(&file.universe, &file.strategies)?);
        }
        Ok(reports)
    }

    /// Re-read the metrics tier from disk.
    pub fn reload(&self) -> StoreResult<()> {
        self.metrics.reload()
    }
}
