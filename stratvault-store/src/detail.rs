//! Detail tier — one JSON artifact per selected strategy.
//!
//! Artifacts are keyed by `strategy_name` alone, and a key belongs to exactly
//! one universe at a time. Writing an artifact whose key is held by another
//! universe is a `KeyCollision`, even when the content is identical; the key
//! frees up once the owner drops it from its selection.
//!
//! Serialization is done up front (in parallel with rayon), then files are
//! replaced one by one through a `WriteJournal` so the caller can undo the
//! whole batch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use stratvault_core::domain::{ArtifactHeader, DetailArtifact, StrategyResult};
use stratvault_core::fingerprint::key_digest;
use stratvault_core::schema::{self, ARTIFACT_EXTENSION};
use tracing::{debug, warn};

use crate::atomic::{
    read_optional, remove_if_exists, write_atomic, RetryPolicy, WriteJournal,
};
use crate::error::{StoreError, StoreResult};

/// File name for a key (strategy or universe name).
///
/// Keys made only of `[A-Za-z0-9_.-]` that do not start with `.` are used
/// verbatim. Anything else is sanitized and suffixed with a digest of the raw
/// key, which keeps distinct keys on distinct files.
pub fn key_file_name(key: &str) -> String {
    let verbatim = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if verbatim {
        return format!("{key}.{ARTIFACT_EXTENSION}");
    }
    let sanitized: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(64)
        .collect();
    format!("{sanitized}-{}.{ARTIFACT_EXTENSION}", key_digest(key))
}

/// Build artifacts for an already-ranked selection (best first).
pub fn build_artifacts(universe: &str, ranked: &[&StrategyResult]) -> Vec<DetailArtifact> {
    ranked
        .iter()
        .enumerate()
        .map(|(i, r)| DetailArtifact::from_result(r, universe, i + 1))
        .collect()
}

#[derive(Debug, Clone)]
pub struct DetailWriter {
    dir: PathBuf,
    retry: RetryPolicy,
}

impl DetailWriter {
    pub fn new(dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            dir: dir.into(),
            retry,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, strategy_name: &str) -> PathBuf {
        self.dir.join(key_file_name(strategy_name))
    }

    /// Build, check and persist artifacts for a ranked selection.
    ///
    /// All-or-nothing: if any write fails, artifacts already written by this
    /// call are restored to their prior state.
    pub fn write_details(
        &self,
        universe: &str,
        ranked: &[&StrategyResult],
    ) -> StoreResult<Vec<DetailArtifact>> {
        let artifacts = build_artifacts(universe, ranked);
        self.check_collisions(universe, &artifacts)?;
        let mut journal = WriteJournal::new();
        if let Err(e) = self.persist(universe, &artifacts, &mut journal) {
            journal.rollback();
            return Err(e);
        }
        Ok(artifacts)
    }

    /// Reject artifacts whose key is held by another universe. Performs no
    /// writes.
    pub fn check_collisions(
        &self,
        universe: &str,
        artifacts: &[DetailArtifact],
    ) -> StoreResult<()> {
        for artifact in artifacts {
            let existing = match self.load(&artifact.strategy_name) {
                Ok(existing) => existing,
                Err(StoreError::NotFound { .. }) => continue,
                Err(StoreError::CorruptData { path, reason, .. }) => {
                    warn!(
                        path = %path.display(),
                        reason = %reason,
                        "unreadable artifact will be overwritten"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            if existing.universe == universe {
                continue;
            }
            let identical_content = match (existing.content_hash(), artifact.content_hash()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
            return Err(StoreError::KeyCollision {
                strategy_name: artifact.strategy_name.clone(),
                existing_universe: existing.universe,
                incoming_universe: universe.to_string(),
                identical_content,
            });
        }
        Ok(())
    }

    /// Write artifacts, recording prior file contents in `journal`.
    pub fn persist(
        &self,
        universe: &str,
        artifacts: &[DetailArtifact],
        journal: &mut WriteJournal,
    ) -> StoreResult<()> {
        let encoded: Vec<Vec<u8>> = artifacts
            .par_iter()
            .map(serde_json::to_vec_pretty)
            .collect::<Result<_, _>>()
            .map_err(|e| {
                let source = io::Error::new(io::ErrorKind::InvalidData, e);
                StoreError::write(universe, "detail artifacts", source)
            })?;

        for (artifact, bytes) in artifacts.iter().zip(encoded) {
            let path = self.path_for(&artifact.strategy_name);
            let target = || path.display().to_string();
            self.retry
                .run(&path, || journal.record(&path))
                .map_err(|e| StoreError::write(universe, target(), e))?;
            self.retry
                .run(&path, || write_atomic(&path, &bytes))
                .map_err(|e| StoreError::write(universe, target(), e))?;
            debug!(
                universe,
                strategy = %artifact.strategy_name,
                rank = artifact.rank,
                "detail artifact written"
            );
        }
        Ok(())
    }

    /// Remove the artifact for `strategy_name` if it belongs to `universe`.
    ///
    /// Returns whether a file was removed. Artifacts owned by another universe
    /// are left alone.
    pub fn remove_owned(
        &self,
        universe: &str,
        strategy_name: &str,
        journal: &mut WriteJournal,
    ) -> StoreResult<bool> {
        let path = self.path_for(strategy_name);
        match self.load_header(&path) {
            Ok(Some(header)) if header.universe == universe => {}
            Ok(_) => return Ok(false),
            // Unreadable leftovers of this universe's previous selection are
            // still removed.
            Err(_) => {}
        }
        let target = || path.display().to_string();
        self.retry
            .run(&path, || journal.record(&path))
            .map_err(|e| StoreError::write(universe, target(), e))?;
        self.retry
            .run(&path, || remove_if_exists(&path))
            .map_err(|e| StoreError::write(universe, target(), e))
    }

    /// Load one artifact by strategy name.
    pub fn load(&self, strategy_name: &str) -> StoreResult<DetailArtifact> {
        let path = self.path_for(strategy_name);
        let bytes = match read_optional(&path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                return Err(StoreError::NotFound {
                    strategy_name: strategy_name.to_string(),
                })
            }
            Err(e) => return Err(StoreError::corrupt(&path, Some(strategy_name), e)),
        };
        let artifact: DetailArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::corrupt(&path, Some(strategy_name), e))?;
        if !schema::is_supported(artifact.schema_version) {
            return Err(StoreError::corrupt(
                &path,
                Some(strategy_name),
                format!("unsupported schema version {}", artifact.schema_version),
            ));
        }
        if artifact.strategy_name != strategy_name {
            return Err(StoreError::corrupt(
                &path,
                Some(strategy_name),
                format!("artifact is for '{}'", artifact.strategy_name),
            ));
        }
        Ok(artifact)
    }

    /// Names of every stored artifact belonging to `universe`.
    ///
    /// Full directory scan that only parses headers; used when a universe has
    /// no manifest.
    pub fn scan_universe(&self, universe: &str) -> StoreResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::corrupt(&self.dir, None, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::corrupt(&self.dir, None, e))?.path();
            if path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            match self.load_header(&path) {
                Ok(Some(header)) if header.universe == universe => {
                    names.push(header.strategy_name)
                }
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable artifact"),
            }
        }
        names.sort();
        Ok(names)
    }

    fn load_header(&self, path: &Path) -> StoreResult<Option<ArtifactHeader>> {
        match read_optional(path) {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::corrupt(path, None, e)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::corrupt(path, None, e)),
        }
    }
}
