//! Metrics tier — the shared, all-strategies summary file.
//!
//! Held in memory behind an `RwLock` and mirrored to `metrics.json`. A merge
//! clones the collection, upserts, persists atomically, and only then swaps
//! the new collection in, all under the write lock. Readers therefore see
//! either the state before a merge or after it, never a partial one.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use stratvault_core::domain::{MergeSummary, MetricsCollection, MetricsRecord, RecordKey, Upsert};
use stratvault_core::schema;
use tracing::{debug, warn};

use crate::atomic::{read_optional, write_json_atomic, RetryPolicy};
use crate::error::{StoreError, StoreResult};

/// How to undo one key of a merge: restore the displaced record, or remove
/// the key if the merge inserted it.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub key: RecordKey,
    pub previous: Option<MetricsRecord>,
}

/// Result of a committed merge.
#[derive(Debug, Clone)]
pub struct MergeCommit {
    pub summary: MergeSummary,
    pub undo: Vec<UndoEntry>,
}

#[derive(Debug)]
pub struct MetricsTier {
    path: PathBuf,
    state: RwLock<MetricsCollection>,
}

impl MetricsTier {
    /// Open the tier at `path`, loading it if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let collection = load_collection(&path)?.unwrap_or_default();
        debug!(
            path = %path.display(),
            strategies = collection.total_strategies,
            "metrics tier opened"
        );
        Ok(Self {
            path,
            state: RwLock::new(collection),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the tier has ever been persisted.
    pub fn exists_on_disk(&self) -> bool {
        self.path.exists()
    }

    /// Consistent copy of the whole collection.
    pub fn snapshot(&self) -> MetricsCollection {
        self.state.read().clone()
    }

    /// Re-read the file, picking up writes from other processes.
    pub fn reload(&self) -> StoreResult<()> {
        let fresh = load_collection(&self.path)?.unwrap_or_default();
        *self.state.write() = fresh;
        Ok(())
    }

    /// Upsert `records` and persist. Nothing changes if persisting fails.
    pub fn merge_and_persist(
        &self,
        universe: &str,
        records: Vec<MetricsRecord>,
        retry: &RetryPolicy,
    ) -> StoreResult<MergeCommit> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let mut summary = MergeSummary::default();
        let mut undo = Vec::with_capacity(records.len());

        for record in records {
            let key = record.key();
            match next.upsert(record) {
                Upsert::Inserted => {
                    summary.inserted += 1;
                    undo.push(UndoEntry {
                        key,
                        previous: None,
                    });
                }
                Upsert::Replaced(old) => {
                    summary.replaced += 1;
                    undo.push(UndoEntry {
                        key,
                        previous: Some(old),
                    });
                }
            }
        }

        self.persist(universe, &next, retry)?;
        *guard = next;
        Ok(MergeCommit { summary, undo })
    }

    /// Undo a committed merge for one universe.
    ///
    /// Only touches the keys in `undo`; merges from other universes that
    /// landed in between are preserved.
    pub fn revert(
        &self,
        universe: &str,
        undo: &[UndoEntry],
        retry: &RetryPolicy,
    ) -> StoreResult<()> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        for entry in undo.iter().rev() {
            match &entry.previous {
                Some(old) => {
                    next.upsert(old.clone());
                }
                None => {
                    next.remove(&entry.key.strategy_name, &entry.key.universe);
                }
            }
        }
        if let Err(e) = self.persist(universe, &next, retry) {
            warn!(universe, error = %e, "metrics tier revert could not be persisted");
            return Err(e);
        }
        *guard = next;
        Ok(())
    }

    fn persist(
        &self,
        universe: &str,
        collection: &MetricsCollection,
        retry: &RetryPolicy,
    ) -> StoreResult<()> {
        retry
            .run(&self.path, || write_json_atomic(&self.path, collection))
            .map_err(|e| StoreError::write(universe, self.path.display().to_string(), e))
    }
}

/// Parse the metrics file. Missing file → `None`.
pub(crate) fn load_collection(path: &Path) -> StoreResult<Option<MetricsCollection>> {
    let bytes = match read_optional(path) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Ok(None),
        Err(e) => return Err(StoreError::corrupt(path, None, e)),
    };
    let mut collection: MetricsCollection =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::corrupt(path, None, e))?;
    if !schema::is_supported(collection.schema_version) {
        return Err(StoreError::corrupt(
            path,
            None,
            format!("unsupported schema version {}", collection.schema_version),
        ));
    }
    collection.normalize();
    Ok(Some(collection))
}
