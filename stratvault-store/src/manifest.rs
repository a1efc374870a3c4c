//! Universe manifests — the latest detail-tier membership of each universe.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use stratvault_core::domain::UniverseManifest;
use stratvault_core::schema::{self, ARTIFACT_EXTENSION};
use tracing::warn;

use crate::atomic::{read_optional, write_json_atomic, RetryPolicy, WriteJournal};
use crate::detail::key_file_name;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
    retry: RetryPolicy,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            dir: dir.into(),
            retry,
        }
    }

    pub fn path_for(&self, universe: &str) -> PathBuf {
        self.dir.join(key_file_name(universe))
    }

    /// Manifest for `universe`, or `None` if the universe was never saved.
    pub fn load(&self, universe: &str) -> StoreResult<Option<UniverseManifest>> {
        let path = self.path_for(universe);
        let manifest = match read_manifest(&path)? {
            Some(m) => m,
            None => return Ok(None),
        };
        if manifest.universe != universe {
            return Err(StoreError::corrupt(
                &path,
                None,
                format!("manifest is for universe '{}'", manifest.universe),
            ));
        }
        Ok(Some(manifest))
    }

    pub fn write(
        &self,
        manifest: &UniverseManifest,
        journal: &mut WriteJournal,
    ) -> StoreResult<()> {
        let path = self.path_for(&manifest.universe);
        let wrap = |e| StoreError::write(&manifest.universe, path.display().to_string(), e);
        self.retry.run(&path, || journal.record(&path)).map_err(wrap)?;
        self.retry
            .run(&path, || write_json_atomic(&path, manifest))
            .map_err(wrap)
    }

    /// Every readable manifest, sorted by universe. Unreadable files are
    /// logged and skipped.
    pub fn list(&self) -> StoreResult<Vec<UniverseManifest>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::corrupt(&self.dir, None, e)),
        };
        let mut manifests = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::corrupt(&self.dir, None, e))?.path();
            if path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            match read_manifest(&path) {
                Ok(Some(m)) => manifests.push(m),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable manifest"),
            }
        }
        manifests.sort_by(|a, b| a.universe.cmp(&b.universe));
        Ok(manifests)
    }
}

fn read_manifest(path: &Path) -> StoreResult<Option<UniverseManifest>> {
    let bytes = match read_optional(path) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Ok(None),
        Err(e) => return Err(StoreError::corrupt(path, None, e)),
    };
    let manifest: UniverseManifest =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::corrupt(path, None, e))?;
    if !schema::is_supported(manifest.schema_version) {
        return Err(StoreError::corrupt(
            path,
            None,
            format!("unsupported schema version {}", manifest.schema_version),
        ));
    }
    Ok(Some(manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stratvault_core::domain::ManifestEntry;
    use tempfile::TempDir;

    fn manifest(universe: &str, names: &[&str]) -> UniverseManifest {
        UniverseManifest {
            schema_version: schema::SCHEMA_VERSION,
            universe: universe.into(),
            top_n: 50,
            ranking_key: "score desc".into(),
            saved_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            selected: names
                .iter()
                .enumerate()
                .map(|(i, n)| ManifestEntry {
                    strategy_name: (*n).into(),
                    rank: i + 1,
                })
                .collect(),
        }
    }

    #[test]
    fn write_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::new(tmp.path(), RetryPolicy::none());
        let m = manifest("u1", &["a", "b"]);
        store.write(&m, &mut WriteJournal::new()).unwrap();
        let loaded = store.load("u1").unwrap().unwrap();
        assert_eq!(loaded, m);
        assert!(loaded.contains("b"));
        assert!(!loaded.contains("c"));
    }

    #[test]
    fn unknown_universe_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::new(tmp.path(), RetryPolicy::none());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn list_sorted_by_universe() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::new(tmp.path(), RetryPolicy::none());
        let mut journal = WriteJournal::new();
        store.write(&manifest("zz", &[]), &mut journal).unwrap();
        store.write(&manifest("crypto/1h", &["a"]), &mut journal).unwrap();
        let universes: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|m| m.universe)
            .collect();
        assert_eq!(universes, vec!["crypto/1h", "zz"]);
    }

    #[test]
    fn rollback_removes_new_manifest() {
        let tmp = TempDir::new().unwrap();
        let store = ManifestStore::new(tmp.path(), RetryPolicy::none());
        let mut journal = WriteJournal::new();
        store.write(&manifest("u1", &["a"]), &mut journal).unwrap();
        journal.rollback();
        assert!(store.load("u1").unwrap().is_none());
    }
}
