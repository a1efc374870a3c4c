//! Integration tests for reading and migrating the legacy per-universe layout.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use stratvault_core::domain::StrategyResult;
use stratvault_core::schema::LEGACY_SUFFIX;
use stratvault_store::{
    detect, LegacyUniverseFile, RankingKey, StorageCoordinator, StoreConfig, StoreError,
    StoreLayout,
};

fn write_legacy(root: &Path, universe: &str, scores: &[(&str, f64)]) {
    let file = LegacyUniverseFile {
        universe: universe.into(),
        strategies: scores
            .iter()
            .map(|(name, score)| {
                let mut r = StrategyResult::new(*name, universe).with_metric("score", *score);
                r.equity_curve = vec![1.0, 1.0 + score];
                r
            })
            .collect(),
    };
    fs::write(
        root.join(format!("{universe}{LEGACY_SUFFIX}")),
        serde_json::to_string_pretty(&file).unwrap(),
    )
    .unwrap();
}

fn open(tmp: &TempDir, top_n: usize) -> StorageCoordinator {
    let mut config = StoreConfig::new(tmp.path());
    config.top_n = top_n;
    StorageCoordinator::open(config).unwrap()
}

#[test]
fn legacy_metrics_are_normalized() {
    let tmp = TempDir::new().unwrap();
    write_legacy(tmp.path(), "U1", &[("S09", 0.9), ("S05", 0.5), ("S07", 0.7)]);
    write_legacy(tmp.path(), "U2", &[("X", 0.3)]);

    let store = open(&tmp, 2);
    let metrics = store.load_all_metrics().unwrap();
    assert_eq!(metrics.total_strategies, 4);
    assert_eq!(metrics.get("S05", "U1").unwrap().metrics["score"], 0.5);
    assert_eq!(metrics.get("X", "U2").unwrap().universe, "U2");
}

#[test]
fn legacy_detail_follows_top_n() {
    let tmp = TempDir::new().unwrap();
    write_legacy(tmp.path(), "U1", &[("S09", 0.9), ("S05", 0.5), ("S07", 0.7)]);

    let store = open(&tmp, 2);
    let s07 = store.load_detail("S07").unwrap();
    assert_eq!(s07.rank, 2);
    assert_eq!(s07.universe, "U1");
    assert_eq!(s07.equity_curve, vec![1.0, 1.7]);
    assert!(store.load_detail("S05").unwrap_err().is_not_found());
}

#[test]
fn legacy_detail_uses_configured_ranking() {
    let tmp = TempDir::new().unwrap();
    write_legacy(tmp.path(), "U1", &[("S09", 0.9), ("S05", 0.5)]);
    let store = open(&tmp, 1).with_ranking_key(RankingKey::metric_ascending("score"));
    assert_eq!(store.load_detail("S05").unwrap().rank, 1);
    assert!(store.load_detail("S09").unwrap_err().is_not_found());
}

#[test]
fn migration_produces_two_tier_layout() {
    let tmp = TempDir::new().unwrap();
    write_legacy(tmp.path(), "U1", &[("S09", 0.9), ("S05", 0.5), ("S07", 0.7)]);
    write_legacy(tmp.path(), "U2", &[("X", 0.3)]);
    assert!(matches!(detect(tmp.path()).unwrap(), StoreLayout::Legacy(ref f) if f.len() == 2));

    let store = open(&tmp, 2);
    let legacy_metrics = store.load_all_metrics().unwrap();
    let legacy_s07 = store.load_detail("S07").unwrap();

    let reports = store.migrate_legacy().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].universe, "U1");
    assert_eq!(reports[0].details_written, 2);
    assert_eq!(detect(tmp.path()).unwrap(), StoreLayout::TwoTier);

    // Same view before and after migration.
    assert_eq!(store.load_all_metrics().unwrap().strategies, legacy_metrics.strategies);
    assert_eq!(store.load_detail("S07").unwrap(), legacy_s07);
    assert_eq!(store.list_universes().unwrap(), vec!["U1", "U2"]);

    // Migrating again changes nothing.
    let again = store.migrate_legacy().unwrap();
    assert!(again.iter().all(|r| r.metrics_inserted == 0 && r.details_removed == 0));
}

#[test]
fn two_tier_wins_once_present() {
    let tmp = TempDir::new().unwrap();
    write_legacy(tmp.path(), "OLD", &[("legacy_only", 0.9)]);
    let store = open(&tmp, 5);
    let fresh = StrategyResult::new("fresh", "NEW").with_metric("score", 1.0);
    store.save_universe_results("NEW", &[fresh], 5).unwrap();

    let metrics = store.load_all_metrics().unwrap();
    assert_eq!(metrics.total_strategies, 1);
    assert!(store.load_detail("legacy_only").unwrap_err().is_not_found());
}

#[test]
fn malformed_legacy_file_is_corrupt() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(format!("U1{LEGACY_SUFFIX}")), "{\"universe\": 3}").unwrap();
    let store = open(&tmp, 2);
    assert!(matches!(
        store.load_all_metrics().unwrap_err(),
        StoreError::CorruptData { .. }
    ));
    assert!(matches!(
        store.migrate_legacy().unwrap_err(),
        StoreError::CorruptData { .. }
    ));
}
