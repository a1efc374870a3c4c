//! StratVault store — two-tier persistence for backtest results.
//!
//! This crate builds on `stratvault-core` to provide:
//! - Metrics aggregation for every strategy of a universe
//! - Deterministic top-N selection by a configurable ranking key
//! - Per-strategy detail artifacts for the selected strategies only
//! - A storage coordinator that keeps both tiers consistent
//! - Read-side normalization of the legacy per-universe file format
//! - CSV export of both tiers

pub mod aggregate;
pub mod atomic;
pub mod config;
pub mod coordinator;
pub mod detail;
pub mod error;
pub mod export;
pub mod layout;
pub mod manifest;
pub mod metrics_tier;
pub mod selector;

pub use aggregate::{aggregate, validate_batch};
pub use atomic::{RetryPolicy, WriteJournal};
pub use config::{RankingConfig, StoreConfig};
pub use coordinator::{SaveReport, StorageCoordinator};
pub use detail::{build_artifacts, key_file_name, DetailWriter};
pub use error::{StoreError, StoreResult};
pub use export::{export_curves_csv, export_metrics_csv, export_trades_csv, save_detail_csv};
pub use layout::{detect, LegacyUniverseFile, StoreLayout};
pub use manifest::ManifestStore;
pub use metrics_tier::{MergeCommit, MetricsTier, UndoEntry};
pub use selector::{select_top, RankingKey, DEFAULT_SCORE_METRIC, DEFAULT_TOP_N};
