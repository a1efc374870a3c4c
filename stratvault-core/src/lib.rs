//! StratVault Core — domain types shared by the store and its callers.
//!
//! This crate contains:
//! - Input records handed over by the backtest engine (`StrategyResult`, `TradeRecord`)
//! - Metrics tier records (`MetricsRecord`, `MetricsCollection`)
//! - Detail tier records (`DetailArtifact`, `UniverseManifest`)
//! - Content fingerprinting for detail-tier collision detection
//! - The on-disk schema contract (file names, schema version)

pub mod domain;
pub mod fingerprint;
pub mod schema;
