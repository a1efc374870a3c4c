//! Domain types for StratVault

pub mod artifact;
pub mod ids;
pub mod metrics;
pub mod result;
pub mod trade;

pub use artifact::{ArtifactHeader, DetailArtifact, ManifestEntry, UniverseManifest};
pub use ids::{ContentHash, RecordKey};
pub use metrics::{MergeSummary, MetricsCollection, MetricsRecord, Upsert};
pub use result::{MetricsMap, StrategyResult, ValidationError};
pub use trade::{TradeRecord, TradeSide};
