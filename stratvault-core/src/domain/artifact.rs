//! Detail tier records — full trade history for top-ranked strategies.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ids::ContentHash;
use super::result::{MetricsMap, StrategyResult};
use super::trade::TradeRecord;
use crate::fingerprint::detail_content_hash;
use crate::schema::default_schema_version;

/// Complete record for one selected strategy, keyed by `strategy_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailArtifact {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy_name: String,
    pub universe: String,
    /// 1-based position within the universe's top-N selection.
    pub rank: usize,
    pub metrics: MetricsMap,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<f64>,
    pub drawdown_curve: Vec<f64>,
}

impl DetailArtifact {
    pub fn from_result(result: &StrategyResult, universe: &str, rank: usize) -> Self {
        Self {
            schema_version: default_schema_version(),
            strategy_name: result.strategy_name.clone(),
            universe: universe.to_string(),
            rank,
            metrics: result.metrics.clone(),
            trades: result.trades.clone(),
            equity_curve: result.equity_curve.clone(),
            drawdown_curve: result.drawdown_curve.clone(),
        }
    }

    /// Hash of the strategy's content, independent of universe and rank.
    pub fn content_hash(&self) -> serde_json::Result<ContentHash> {
        detail_content_hash(
            &self.metrics,
            &self.trades,
            &self.equity_curve,
            &self.drawdown_curve,
        )
    }
}

/// The identifying fields of a stored artifact. Deserializing only these skips
/// allocating trades and curves when scanning the detail directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactHeader {
    pub strategy_name: String,
    pub universe: String,
}

/// One selected strategy in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub strategy_name: String,
    pub rank: usize,
}

/// Latest detail-tier membership of a universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub universe: String,
    pub top_n: usize,
    /// Human-readable description of the ranking key used.
    pub ranking_key: String,
    pub saved_at: NaiveDateTime,
    pub selected: Vec<ManifestEntry>,
}

impl UniverseManifest {
    pub fn contains(&self, strategy_name: &str) -> bool {
        self.selected.iter().any(|e| e.strategy_name == strategy_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> StrategyResult {
        let mut r = StrategyResult::new("ma_10_50", "u1").with_metric("score", 0.7);
        r.equity_curve = vec![100.0, 101.5, 99.0];
        r.drawdown_curve = vec![0.0, 0.0, -0.0246];
        r
    }

    #[test]
    fn from_result_copies_all_fields() {
        let r = result();
        let a = DetailArtifact::from_result(&r, "u1", 2);
        assert_eq!(a.rank, 2);
        assert_eq!(a.universe, "u1");
        assert_eq!(a.metrics, r.metrics);
        assert_eq!(a.equity_curve, r.equity_curve);
        assert_eq!(a.drawdown_curve, r.drawdown_curve);
    }

    #[test]
    fn content_hash_ignores_rank_and_universe() {
        let r = result();
        let a = DetailArtifact::from_result(&r, "u1", 1);
        let b = DetailArtifact::from_result(&r, "u2", 7);
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn content_hash_tracks_curves() {
        let r = result();
        let a = DetailArtifact::from_result(&r, "u1", 1);
        let mut changed = r.clone();
        changed.equity_curve.push(98.0);
        let b = DetailArtifact::from_result(&changed, "u1", 1);
        assert_ne!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn header_parses_from_full_artifact() {
        let a = DetailArtifact::from_result(&result(), "u1", 1);
        let json = serde_json::to_string(&a).unwrap();
        let header: ArtifactHeader = serde_json::from_str(&json).unwrap();
        assert_eq!(header.strategy_name, "ma_10_50");
        assert_eq!(header.universe, "u1");
    }
}
