//! Content fingerprinting — deterministic identification of strategy output.
//!
//! - `detail_content_hash`: BLAKE3 over the canonical JSON of metrics, trades
//!   and curves. Universe and rank are excluded, so the same strategy output
//!   saved under two universes hashes identically.
//! - `key_digest`: short BLAKE3 digest of a raw key, used to keep sanitized
//!   file names injective.

use serde::Serialize;

use crate::domain::{ContentHash, MetricsMap, StrategyResult, TradeRecord};

#[derive(Serialize)]
struct DetailContent<'a> {
    metrics: &'a MetricsMap,
    trades: &'a [TradeRecord],
    equity_curve: &'a [f64],
    drawdown_curve: &'a [f64],
}

/// Hash of a strategy's detail content.
///
/// Canonical serialization: metrics are a `BTreeMap` (sorted keys) and the
/// remaining fields are ordered sequences, so the JSON is deterministic.
pub fn detail_content_hash(
    metrics: &MetricsMap,
    trades: &[TradeRecord],
    equity_curve: &[f64],
    drawdown_curve: &[f64],
) -> serde_json::Result<ContentHash> {
    let content = DetailContent {
        metrics,
        trades,
        equity_curve,
        drawdown_curve,
    };
    let bytes = serde_json::to_vec(&content)?;
    Ok(ContentHash::from_bytes(&bytes))
}

impl StrategyResult {
    pub fn content_hash(&self) -> serde_json::Result<ContentHash> {
        detail_content_hash(
            &self.metrics,
            &self.trades,
            &self.equity_curve,
            &self.drawdown_curve,
        )
    }
}

/// Short hex digest of an arbitrary key.
pub fn key_digest(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex()[..8].to_string()
}
