//! StrategyResult — one strategy's backtest output for one universe.
//!
//! Produced by the external backtest engine and handed to the store as-is.
//! The metrics mapping is open-ended: any named scalar the engine computes
//! travels through untouched. Only the save boundary validates it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::trade::TradeRecord;

/// Named numeric metrics. `BTreeMap` keeps serialization order deterministic,
/// which the content hash relies on.
pub type MetricsMap = BTreeMap<String, f64>;

/// Malformed input rejected before any storage mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("universe identifier is empty")]
    EmptyUniverse,

    #[error("result #{index} in universe '{universe}' has no strategy_name")]
    MissingStrategyName { universe: String, index: usize },

    #[error("strategy '{strategy_name}' in universe '{universe}' has no metrics")]
    MissingMetrics {
        universe: String,
        strategy_name: String,
    },

    #[error(
        "strategy '{strategy_name}' in universe '{universe}' has non-finite metric '{metric}'"
    )]
    NonFiniteMetric {
        universe: String,
        strategy_name: String,
        metric: String,
    },

    #[error(
        "strategy '{strategy_name}' in universe '{universe}' has non-finite value at {field}"
    )]
    NonFiniteSample {
        universe: String,
        strategy_name: String,
        field: String,
    },

    #[error("strategy '{strategy_name}' appears more than once in universe '{universe}'")]
    DuplicateStrategy {
        universe: String,
        strategy_name: String,
    },

    #[error(
        "strategy '{strategy_name}' belongs to universe '{found}' but was saved under '{expected}'"
    )]
    UniverseMismatch {
        strategy_name: String,
        expected: String,
        found: String,
    },
}

/// Complete backtest output for a single strategy within a single universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy_name: String,
    /// May be left empty by producers; the store stamps it with the universe
    /// the result is saved under.
    #[serde(default)]
    pub universe: String,
    #[serde(default)]
    pub metrics: MetricsMap,
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
    #[serde(default)]
    pub equity_curve: Vec<f64>,
    #[serde(default)]
    pub drawdown_curve: Vec<f64>,
}

impl StrategyResult {
    pub fn new(strategy_name: impl Into<String>, universe: impl Into<String>) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            universe: universe.into(),
            metrics: MetricsMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            drawdown_curve: Vec::new(),
        }
    }

    /// Builder-style helper for setting a single metric.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Check the fields the store depends on.
    ///
    /// `index` is the position in the caller's batch, used only for error
    /// reporting when the name itself is missing.
    pub fn validate(&self, universe: &str, index: usize) -> Result<(), ValidationError> {
        if self.strategy_name.trim().is_empty() {
            return Err(ValidationError::MissingStrategyName {
                universe: universe.to_string(),
                index,
            });
        }
        if !self.universe.is_empty() && self.universe != universe {
            return Err(ValidationError::UniverseMismatch {
                strategy_name: self.strategy_name.clone(),
                expected: universe.to_string(),
                found: self.universe.clone(),
            });
        }
        if self.metrics.is_empty() {
            return Err(ValidationError::MissingMetrics {
                universe: universe.to_string(),
                strategy_name: self.strategy_name.clone(),
            });
        }
        // JSON has no encoding for NaN/Inf; they would not survive a round-trip.
        if let Some((name, _)) = self.metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::NonFiniteMetric {
                universe: universe.to_string(),
                strategy_name: self.strategy_name.clone(),
                metric: name.clone(),
            });
        }
        if let Some(field) = self.first_non_finite_sample() {
            return Err(ValidationError::NonFiniteSample {
                universe: universe.to_string(),
                strategy_name: self.strategy_name.clone(),
                field,
            });
        }
        Ok(())
    }

    /// Location of the first NaN/Inf in the curves or trades, e.g.
    /// `equity_curve[3]` or `trades[0].net_pnl`.
    fn first_non_finite_sample(&self) -> Option<String> {
        let curves = [
            ("equity_curve", &self.equity_curve),
            ("drawdown_curve", &self.drawdown_curve),
        ];
        for (label, curve) in curves {
            if let Some(i) = curve.iter().position(|v| !v.is_finite()) {
                return Some(format!("{label}[{i}]"));
            }
        }
        self.trades.iter().enumerate().find_map(|(i, t)| {
            t.float_fields()
                .into_iter()
                .find(|(_, v)| !v.is_finite())
                .map(|(field, _)| format!("trades[{i}].{field}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_result_passes() {
        let r = StrategyResult::new("ma_10_50", "u1").with_metric("score", 0.9);
        assert!(r.validate("u1", 0).is_ok());
    }

    #[test]
    fn empty_universe_field_is_accepted() {
        let r = StrategyResult::new("ma_10_50", "").with_metric("score", 0.9);
        assert!(r.validate("u1", 0).is_ok());
    }

    #[test]
    fn blank_name_rejected() {
        let r = StrategyResult::new("  ", "u1").with_metric("score", 0.9);
        assert_eq!(
            r.validate("u1", 3),
            Err(ValidationError::MissingStrategyName {
                universe: "u1".into(),
                index: 3
            })
        );
    }

    #[test]
    fn empty_metrics_rejected() {
        let r = StrategyResult::new("s", "u1");
        assert!(matches!(
            r.validate("u1", 0),
            Err(ValidationError::MissingMetrics { .. })
        ));
    }

    #[test]
    fn nan_metric_rejected() {
        let r = StrategyResult::new("s", "u1").with_metric("sharpe", f64::NAN);
        match r.validate("u1", 0) {
            Err(ValidationError::NonFiniteMetric { metric, .. }) => assert_eq!(metric, "sharpe"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn nan_curve_sample_rejected() {
        let mut r = StrategyResult::new("s", "u1").with_metric("score", 1.0);
        r.equity_curve = vec![100.0, f64::NAN];
        assert_eq!(
            r.validate("u1", 0),
            Err(ValidationError::NonFiniteSample {
                universe: "u1".into(),
                strategy_name: "s".into(),
                field: "equity_curve[1]".into(),
            })
        );

        r.equity_curve = vec![100.0];
        r.drawdown_curve = vec![0.0, f64::NEG_INFINITY];
        match r.validate("u1", 0) {
            Err(ValidationError::NonFiniteSample { field, .. }) => {
                assert_eq!(field, "drawdown_curve[1]")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn infinite_trade_field_rejected() {
        let mut r = StrategyResult::new("s", "u1").with_metric("score", 1.0);
        let trade: TradeRecord = serde_json::from_str(
            r#"{
                "symbol": "SPY", "side": "Long",
                "entry_date": "2024-01-05", "entry_price": 100.0,
                "exit_date": "2024-01-11", "exit_price": 110.0,
                "quantity": 5.0, "gross_pnl": 50.0, "commission": 1.0,
                "net_pnl": 49.0, "bars_held": 4
            }"#,
        )
        .unwrap();
        let mut bad = trade.clone();
        bad.mfe = f64::INFINITY;
        r.trades = vec![trade, bad];
        match r.validate("u1", 0) {
            Err(ValidationError::NonFiniteSample { field, .. }) => {
                assert_eq!(field, "trades[1].mfe")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn foreign_universe_rejected() {
        let r = StrategyResult::new("s", "u2").with_metric("score", 1.0);
        assert!(matches!(
            r.validate("u1", 0),
            Err(ValidationError::UniverseMismatch { .. })
        ));
    }

    #[test]
    fn missing_optional_fields_deserialize_empty() {
        let r: StrategyResult =
            serde_json::from_str(r#"{"strategy_name":"s","metrics":{"score":1.5}}"#).unwrap();
        assert!(r.universe.is_empty());
        assert!(r.trades.is_empty());
        assert_eq!(r.metric("score"), Some(1.5));
    }
}
