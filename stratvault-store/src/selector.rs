//! Top-N selection — deterministic ranking of strategies within a universe.
//!
//! Ranking is descending by the key value. Ties are broken by `strategy_name`
//! ascending, so detail-tier membership is reproducible across runs. Results
//! whose key is missing or NaN rank after every finite value.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use stratvault_core::domain::StrategyResult;

use crate::error::{StoreError, StoreResult};

/// Metric consulted when no ranking override is configured.
pub const DEFAULT_SCORE_METRIC: &str = "score";

/// Default number of strategies per universe that receive detail artifacts.
pub const DEFAULT_TOP_N: usize = 50;

type ScoreFn = dyn Fn(&StrategyResult) -> f64 + Send + Sync;

/// What to rank strategies by.
#[derive(Clone)]
pub enum RankingKey {
    /// A named entry of the metrics mapping.
    ///
    /// `lower_is_better` flips the direction for metrics such as drawdown
    /// magnitude or volatility.
    Metric {
        name: String,
        lower_is_better: bool,
    },
    /// Caller-supplied scoring function. Higher is better.
    Custom {
        label: String,
        score: Arc<ScoreFn>,
    },
}

impl Default for RankingKey {
    fn default() -> Self {
        Self::metric(DEFAULT_SCORE_METRIC)
    }
}

impl fmt::Debug for RankingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RankingKey({self})")
    }
}

impl fmt::Display for RankingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric {
                name,
                lower_is_better: false,
            } => write!(f, "{name} desc"),
            Self::Metric {
                name,
                lower_is_better: true,
            } => write!(f, "{name} asc"),
            Self::Custom { label, .. } => write!(f, "custom:{label}"),
        }
    }
}

impl RankingKey {
    pub fn metric(name: impl Into<String>) -> Self {
        Self::Metric {
            name: name.into(),
            lower_is_better: false,
        }
    }

    pub fn metric_ascending(name: impl Into<String>) -> Self {
        Self::Metric {
            name: name.into(),
            lower_is_better: true,
        }
    }

    pub fn custom<F>(label: impl Into<String>, score: F) -> Self
    where
        F: Fn(&StrategyResult) -> f64 + Send + Sync + 'static,
    {
        Self::Custom {
            label: label.into(),
            score: Arc::new(score),
        }
    }

    /// Score used for ordering, normalized so that higher is always better.
    /// `None` means the result cannot be scored and ranks last.
    pub fn score(&self, result: &StrategyResult) -> Option<f64> {
        let raw = match self {
            Self::Metric {
                name,
                lower_is_better,
            } => result
                .metric(name)
                .map(|v| if *lower_is_better { -v } else { v }),
            Self::Custom { score, .. } => Some(score(result)),
        };
        raw.filter(|v| !v.is_nan())
    }
}

/// Total order used for selection: best first.
fn compare(key: &RankingKey, a: &StrategyResult, b: &StrategyResult) -> Ordering {
    let by_score = match (key.score(a), key.score(b)) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score.then_with(|| a.strategy_name.cmp(&b.strategy_name))
}

/// Rank `results` and return the best `n`, best first.
///
/// `n == 0` is a configuration error. If `n` exceeds the number of results,
/// every result is returned.
pub fn select_top<'a>(
    results: &'a [StrategyResult],
    n: usize,
    key: &RankingKey,
) -> StoreResult<Vec<&'a StrategyResult>> {
    if n == 0 {
        return Err(StoreError::Config("top_n must be a positive integer".into()));
    }
    let mut ranked: Vec<&StrategyResult> = results.iter().collect();
    ranked.sort_by(|a, b| compare(key, a, b));
    ranked.truncate(n);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result(name: &str, score: f64) -> StrategyResult {
        StrategyResult::new(name, "u1").with_metric(DEFAULT_SCORE_METRIC, score)
    }

    fn names(selected: &[&StrategyResult]) -> Vec<String> {
        selected.iter().map(|r| r.strategy_name.clone()).collect()
    }

    #[test]
    fn picks_highest_scores_in_order() {
        let results = vec![result("a", 0.9), result("b", 0.5), result("c", 0.7)];
        let top = select_top(&results, 2, &RankingKey::default()).unwrap();
        assert_eq!(names(&top), vec!["a", "c"]);
    }

    #[test]
    fn ties_break_by_name_ascending() {
        let results = vec![result("zeta", 1.0), result("alpha", 1.0), result("mid", 1.0)];
        let top = select_top(&results, 3, &RankingKey::default()).unwrap();
        assert_eq!(names(&top), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn n_larger_than_input_selects_all() {
        let results = vec![result("a", 0.1), result("b", 0.2)];
        let top = select_top(&results, 50, &RankingKey::default()).unwrap();
        assert_eq!(names(&top), vec!["b", "a"]);
    }

    #[test]
    fn zero_n_is_config_error() {
        let results = vec![result("a", 0.1)];
        let err = select_top(&results, 0, &RankingKey::default()).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn empty_input_selects_nothing() {
        let top = select_top(&[], 5, &RankingKey::default()).unwrap();
        assert!(top.is_empty());
    }

    #[test]
    fn missing_metric_ranks_last() {
        let results = vec![
            StrategyResult::new("unscored", "u1").with_metric("sharpe", 3.0),
            result("low", -5.0),
        ];
        let top = select_top(&results, 2, &RankingKey::default()).unwrap();
        assert_eq!(names(&top), vec!["low", "unscored"]);
    }

    #[test]
    fn lower_is_better_flips_order() {
        let results = vec![
            StrategyResult::new("deep", "u1").with_metric("max_dd", 0.30),
            StrategyResult::new("shallow", "u1").with_metric("max_dd", 0.05),
        ];
        let top = select_top(&results, 1, &RankingKey::metric_ascending("max_dd")).unwrap();
        assert_eq!(names(&top), vec!["shallow"]);
    }

    #[test]
    fn custom_key_overrides_metric() {
        let results = vec![
            StrategyResult::new("few", "u1").with_metric("trades", 3.0),
            StrategyResult::new("many", "u1").with_metric("trades", 300.0),
        ];
        let key = RankingKey::custom("trade_count", |r| r.metric("trades").unwrap_or(0.0));
        let top = select_top(&results, 1, &key).unwrap();
        assert_eq!(names(&top), vec!["many"]);
        assert_eq!(key.to_string(), "custom:trade_count");
    }

    #[test]
    fn display_describes_direction() {
        assert_eq!(RankingKey::default().to_string(), "score desc");
        assert_eq!(RankingKey::metric_ascending("max_dd").to_string(), "max_dd asc");
    }

    proptest! {
        #[test]
        fn selection_is_sorted_and_bounded(
            scores in prop::collection::vec(-10.0f64..10.0, 0..40),
            n in 1usize..60,
        ) {
            let results: Vec<StrategyResult> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| result(&format!("s{i:03}"), *s))
                .collect();
            let key = RankingKey::default();
            let top = select_top(&results, n, &key).unwrap();

            prop_assert_eq!(top.len(), n.min(results.len()));
            for pair in top.windows(2) {
                prop_assert!(compare(&key, pair[0], pair[1]) != Ordering::Greater);
            }
            // Nothing left out beats the weakest selected entry.
            if let Some(last) = top.last() {
                for r in &results {
                    if !top.iter().any(|t| t.strategy_name == r.strategy_name) {
                        prop_assert!(compare(&key, last, r) == Ordering::Less);
                    }
                }
            }
        }

        #[test]
        fn selection_ignores_input_order(
            scores in prop::collection::vec(0.0f64..1.0, 1..20),
            n in 1usize..25,
        ) {
            let results: Vec<StrategyResult> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| result(&format!("s{i:03}"), *s))
                .collect();
            let mut reversed = results.clone();
            reversed.reverse();
            let key = RankingKey::default();
            let a = names(&select_top(&results, n, &key).unwrap());
            let b = names(&select_top(&reversed, n, &key).unwrap());
            prop_assert_eq!(a, b);
        }
    }
}
