//! Metrics aggregation — the always-on, lightweight half of a save.
//!
//! Turns a universe's results into metrics-tier records, dropping trades and
//! curves. Pure transform: no I/O, no shared state.

use std::collections::HashSet;

use stratvault_core::domain::{MetricsRecord, StrategyResult, ValidationError};

use crate::error::StoreResult;

/// Validate a whole batch for `universe`.
///
/// Checks the universe id, every result, and name uniqueness within the batch.
/// Runs before any mutation so that a rejected save leaves no trace.
pub fn validate_batch(universe: &str, results: &[StrategyResult]) -> StoreResult<()> {
    if universe.trim().is_empty() {
        return Err(ValidationError::EmptyUniverse.into());
    }
    let mut seen = HashSet::with_capacity(results.len());
    for (index, result) in results.iter().enumerate() {
        result.validate(universe, index)?;
        if !seen.insert(result.strategy_name.as_str()) {
            return Err(ValidationError::DuplicateStrategy {
                universe: universe.to_string(),
                strategy_name: result.strategy_name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// One `MetricsRecord` per result, preserving input order.
pub fn aggregate(universe: &str, results: &[StrategyResult]) -> StoreResult<Vec<MetricsRecord>> {
    validate_batch(universe, results)?;
    Ok(results
        .iter()
        .map(|r| MetricsRecord {
            strategy_name: r.strategy_name.clone(),
            universe: universe.to_string(),
            metrics: r.metrics.clone(),
        })
        .collect())
}
