//! Metrics tier records — one lightweight summary per (strategy, universe).
//!
//! The collection is merge-only: saves upsert records by key and never remove
//! them. Ordering is insertion order; a replaced record keeps its slot.

use serde::{Deserialize, Serialize};

use super::ids::RecordKey;
use super::result::MetricsMap;
use crate::schema::default_schema_version;

/// Summary of one strategy's performance in one universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub strategy_name: String,
    pub universe: String,
    pub metrics: MetricsMap,
}

impl MetricsRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.strategy_name, &self.universe)
    }

    fn matches(&self, strategy_name: &str, universe: &str) -> bool {
        self.strategy_name == strategy_name && self.universe == universe
    }
}

/// Counts reported by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub replaced: usize,
}

/// Outcome of a single upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    Inserted,
    /// Carries the record that was displaced.
    Replaced(MetricsRecord),
}

/// The complete metrics tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsCollection {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub total_strategies: usize,
    pub strategies: Vec<MetricsRecord>,
}

impl Default for MetricsCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollection {
    pub fn new() -> Self {
        Self {
            schema_version: default_schema_version(),
            total_strategies: 0,
            strategies: Vec::new(),
        }
    }

    /// Insert or replace by (strategy_name, universe).
    pub fn upsert(&mut self, record: MetricsRecord) -> Upsert {
        let outcome = match self.position(&record.strategy_name, &record.universe) {
            Some(idx) => Upsert::Replaced(std::mem::replace(&mut self.strategies[idx], record)),
            None => {
                self.strategies.push(record);
                Upsert::Inserted
            }
        };
        self.total_strategies = self.strategies.len();
        outcome
    }

    /// Upsert every record in order.
    pub fn merge(&mut self, records: impl IntoIterator<Item = MetricsRecord>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for record in records {
            match self.upsert(record) {
                Upsert::Inserted => summary.inserted += 1,
                Upsert::Replaced(_) => summary.replaced += 1,
            }
        }
        summary
    }

    /// Remove a record by key. Only used to undo a failed save.
    pub fn remove(&mut self, strategy_name: &str, universe: &str) -> Option<MetricsRecord> {
        let idx = self.position(strategy_name, universe)?;
        let removed = self.strategies.remove(idx);
        self.total_strategies = self.strategies.len();
        Some(removed)
    }

    pub fn get(&self, strategy_name: &str, universe: &str) -> Option<&MetricsRecord> {
        self.strategies
            .iter()
            .find(|r| r.matches(strategy_name, universe))
    }

    pub fn for_universe<'a>(
        &'a self,
        universe: &'a str,
    ) -> impl Iterator<Item = &'a MetricsRecord> {
        self.strategies.iter().filter(move |r| r.universe == universe)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Recompute `total_strategies` after deserializing a file that may have
    /// been edited by hand.
    pub fn normalize(&mut self) {
        self.total_strategies = self.strategies.len();
    }

    fn position(&self, strategy_name: &str, universe: &str) -> Option<usize> {
        self.strategies
            .iter()
            .position(|r| r.matches(strategy_name, universe))
    }
}
