use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 digest of a strategy's detail content (metrics, trades, curves).
///
/// Two artifacts with the same strategy name but different content hashes are
/// a detail-tier key collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// First `n` hex characters, for log lines and file name suffixes.
    pub fn short(&self, n: usize) -> &str {
        &self.0[..n.min(self.0.len())]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a metrics-tier record: (strategy_name, universe).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub strategy_name: String,
    pub universe: String,
}

impl RecordKey {
    pub fn new(strategy_name: impl Into<String>, universe: impl Into<String>) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            universe: universe.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.strategy_name, self.universe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic() {
        let a = ContentHash::from_bytes(b"payload");
        let b = ContentHash::from_bytes(b"payload");
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert_ne!(a, ContentHash::from_bytes(b"other"));
    }

    #[test]
    fn short_clamps_to_length() {
        let h = ContentHash("abcd".into());
        assert_eq!(h.short(2), "ab");
        assert_eq!(h.short(10), "abcd");
    }

    #[test]
    fn record_key_display() {
        assert_eq!(RecordKey::new("s1", "u1").to_string(), "s1@u1");
    }
}
