//! On-disk schema contract — the boundary between the backtest pipeline (writer)
//! and the dashboard (reader).
//!
//! Defines file names, directory layout, and the schema version stamped into
//! every persisted object. Readers reject versions newer than they understand.
//!
//! Layout under a store root:
//! - `metrics.json` — the metrics tier (`MetricsCollection`)
//! - `details/<key>.json` — one `DetailArtifact` per selected strategy
//! - `manifests/<key>.json` — one `UniverseManifest` per saved universe
//! - `<universe>.results.json` — legacy per-universe files (read-only input)

/// Current schema version for persisted objects.
pub const SCHEMA_VERSION: u32 = 1;

pub const METRICS_FILE: &str = "metrics.json";
pub const DETAILS_DIR: &str = "details";
pub const MANIFESTS_DIR: &str = "manifests";
pub const ARTIFACT_EXTENSION: &str = "json";
pub const LEGACY_SUFFIX: &str = ".results.json";

/// Default schema version for serde deserialization of files written before
/// the field existed.
pub fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Whether a persisted object with `version` can be read by this build.
pub fn is_supported(version: u32) -> bool {
    (1..=SCHEMA_VERSION).contains(&version)
}
