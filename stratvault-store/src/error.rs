//! Store errors — every variant names the universe and/or strategy involved.

use std::io;
use std::path::PathBuf;

use stratvault_core::domain::ValidationError;
use thiserror::Error;

/// Errors surfaced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("write failed for {target} (universe '{universe}'): {source}")]
    Write {
        universe: String,
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("strategy '{strategy_name}' has no detail artifact")]
    NotFound { strategy_name: String },

    #[error("stored data at {} is unreadable: {reason}", path.display())]
    CorruptData {
        path: PathBuf,
        strategy_name: Option<String>,
        reason: String,
    },

    #[error(
        "strategy '{strategy_name}' already has a detail artifact from universe \
         '{existing_universe}' with {} content (incoming universe '{incoming_universe}')",
        content_label(.identical_content)
    )]
    KeyCollision {
        strategy_name: String,
        existing_universe: String,
        incoming_universe: String,
        identical_content: bool,
    },
}

fn content_label(identical: &bool) -> &'static str {
    if *identical {
        "identical"
    } else {
        "different"
    }
}

impl StoreError {
    pub(crate) fn write(universe: &str, target: impl Into<String>, source: io::Error) -> Self {
        Self::Write {
            universe: universe.to_string(),
            target: target.into(),
            source,
        }
    }

    pub(crate) fn corrupt(
        path: impl Into<PathBuf>,
        strategy_name: Option<&str>,
        reason: impl ToString,
    ) -> Self {
        Self::CorruptData {
            path: path.into(),
            strategy_name: strategy_name.map(str::to_string),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
