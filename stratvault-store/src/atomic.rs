//! Crash-safe file primitives.
//!
//! Every persisted file is written to a temp file in the destination directory
//! and renamed over the target, so readers never observe a torn write.
//! `WriteJournal` remembers the prior bytes of each touched file so that a
//! multi-file update can be undone when a later step fails.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Bounded retry for transient write failures.
///
/// Attempt `k` (1-based) that fails is followed by a sleep of
/// `initial_backoff_ms * 2^(k-1)` before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 25,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub fn run<T, F>(&self, what: &Path, mut op: F) -> io::Result<T>
    where
        F: FnMut() -> io::Result<T>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.initial_backoff_ms);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && is_transient(&e) => {
                    warn!(
                        path = %what.display(),
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "write failed, retrying"
                    );
                    thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Errors that will not go away by trying again.
fn is_transient(err: &io::Error) -> bool {
    !matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
            | io::ErrorKind::Unsupported
    )
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(path, &bytes)
}

/// Read a file, mapping "does not exist" to `None`.
pub fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove a file, returning whether it existed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Prior state of every file touched during a multi-file update.
#[derive(Debug, Default)]
pub struct WriteJournal {
    entries: Vec<(PathBuf, Option<Vec<u8>>)>,
}

impl WriteJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current contents of `path` before it is modified.
    /// Only the first capture per path is kept.
    pub fn record(&mut self, path: &Path) -> io::Result<()> {
        if self.entries.iter().any(|(p, _)| p == path) {
            return Ok(());
        }
        let before = read_optional(path)?;
        self.entries.push((path.to_path_buf(), before));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restore every recorded file, newest first.
    ///
    /// Keeps going past individual failures and returns the paths that could
    /// not be restored.
    pub fn rollback(self) -> Vec<PathBuf> {
        let mut failed = Vec::new();
        for (path, before) in self.entries.into_iter().rev() {
            let outcome = match &before {
                Some(bytes) => write_atomic(&path, bytes),
                None => remove_if_exists(&path).map(|_| ()),
            };
            match outcome {
                Ok(()) => debug!(path = %path.display(), "restored"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "rollback could not restore file");
                    failed.push(path);
                }
            }
        }
        failed
    }
}
