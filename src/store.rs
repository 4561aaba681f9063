//! On-disk cache for a previously acquired sample, stored as a flat JSON array.
//!
//! The cache is best effort: anything that prevents a clean load is logged and
//! reported as a miss so the caller re-acquires instead of estimating from bad
//! data.

use crate::Sample;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SampleStore {
    path: PathBuf,
}

impl SampleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached sample.
    ///
    /// Returns `None` when the file is missing, unreadable, not a JSON array of
    /// non-negative integers, or (if `expected_len` is given) of the wrong length.
    pub async fn load(&self, expected_len: Option<usize>) -> Option<Sample> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no cached sample found");
                return None;
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to read cached sample; re-acquiring"
                );
                return None;
            }
        };

        let sample: Sample = match serde_json::from_slice(&bytes) {
            Ok(sample) => sample,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "cached sample is corrupt; re-acquiring"
                );
                return None;
            }
        };

        if let Some(expected) = expected_len {
            if sample.len() != expected {
                tracing::warn!(
                    path = %self.path.display(),
                    cached = sample.len(),
                    expected,
                    "cached sample has the wrong length; re-acquiring"
                );
                return None;
            }
        }

        tracing::info!(
            path = %self.path.display(),
            len = sample.len(),
            "numbers loaded from file"
        );
        Some(sample)
    }

    /// Writes `sample`, replacing any previous cache file.
    pub async fn save(&self, sample: &[u64]) -> Result<()> {
        let bytes = serde_json::to_vec(sample).context("failed to serialize sample")?;
        tokio::fs::write(&self.path, bytes)
            .await
            .with_context(|| format!("failed to write sample to {}", self.path.display()))?;

        tracing::info!(path = %self.path.display(), len = sample.len(), "sample saved");
        Ok(())
    }
}
