use crate::runtime::telemetry::Telemetry;
use crate::source::{RandomSource, SourceError};
use anyhow::Result;
use std::sync::Arc;
use tokio::time::Instant;

/// Issues single bounded requests against a [`RandomSource`].
#[derive(Clone)]
pub struct BatchRequester {
    source: Arc<dyn RandomSource>,
    limit: usize,
    telemetry: Arc<Telemetry>,
}

impl BatchRequester {
    pub fn new(source: Arc<dyn RandomSource>, limit: usize, telemetry: Arc<Telemetry>) -> Self {
        Self {
            source,
            limit: limit.max(1),
            telemetry,
        }
    }

    /// Maximum count accepted by a single [`Self::fetch`].
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    /// Fetches exactly `count` numbers in one source call.
    ///
    /// A zero count returns immediately without touching the source. Counts above
    /// [`Self::limit`] and responses of the wrong length are errors.
    pub async fn fetch(&self, count: usize) -> Result<Vec<u64>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        if count > self.limit {
            return Err(SourceError::LimitExceeded {
                requested: count,
                limit: self.limit,
            }
            .into());
        }

        let start = Instant::now();
        let outcome = self.source.fetch_batch(count).await;
        self.telemetry.record_source_latency(start.elapsed());

        let numbers = match outcome {
            Ok(numbers) => numbers,
            Err(err) => {
                self.telemetry.record_source_error();
                if matches!(
                    err.downcast_ref::<SourceError>(),
                    Some(SourceError::Timeout { .. })
                ) {
                    self.telemetry.record_source_timeout();
                }
                return Err(err.context(format!("batch of {count} numbers failed")));
            }
        };

        if numbers.len() != count {
            self.telemetry.record_source_error();
            return Err(SourceError::LengthMismatch {
                expected: count,
                got: numbers.len(),
            }
            .into());
        }

        self.telemetry.record_batch(count);
        Ok(numbers)
    }
}
