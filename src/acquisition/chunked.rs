use crate::acquisition::batch::BatchRequester;
use crate::runtime::progress::ProgressSink;
use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

/// Split of a requested total into limit-sized chunks plus a remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub chunk_size: usize,
    pub full_chunks: usize,
    pub remainder: usize,
}

impl ChunkPlan {
    pub fn new(total: usize, limit: usize) -> Self {
        let chunk_size = limit.max(1);
        Self {
            chunk_size,
            full_chunks: total / chunk_size,
            remainder: total % chunk_size,
        }
    }

    pub fn total(&self) -> usize {
        self.full_chunks * self.chunk_size + self.remainder
    }

    /// Request sizes in call order. The trailing remainder is always present,
    /// even when it is zero.
    pub fn sizes(&self) -> impl Iterator<Item = usize> {
        std::iter::repeat(self.chunk_size)
            .take(self.full_chunks)
            .chain(std::iter::once(self.remainder))
    }
}

/// Covers an arbitrary count with sequential [`BatchRequester`] calls.
#[derive(Clone)]
pub struct ChunkedFetcher {
    requester: BatchRequester,
    cancel: Option<CancellationToken>,
}

impl ChunkedFetcher {
    pub fn new(requester: BatchRequester) -> Self {
        Self {
            requester,
            cancel: None,
        }
    }

    /// Stops issuing requests once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Fetches exactly `total` numbers, concatenated in call order.
    ///
    /// `progress` receives `(chunks_done, full_chunks)` after every full chunk and
    /// is finished once the remainder call returns.
    pub async fn fetch_many(&self, total: usize, progress: &dyn ProgressSink) -> Result<Vec<u64>> {
        let plan = ChunkPlan::new(total, self.requester.limit());
        tracing::debug!(
            total,
            full_chunks = plan.full_chunks,
            remainder = plan.remainder,
            "requesting true random numbers"
        );

        let mut numbers = Vec::with_capacity(total);

        for chunk in 0..plan.full_chunks {
            self.ensure_not_cancelled()?;
            let batch = self.requester.fetch(plan.chunk_size).await?;
            numbers.extend(batch);
            progress.update((chunk + 1) as u64, plan.full_chunks as u64);
        }

        self.ensure_not_cancelled()?;
        let batch = self.requester.fetch(plan.remainder).await?;
        numbers.extend(batch);
        progress.finish();

        Ok(numbers)
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                bail!("acquisition cancelled after a fatal error");
            }
        }
        Ok(())
    }
}
