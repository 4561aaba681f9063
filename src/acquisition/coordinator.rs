use crate::acquisition::batch::BatchRequester;
use crate::acquisition::chunked::ChunkedFetcher;
use crate::acquisition::worker_pool::{WorkerPool, WorkerPoolParams};
use crate::runtime::config::SamplerConfig;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::progress::ProgressSink;
use crate::runtime::telemetry::Telemetry;
use crate::source::RandomSource;
use anyhow::{ensure, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Equal per-worker shares plus the leftover fetched by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerShare {
    pub workers: usize,
    pub per_worker: usize,
    pub leftover: usize,
}

impl WorkerShare {
    pub fn new(total: usize, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            per_worker: total / workers,
            leftover: total % workers,
        }
    }
}

pub struct AcquisitionParams {
    pub batch_limit: usize,
    pub worker_count: usize,
    pub activation_threshold: usize,
}

impl From<&SamplerConfig> for AcquisitionParams {
    fn from(config: &SamplerConfig) -> Self {
        Self {
            batch_limit: config.batch_limit(),
            worker_count: config.worker_count(),
            activation_threshold: config.activation_threshold(),
        }
    }
}

/// Top-level entry point that turns a requested total into a complete sample.
pub struct AcquisitionCoordinator {
    requester: BatchRequester,
    worker_count: usize,
    activation_threshold: usize,
    progress: Arc<dyn ProgressSink>,
}

impl AcquisitionCoordinator {
    pub fn new(
        source: Arc<dyn RandomSource>,
        params: AcquisitionParams,
        telemetry: Arc<Telemetry>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            requester: BatchRequester::new(source, params.batch_limit, telemetry),
            worker_count: params.worker_count.max(1),
            activation_threshold: params.activation_threshold,
            progress,
        }
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        self.requester.telemetry()
    }

    /// Acquires exactly `total` numbers or fails without a partial result.
    ///
    /// Totals at or below the activation threshold are fetched sequentially with
    /// progress. Larger totals are split across the worker pool while the calling
    /// task fetches the leftover share with progress; the call returns once every
    /// worker has finished. Element order across workers is unspecified.
    pub async fn acquire(&self, total: usize) -> Result<Vec<u64>> {
        if total <= self.activation_threshold {
            tracing::debug!(total, "fetching sequentially below activation threshold");
            return ChunkedFetcher::new(self.requester.clone())
                .fetch_many(total, self.progress.as_ref())
                .await;
        }

        let share = WorkerShare::new(total, self.worker_count);
        tracing::info!(
            total,
            workers = share.workers,
            per_worker = share.per_worker,
            leftover = share.leftover,
            "starting concurrent acquisition"
        );

        let run_token = CancellationToken::new();
        let fatal_handler = FatalErrorHandler::new(run_token.clone());
        let mut pool = WorkerPool::launch(WorkerPoolParams {
            worker_count: share.workers,
            share: share.per_worker,
            requester: self.requester.clone(),
            run_token: run_token.clone(),
            fatal_handler: fatal_handler.clone(),
        });

        let leftover = ChunkedFetcher::new(self.requester.clone())
            .with_cancellation(run_token)
            .fetch_many(share.leftover, self.progress.as_ref())
            .await;
        let leftover = match leftover {
            Ok(numbers) => numbers,
            Err(err) => {
                fatal_handler.trigger("leftover share failed", err);
                Vec::new()
            }
        };

        pool.wait().await?;

        if let Some(err) = fatal_handler.error() {
            return Err(err);
        }

        let mut sample = pool.into_aggregate();
        sample.extend(leftover);

        ensure!(
            sample.len() == total,
            "acquired {} numbers but {total} were requested",
            sample.len()
        );

        tracing::info!(total, "concurrent acquisition complete");
        Ok(sample)
    }
}
