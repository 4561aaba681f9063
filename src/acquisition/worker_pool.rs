//! Worker pool used by `AcquisitionCoordinator`.
//!
//! Each worker fetches one share, appends it to the shared aggregate, and
//! counts itself out. The last worker to finish flips a watch channel, which is
//! the barrier the coordinator waits on.

use crate::acquisition::batch::BatchRequester;
use crate::acquisition::chunked::ChunkedFetcher;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::progress::NoProgress;
use anyhow::{Context, Result};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    aggregate: Arc<Mutex<Vec<u64>>>,
    workers_done_rx: watch::Receiver<bool>,
}

pub(crate) struct WorkerPoolParams {
    pub worker_count: usize,
    pub share: usize,
    pub requester: BatchRequester,
    pub run_token: CancellationToken,
    pub fatal_handler: FatalErrorHandler,
}

impl WorkerPool {
    pub(crate) fn launch(params: WorkerPoolParams) -> Self {
        let WorkerPoolParams {
            worker_count,
            share,
            requester,
            run_token,
            fatal_handler,
        } = params;

        let telemetry = requester.telemetry().clone();
        telemetry.record_worker_pool_size(worker_count);

        let aggregate = Arc::new(Mutex::new(Vec::with_capacity(
            share.saturating_mul(worker_count),
        )));
        let remaining_workers = Arc::new(AtomicUsize::new(worker_count));
        let (workers_done_tx, workers_done_rx) = watch::channel(false);
        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let fetcher =
                ChunkedFetcher::new(requester.clone()).with_cancellation(run_token.clone());
            let aggregate = aggregate.clone();
            let remaining_workers = remaining_workers.clone();
            let workers_done = workers_done_tx.clone();
            let fatal_handler = fatal_handler.clone();
            let telemetry = telemetry.clone();

            let handle = tokio::spawn(async move {
                let result = AssertUnwindSafe(async {
                    let numbers = fetcher.fetch_many(share, &NoProgress).await?;
                    append(&aggregate, numbers);
                    Ok::<(), anyhow::Error>(())
                })
                .catch_unwind()
                .await;

                match result {
                    Ok(Ok(())) => {
                        telemetry.record_worker_completed();
                        tracing::trace!(worker = worker_id, share, "worker finished its share");
                    }
                    Ok(Err(err)) => {
                        let context = format!("worker {worker_id} failed");
                        let err = err.context(context.clone());
                        fatal_handler.trigger(context.as_str(), err);
                    }
                    Err(panic_payload) => {
                        let panic_msg = panic_message(panic_payload.as_ref());
                        let context = format!("worker {worker_id} panicked");
                        let panic_error =
                            anyhow::anyhow!("worker {worker_id} panicked: {panic_msg}");
                        fatal_handler.trigger(context.as_str(), panic_error);
                    }
                }

                if remaining_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
                    let _ = workers_done.send(true);
                }
            });

            workers.push(handle);
        }

        if workers.is_empty() {
            let _ = workers_done_tx.send(true);
        }

        Self {
            workers,
            aggregate,
            workers_done_rx,
        }
    }

    /// Blocks until every launched worker has counted itself out.
    pub(crate) async fn wait(&mut self) -> Result<()> {
        self.workers_done_rx
            .wait_for(|done| *done)
            .await
            .context("worker completion signal dropped")?;

        for (worker_id, handle) in self.workers.drain(..).enumerate() {
            if let Err(err) = handle.await {
                tracing::warn!(worker = worker_id, error = %err, "worker task join failed");
            }
        }

        Ok(())
    }

    /// Hands back the aggregated numbers. Call after [`Self::wait`].
    pub(crate) fn into_aggregate(self) -> Vec<u64> {
        match Arc::try_unwrap(self.aggregate) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => {
                std::mem::take(&mut *shared.lock().unwrap_or_else(PoisonError::into_inner))
            }
        }
    }
}

fn append(aggregate: &Mutex<Vec<u64>>, numbers: Vec<u64>) {
    let mut guard = aggregate.lock().unwrap_or_else(PoisonError::into_inner);
    guard.extend(numbers);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
