use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Output goes to stderr; stdout is reserved for the progress bar and the final estimate.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Rolling counters describing acquisition progress.
#[derive(Default, Debug)]
pub struct Telemetry {
    batches_fetched: AtomicU64,
    numbers_fetched: AtomicU64,
    source_errors: AtomicU64,
    source_timeouts: AtomicU64,
    source_calls: AtomicU64,
    source_latency_ns: AtomicU64,
    workers_completed: AtomicU64,
    worker_pool_size: AtomicUsize,
}

impl Telemetry {
    pub fn record_batch(&self, numbers: usize) {
        self.batches_fetched.fetch_add(1, Ordering::Relaxed);
        self.numbers_fetched
            .fetch_add(numbers as u64, Ordering::Relaxed);
    }

    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_timeout(&self) {
        self.source_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the wall time of one source call, successful or not.
    pub fn record_source_latency(&self, latency: Duration) {
        self.source_calls.fetch_add(1, Ordering::Relaxed);
        self.source_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_worker_completed(&self) {
        self.workers_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_pool_size(&self, workers: usize) {
        self.worker_pool_size.store(workers, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            batches_fetched: self.batches_fetched.load(Ordering::Relaxed),
            numbers_fetched: self.numbers_fetched.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            source_timeouts: self.source_timeouts.load(Ordering::Relaxed),
            source_calls: self.source_calls.load(Ordering::Relaxed),
            workers_completed: self.workers_completed.load(Ordering::Relaxed),
            average_latency_ms: self.average_latency_ms(),
        }
    }

    /// Mean source call latency in milliseconds, or 0 before the first call.
    pub fn average_latency_ms(&self) -> f64 {
        let calls = self.source_calls.load(Ordering::Relaxed);
        if calls == 0 {
            return 0.0;
        }
        let total_ns = self.source_latency_ns.load(Ordering::Relaxed);
        (total_ns as f64 / calls as f64) / 1_000_000.0
    }

    pub fn batches_fetched(&self) -> u64 {
        self.batches_fetched.load(Ordering::Relaxed)
    }

    pub fn numbers_fetched(&self) -> u64 {
        self.numbers_fetched.load(Ordering::Relaxed)
    }

    pub fn source_errors(&self) -> u64 {
        self.source_errors.load(Ordering::Relaxed)
    }

    pub fn source_timeouts(&self) -> u64 {
        self.source_timeouts.load(Ordering::Relaxed)
    }

    pub fn source_calls(&self) -> u64 {
        self.source_calls.load(Ordering::Relaxed)
    }

    pub fn workers_completed(&self) -> u64 {
        self.workers_completed.load(Ordering::Relaxed)
    }

    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TelemetrySnapshot {
    pub batches_fetched: u64,
    pub numbers_fetched: u64,
    pub source_errors: u64,
    pub source_timeouts: u64,
    pub source_calls: u64,
    pub workers_completed: u64,
    pub average_latency_ms: f64,
}

/// Spawns a background task that periodically logs fetch throughput and error counts.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(target: "coprimepi::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current_snapshot = telemetry.snapshot();
                    let fetched_delta = current_snapshot
                        .numbers_fetched
                        .saturating_sub(last_snapshot.numbers_fetched);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        fetched_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "coprimepi::metrics",
                        throughput = format!("{throughput:.2}"),
                        fetched = current_snapshot.numbers_fetched,
                        batches = current_snapshot.batches_fetched,
                        workers_completed = current_snapshot.workers_completed,
                        workers = telemetry.worker_pool_size(),
                        source_calls = current_snapshot.source_calls,
                        source_errors = current_snapshot.source_errors,
                        source_timeouts = current_snapshot.source_timeouts,
                        avg_latency_ms = format!("{:.2}", current_snapshot.average_latency_ms),
                        "acquisition metrics snapshot"
                    );

                    last_snapshot = current_snapshot;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
