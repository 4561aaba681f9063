use crate::acquisition::{AcquisitionCoordinator, AcquisitionParams};
use crate::estimator::estimate_with_progress;
use crate::runtime::config::SamplerConfig;
use crate::runtime::progress::{ConsoleProgress, ProgressSink};
use crate::runtime::telemetry::{spawn_metrics_reporter, Telemetry};
use crate::source::{QrngClient, RandomSource};
use crate::store::SampleStore;
use crate::Sample;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wires the sample cache, the acquisition pipeline, and the estimator together.
pub struct Runner {
    config: SamplerConfig,
    source: Arc<dyn RandomSource>,
    store: SampleStore,
    telemetry: Arc<Telemetry>,
    progress: Arc<dyn ProgressSink>,
}

impl Runner {
    /// Creates a runner backed by the HTTP QRNG client described by `config`.
    pub fn new(config: SamplerConfig) -> Result<Self> {
        let source = Arc::new(QrngClient::from_config(&config)?);
        Ok(Self::with_source(config, source))
    }

    /// Creates a runner that draws numbers from an arbitrary source.
    pub fn with_source(config: SamplerConfig, source: Arc<dyn RandomSource>) -> Self {
        let store = SampleStore::new(config.cache_path());
        let progress = Arc::new(ConsoleProgress::new(config.progress_ticks()));
        Self {
            config,
            source,
            store,
            telemetry: Arc::new(Telemetry::default()),
            progress,
        }
    }

    /// Replaces the console progress bar.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Returns the cached sample if a valid one exists, otherwise acquires a
    /// fresh one and caches it.
    pub async fn load_or_acquire(&self) -> Result<Sample> {
        let total = self.config.total_samples();
        if let Some(sample) = self.store.load(Some(total)).await {
            return Ok(sample);
        }

        let reporter_shutdown = CancellationToken::new();
        let reporter = spawn_metrics_reporter(
            self.telemetry.clone(),
            reporter_shutdown.clone(),
            self.config.metrics_interval(),
        );

        let coordinator = AcquisitionCoordinator::new(
            self.source.clone(),
            AcquisitionParams::from(&self.config),
            self.telemetry.clone(),
            self.progress.clone(),
        );
        let acquired = coordinator.acquire(total).await;

        reporter_shutdown.cancel();
        if let Err(err) = reporter.await {
            tracing::warn!(error = %err, "metrics reporter task panicked");
        }

        let sample = acquired.context("failed to acquire random sample")?;

        if let Err(err) = self.store.save(&sample).await {
            tracing::warn!(error = %err, "failed to cache sample; continuing without it");
        }

        Ok(sample)
    }

    /// Produces the estimate, acquiring the sample first if necessary.
    pub async fn run(&self) -> Result<f64> {
        let sample = self.load_or_acquire().await?;
        tracing::info!(len = sample.len(), "numbers loaded");

        let progress = self.progress.clone();
        let estimate = tokio::task::spawn_blocking(move || {
            estimate_with_progress(&sample, progress.as_ref())
        })
        .await
        .context("estimator task failed")??;

        Ok(estimate)
    }
}
