use crate::runtime::progress::DEFAULT_PROGRESS_TICKS;
use crate::runtime::telemetry;
use crate::source::options::{DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_REQUEST_TIMEOUT_SECS};
use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SOURCE_URL: &str = "https://qrng.anu.edu.au/API/jsonI.php?type=uint16&length=";
pub const DEFAULT_TOTAL_SAMPLES: usize = 100_000_000;
pub const DEFAULT_BATCH_LIMIT: usize = 1024;
pub const DEFAULT_WORKER_COUNT: usize = 200;
pub const DEFAULT_ACTIVATION_THRESHOLD: usize = 30;
pub const DEFAULT_CACHE_PATH: &str = "nums.txt";

/// Runtime configuration for the sampling pipeline.
///
/// All instances must be constructed via [`SamplerConfig::builder`] or [`SamplerConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    source_url: String,
    total_samples: usize,
    batch_limit: usize,
    worker_count: usize,
    activation_threshold: usize,
    request_timeout: Duration,
    max_concurrent_requests: usize,
    cache_path: PathBuf,
    metrics_interval: Duration,
    progress_ticks: usize,
}

pub struct SamplerConfigParams {
    pub source_url: String,
    pub total_samples: usize,
    pub batch_limit: usize,
    pub worker_count: usize,
    pub activation_threshold: usize,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub cache_path: PathBuf,
    pub metrics_interval: Duration,
    pub progress_ticks: usize,
}

impl SamplerConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> SamplerConfigBuilder {
        SamplerConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: SamplerConfigParams) -> Result<Self> {
        let SamplerConfigParams {
            source_url,
            total_samples,
            batch_limit,
            worker_count,
            activation_threshold,
            request_timeout,
            max_concurrent_requests,
            cache_path,
            metrics_interval,
            progress_ticks,
        } = params;

        let config = Self {
            source_url: source_url.trim().to_owned(),
            total_samples,
            batch_limit,
            worker_count,
            activation_threshold,
            request_timeout,
            max_concurrent_requests,
            cache_path,
            metrics_interval,
            progress_ticks,
        };

        config.validate()?;
        Ok(config)
    }

    /// Builds a configuration from `COPRIME_*` environment variables, using the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(url) = read_env("COPRIME_SOURCE_URL") {
            builder = builder.source_url(url);
        }
        if let Some(total) = parse_env::<usize>("COPRIME_TOTAL_SAMPLES")? {
            builder = builder.total_samples(total);
        }
        if let Some(limit) = parse_env::<usize>("COPRIME_BATCH_LIMIT")? {
            builder = builder.batch_limit(limit);
        }
        if let Some(workers) = parse_env::<usize>("COPRIME_WORKERS")? {
            builder = builder.worker_count(workers);
        }
        if let Some(threshold) = parse_env::<usize>("COPRIME_ACTIVATION_THRESHOLD")? {
            builder = builder.activation_threshold(threshold);
        }
        if let Some(secs) = parse_env::<u64>("COPRIME_REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(in_flight) = parse_env::<usize>("COPRIME_MAX_IN_FLIGHT")? {
            builder = builder.max_concurrent_requests(in_flight);
        }
        if let Some(path) = read_env("COPRIME_CACHE_PATH") {
            builder = builder.cache_path(path);
        }

        builder.build()
    }

    /// Endpoint prefix; the requested count is appended to it verbatim.
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Number of random integers the sample must contain.
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Maximum numbers the source hands out per call.
    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Number of concurrent acquisition workers.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Totals at or below this value are fetched sequentially.
    pub fn activation_threshold(&self) -> usize {
        self.activation_threshold
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Upper bound on requests in flight against the source.
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// File holding the cached sample.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Width of the console progress bar.
    pub fn progress_ticks(&self) -> usize {
        self.progress_ticks
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.source_url)?;

        if self.total_samples == 0 {
            bail!("total_samples must be greater than 0");
        }

        if self.total_samples % 2 != 0 {
            bail!("total_samples must be even so every number has a partner");
        }

        if self.batch_limit == 0 {
            bail!("batch_limit must be greater than 0");
        }

        if self.worker_count == 0 {
            bail!("worker_count must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }

        if self.max_concurrent_requests == 0 {
            bail!("max_concurrent_requests must be greater than 0");
        }

        if self.cache_path.as_os_str().is_empty() {
            bail!("cache_path cannot be empty");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        if self.progress_ticks == 0 {
            bail!("progress_ticks must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SamplerConfigBuilder {
    source_url: Option<String>,
    total_samples: Option<usize>,
    batch_limit: Option<usize>,
    worker_count: Option<usize>,
    activation_threshold: Option<usize>,
    request_timeout: Option<Duration>,
    max_concurrent_requests: Option<usize>,
    cache_path: Option<PathBuf>,
    metrics_interval: Option<Duration>,
    progress_ticks: Option<usize>,
}

impl SamplerConfigBuilder {
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn total_samples(mut self, total: usize) -> Self {
        self.total_samples = Some(total);
        self
    }

    pub fn batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    pub fn worker_count(mut self, workers: usize) -> Self {
        self.worker_count = Some(workers);
        self
    }

    pub fn activation_threshold(mut self, threshold: usize) -> Self {
        self.activation_threshold = Some(threshold);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_concurrent_requests(mut self, in_flight: usize) -> Self {
        self.max_concurrent_requests = Some(in_flight);
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn progress_ticks(mut self, ticks: usize) -> Self {
        self.progress_ticks = Some(ticks);
        self
    }

    pub fn build(self) -> Result<SamplerConfig> {
        let params = SamplerConfigParams {
            source_url: self
                .source_url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_owned()),
            total_samples: self.total_samples.unwrap_or(DEFAULT_TOTAL_SAMPLES),
            batch_limit: self.batch_limit.unwrap_or(DEFAULT_BATCH_LIMIT),
            worker_count: self.worker_count.unwrap_or(DEFAULT_WORKER_COUNT),
            activation_threshold: self
                .activation_threshold
                .unwrap_or(DEFAULT_ACTIVATION_THRESHOLD),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            max_concurrent_requests: self
                .max_concurrent_requests
                .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
            cache_path: self
                .cache_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH)),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
            progress_ticks: self.progress_ticks.unwrap_or(DEFAULT_PROGRESS_TICKS),
        };

        SamplerConfig::new(params)
    }
}

fn validate_url(url: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("source_url must start with http:// or https://");
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match read_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("failed to parse {key}={raw}")),
        None => Ok(None),
    }
}
