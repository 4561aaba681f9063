//! HTTP client for the QRNG endpoint plus the `RandomSource` trait consumed by
//! the acquisition pipeline. Every failure surfaced here is fatal for the run:
//! there is no retry or backoff layer on purpose.

use crate::runtime::config::SamplerConfig;
use crate::source::options::SourceClientOptions;
use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::timeout;

#[derive(Debug)]
pub enum SourceError {
    Timeout { requested: usize },
    Rejected { requested: usize },
    Status { status: u16 },
    LimitExceeded { requested: usize, limit: usize },
    LengthMismatch { expected: usize, got: usize },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Timeout { requested } => {
                write!(f, "qrng request for {requested} numbers timed out")
            }
            SourceError::Rejected { requested } => {
                write!(f, "qrng reported failure for a request of {requested} numbers")
            }
            SourceError::Status { status } => {
                write!(f, "qrng responded with HTTP status {status}")
            }
            SourceError::LimitExceeded { requested, limit } => write!(
                f,
                "requested {requested} numbers but the source allows at most {limit} per call"
            ),
            SourceError::LengthMismatch { expected, got } => write!(
                f,
                "qrng returned {got} numbers (expected {expected})"
            ),
        }
    }
}

impl std::error::Error for SourceError {}

/// A bounded-size supplier of random integers.
///
/// Implementations perform exactly one remote call per invocation and never
/// retry; callers treat any error as fatal.
pub trait RandomSource: Send + Sync {
    fn fetch_batch<'a>(&'a self, count: usize) -> BoxFuture<'a, Result<Vec<u64>>>;
}

/// Wire shape returned by the QRNG endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<u64>,
}

impl BatchResponse {
    pub fn into_numbers(self, requested: usize) -> Result<Vec<u64>, SourceError> {
        if !self.success {
            return Err(SourceError::Rejected { requested });
        }
        Ok(self.data)
    }
}

#[derive(Debug, Clone)]
pub struct QrngClient {
    url: Arc<String>,
    client: reqwest::Client,
    options: SourceClientOptions,
    permits: Arc<Semaphore>,
}

impl RandomSource for QrngClient {
    fn fetch_batch<'a>(&'a self, count: usize) -> BoxFuture<'a, Result<Vec<u64>>> {
        Box::pin(self.fetch(count))
    }
}

impl QrngClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, SourceClientOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: SourceClientOptions) -> Result<Self> {
        options.validate()?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| anyhow!("failed to build QRNG client: {err}"))?;

        Ok(Self {
            url: Arc::new(url.into()),
            client,
            permits: Arc::new(Semaphore::new(options.max_concurrent_requests)),
            options,
        })
    }

    pub fn from_config(config: &SamplerConfig) -> Result<Self> {
        config.validate()?;
        let options = SourceClientOptions {
            request_timeout: config.request_timeout(),
            max_concurrent_requests: config.max_concurrent_requests(),
        };
        Self::with_options(config.source_url().to_owned(), options)
    }

    /// Performs one request for `count` numbers.
    pub async fn fetch(&self, count: usize) -> Result<Vec<u64>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("qrng request limiter closed")?;

        let outcome = timeout(self.options.request_timeout, self.request_once(count)).await;

        match outcome {
            Err(_) => {
                tracing::warn!(count, "qrng request timed out");
                Err(SourceError::Timeout { requested: count }.into())
            }
            Ok(Err(err)) => {
                tracing::warn!(count, error = %err, "qrng request failed");
                Err(err)
            }
            Ok(Ok(numbers)) => {
                tracing::trace!(count, received = numbers.len(), "qrng batch received");
                Ok(numbers)
            }
        }
    }

    async fn request_once(&self, count: usize) -> Result<Vec<u64>> {
        let url = format!("{}{count}", self.url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("qrng request for {count} numbers failed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .context("failed to read qrng response body")?;
        let payload: BatchResponse =
            serde_json::from_slice(&body).context("failed to decode qrng response")?;

        Ok(payload.into_numbers(count)?)
    }
}
