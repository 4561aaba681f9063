pub mod acquisition;
pub mod estimator;
pub mod runtime;
pub mod source;
pub mod store;

/// Ordered collection of fetched random integers.
pub type Sample = Vec<u64>;

pub use acquisition::{AcquisitionCoordinator, AcquisitionParams, BatchRequester, ChunkedFetcher};
pub use estimator::{estimate, gcd, EstimateError};
pub use runtime::config::{SamplerConfig, SamplerConfigBuilder, SamplerConfigParams};
pub use runtime::progress::{render_bar, ConsoleProgress, NoProgress, ProgressSink};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use source::{QrngClient, RandomSource, SourceError};
pub use store::SampleStore;
