//! Acquisition pipeline: bounded single-batch requests, sequential chunking of
//! larger counts, and the worker pool that fans a huge total out across
//! concurrent tasks.

pub mod batch;
pub mod chunked;
pub mod coordinator;
mod worker_pool;

pub use batch::BatchRequester;
pub use chunked::{ChunkPlan, ChunkedFetcher};
pub use coordinator::{AcquisitionCoordinator, AcquisitionParams, WorkerShare};
