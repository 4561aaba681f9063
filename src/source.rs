//! Remote random-number source plumbing: the `RandomSource` seam, the HTTP
//! client for the QRNG endpoint, and client options.

pub mod client;
pub mod options;

pub use client::{BatchResponse, QrngClient, RandomSource, SourceError};
pub use options::SourceClientOptions;
