//! Runtime glue: configuration, fatal error capture, progress rendering,
//! telemetry, and the runner that ties the pipeline together.

pub mod config;
pub mod fatal;
pub mod progress;
pub mod runner;
pub mod telemetry;
