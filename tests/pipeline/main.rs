#[path = "../support/mod.rs"]
mod support;

mod qrng_client;
mod runner;
