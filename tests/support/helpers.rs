use std::path::Path;

use anyhow::Result;
use coprimepi::SamplerConfig;
use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// Small-scale configuration pointed at a mock server.
pub fn test_config(source_url: &str, cache_dir: &Path, total: usize) -> Result<SamplerConfig> {
    SamplerConfig::builder()
        .source_url(source_url)
        .total_samples(total)
        .batch_limit(8)
        .worker_count(4)
        .activation_threshold(30)
        .max_concurrent_requests(8)
        .cache_path(cache_dir.join("nums.txt"))
        .build()
}
