use anyhow::Result;
use coprimepi::{init_tracing, Runner, SamplerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = SamplerConfig::from_env()?;
    tracing::info!(
        total = config.total_samples(),
        workers = config.worker_count(),
        cache = %config.cache_path().display(),
        "starting coprime estimate"
    );

    let runner = Runner::new(config)?;
    let estimate = runner.run().await?;
    println!("{estimate}");

    Ok(())
}
