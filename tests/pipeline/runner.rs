use crate::support::{
    helpers::{init_tracing, test_config},
    mock_qrng::{MockBehavior, MockQrng, MockQrngServer},
};
use anyhow::Result;
use coprimepi::{NoProgress, Runner, SampleStore};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn run_acquires_caches_and_estimates() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::Serve);
    let server = MockQrngServer::start(qrng.clone()).await?;
    let dir = tempdir()?;

    let config = test_config(server.url(), dir.path(), 200)?;
    let cache = SampleStore::new(config.cache_path());
    let runner = Runner::new(config)?.with_progress(Arc::new(NoProgress));

    let estimate = runner.run().await?;
    assert!(estimate.is_finite() && estimate > 0.0);
    assert_eq!(qrng.lengths().iter().sum::<usize>(), 200);
    assert_eq!(runner.telemetry().numbers_fetched(), 200);

    let cached = cache.load(Some(200)).await.expect("sample must be cached");
    assert_eq!(cached.len(), 200);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_run_reads_cache_without_network() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::Serve);
    let server = MockQrngServer::start(qrng.clone()).await?;
    let dir = tempdir()?;

    let first = Runner::new(test_config(server.url(), dir.path(), 100)?)?
        .with_progress(Arc::new(NoProgress))
        .run()
        .await?;
    let requests = qrng.requests();
    assert!(requests > 0);

    qrng.set_behavior(MockBehavior::ReportFailure);
    let second = Runner::new(test_config(server.url(), dir.path(), 100)?)?
        .with_progress(Arc::new(NoProgress))
        .run()
        .await?;

    assert_eq!(first, second);
    assert_eq!(qrng.requests(), requests);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stale_cache_length_triggers_reacquisition() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::Serve);
    let server = MockQrngServer::start(qrng.clone()).await?;
    let dir = tempdir()?;

    let config = test_config(server.url(), dir.path(), 64)?;
    SampleStore::new(config.cache_path()).save(&[3, 4]).await?;

    let runner = Runner::new(config)?.with_progress(Arc::new(NoProgress));
    let sample = runner.load_or_acquire().await?;
    assert_eq!(sample.len(), 64);
    assert!(qrng.requests() > 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn source_failure_aborts_run_without_cache() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::ReportFailure);
    let server = MockQrngServer::start(qrng).await?;
    let dir = tempdir()?;

    let config = test_config(server.url(), dir.path(), 100)?;
    let cache_path = config.cache_path().to_path_buf();
    let err = Runner::new(config)?
        .with_progress(Arc::new(NoProgress))
        .run()
        .await
        .expect_err("a rejected batch must abort the run");

    let message = format!("{err:#}");
    assert!(
        message.contains("failed to acquire random sample"),
        "unexpected error: {message}"
    );
    assert!(!cache_path.exists());

    server.shutdown().await;
    Ok(())
}
