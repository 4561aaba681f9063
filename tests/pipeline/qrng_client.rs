use std::sync::Arc;
use std::time::Duration;

use crate::support::{
    helpers::init_tracing,
    mock_qrng::{MockBehavior, MockQrng, MockQrngServer},
};
use anyhow::Result;
use coprimepi::source::SourceClientOptions;
use coprimepi::{
    AcquisitionCoordinator, AcquisitionParams, NoProgress, QrngClient, SourceError, Telemetry,
};

fn client(url: &str) -> Result<QrngClient> {
    QrngClient::with_options(
        url,
        SourceClientOptions {
            request_timeout: Duration::from_secs(5),
            max_concurrent_requests: 4,
        },
    )
}

#[tokio::test]
async fn fetches_requested_count() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::Serve);
    let server = MockQrngServer::start(qrng.clone()).await?;

    let client = client(server.url())?;
    let numbers = client.fetch(5).await?;

    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(qrng.lengths(), vec![5]);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn reported_failure_is_rejected() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::ReportFailure);
    let server = MockQrngServer::start(qrng).await?;

    let err = client(server.url())?
        .fetch(4)
        .await
        .expect_err("success=false must fail");
    assert!(matches!(
        err.downcast_ref::<SourceError>(),
        Some(SourceError::Rejected { requested: 4 })
    ));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn malformed_body_fails_to_decode() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::Garbage);
    let server = MockQrngServer::start(qrng).await?;

    let err = client(server.url())?
        .fetch(4)
        .await
        .expect_err("garbage must fail");
    assert!(format!("{err:#}").contains("failed to decode qrng response"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn http_error_status_is_surfaced() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::Unavailable);
    let server = MockQrngServer::start(qrng).await?;

    let err = client(server.url())?
        .fetch(4)
        .await
        .expect_err("503 must fail");
    assert!(matches!(
        err.downcast_ref::<SourceError>(),
        Some(SourceError::Status { status: 503 })
    ));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coordinator_over_http_returns_every_number() -> Result<()> {
    init_tracing();
    let qrng = MockQrng::new(MockBehavior::Serve);
    let server = MockQrngServer::start(qrng.clone()).await?;

    let telemetry = Arc::new(Telemetry::default());
    let coordinator = AcquisitionCoordinator::new(
        Arc::new(client(server.url())?),
        AcquisitionParams {
            batch_limit: 16,
            worker_count: 6,
            activation_threshold: 30,
        },
        telemetry.clone(),
        Arc::new(NoProgress),
    );

    let mut numbers = coordinator.acquire(500).await?;
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=500).collect::<Vec<u64>>());
    assert!(qrng.lengths().iter().all(|length| *length <= 16 && *length > 0));
    assert_eq!(qrng.lengths().iter().sum::<usize>(), 500);
    assert_eq!(telemetry.source_calls() as usize, qrng.lengths().len());
    assert_eq!(telemetry.source_errors(), 0);

    server.shutdown().await;
    Ok(())
}
